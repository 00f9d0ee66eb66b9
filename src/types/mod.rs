//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 1 ETH = 10^18 wei
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// 금액 타입 (wei 단위, 오버플로우 방지)
///
/// JSON에서는 10진수 문자열로 표현됨 (`"10000000000000000000"`).
/// JavaScript number는 2^53 이상을 정확히 표현할 수 없기 때문.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// 정수 ETH → wei
    pub const fn from_ether(ether: u64) -> Self {
        Self(ether as u128 * WEI_PER_ETHER)
    }

    pub const fn wei(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// `self * percent / 100`, 소수점 이하 버림
    pub fn checked_percent(self, percent: u32) -> Option<Amount> {
        self.0
            .checked_mul(percent as u128)
            .map(|scaled| Amount(scaled / 100))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid amount: {0:?} (expected a non-negative integer in wei)")]
pub struct ParseAmountError(String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // u128::from_str는 "+10"을 허용하므로 숫자만 직접 확인
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| ParseAmountError(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = ParseAmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parse() {
        assert_eq!("10".parse::<Amount>().unwrap(), Amount::from_wei(10));
        assert!("".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("+1".parse::<Amount>().is_err());
        assert!("1.5".parse::<Amount>().is_err());
        // u128 범위 초과
        assert!("340282366920938463463374607431768211456".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_json_is_decimal_string() {
        let amount = Amount::from_ether(10);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"10000000000000000000\"");

        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amount);

        // 숫자 리터럴은 거부 (정밀도 손실 방지)
        assert!(serde_json::from_str::<Amount>("10").is_err());
    }

    #[test]
    fn test_checked_percent_truncates() {
        // 10 ETH * 5% = 0.5 ETH
        let interest = Amount::from_ether(10).checked_percent(5).unwrap();
        assert_eq!(interest.wei(), 500_000_000_000_000_000);

        // 9 wei * 50% = 4.5 → 4
        assert_eq!(Amount::from_wei(9).checked_percent(50).unwrap().wei(), 4);

        assert!(Amount::from_wei(u128::MAX).checked_percent(2).is_none());
    }
}
