//! Loan record

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::error::{LedgerError, LedgerResult};
use crate::types::Amount;

/// 대출 상태
///
/// ```text
/// Offered ──takeLoan──▶ Active ──completeLoan──▶ Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Offered,
    Active,
    Completed,
}

/// 대출 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// 1부터 순차 발급
    pub id: u64,
    pub lender: Address,
    /// takeLoan 전에는 None
    pub borrower: Option<Address>,
    /// 원금 (wei)
    pub amount: Amount,
    /// 이자율 (%)
    pub interest_rate: u32,
    /// 담보 (생성 시점에만 검증됨)
    pub collateral: Amount,
    pub due_date: DateTime<Utc>,
    pub completed: bool,
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        match (self.borrower, self.completed) {
            (_, true) => LoanStatus::Completed,
            (Some(_), false) => LoanStatus::Active,
            (None, false) => LoanStatus::Offered,
        }
    }

    pub fn is_taken(&self) -> bool {
        self.borrower.is_some()
    }

    /// `now > due_date` 이면 만료
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }

    /// 상환 금액 = amount + amount * rate / 100 (버림)
    pub fn repayment_amount(&self) -> LedgerResult<Amount> {
        repayment_for(self.amount, self.interest_rate)
    }
}

pub fn repayment_for(amount: Amount, interest_rate: u32) -> LedgerResult<Amount> {
    amount
        .checked_percent(interest_rate)
        .and_then(|interest| amount.checked_add(interest))
        .ok_or(LedgerError::ArithmeticOverflow)
}

/// 최소 담보 = amount * 50 / 100 (버림)
pub fn minimum_collateral(amount: Amount) -> LedgerResult<Amount> {
    amount
        .checked_percent(super::MIN_COLLATERAL_PERCENT)
        .ok_or(LedgerError::ArithmeticOverflow)
}
