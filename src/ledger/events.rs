//! Ledger notifications
//!
//! Emitted after a mutation has been persisted and published. Also the unit
//! of the per-loan journal.

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::types::Amount;

use super::Loan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    LoanOffered {
        id: u64,
        lender: Address,
        amount: Amount,
        interest_rate: u32,
    },
    LoanTaken {
        id: u64,
        borrower: Address,
    },
    LoanCompleted {
        id: u64,
    },
    InterestRateAdjusted {
        id: u64,
        old_rate: u32,
        new_rate: u32,
    },
}

impl LedgerEvent {
    pub fn loan_id(&self) -> u64 {
        match self {
            LedgerEvent::LoanOffered { id, .. }
            | LedgerEvent::LoanTaken { id, .. }
            | LedgerEvent::LoanCompleted { id }
            | LedgerEvent::InterestRateAdjusted { id, .. } => *id,
        }
    }

    /// DB `event_type` 컬럼 값
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::LoanOffered { .. } => "LoanOffered",
            LedgerEvent::LoanTaken { .. } => "LoanTaken",
            LedgerEvent::LoanCompleted { .. } => "LoanCompleted",
            LedgerEvent::InterestRateAdjusted { .. } => "InterestRateAdjusted",
        }
    }
}

/// 구독자에게 전달되는 단위: 이벤트 + 반영 직후의 대출 레코드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub event: LedgerEvent,
    pub loan: Loan,
}

/// Journal 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub event: LedgerEvent,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = LedgerEvent::LoanTaken {
            id: 7,
            borrower: Address::repeat_byte(0xab),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "LoanTaken");
        assert_eq!(json["id"], 7);
        assert_eq!(event.loan_id(), 7);
        assert_eq!(event.name(), "LoanTaken");
    }
}
