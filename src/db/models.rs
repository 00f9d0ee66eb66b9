//! Database Models
//!
//! Row types for the `loans` and `loan_events` tables. Amounts are stored as
//! decimal text (u128 does not fit BIGINT), addresses as lowercase 0x-hex.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use sqlx::types::Json;
use sqlx::FromRow;

use crate::ledger::{JournalEntry, LedgerEvent, Loan};

/// 대출 레코드 행
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: i64,
    /// 0x로 시작하는 lowercase 주소
    pub lender: String,
    pub borrower: Option<String>,
    /// wei (10진수 문자열)
    pub amount: String,
    pub interest_rate: i64,
    pub collateral: String,
    pub due_date: DateTime<Utc>,
    pub completed: bool,
}

impl LoanRow {
    pub fn from_loan(loan: &Loan) -> Result<Self> {
        Ok(Self {
            id: i64::try_from(loan.id).context("loan id exceeds BIGINT")?,
            lender: address_hex(&loan.lender),
            borrower: loan.borrower.as_ref().map(address_hex),
            amount: loan.amount.to_string(),
            interest_rate: i64::from(loan.interest_rate),
            collateral: loan.collateral.to_string(),
            due_date: loan.due_date,
            completed: loan.completed,
        })
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = anyhow::Error;

    fn try_from(row: LoanRow) -> Result<Self> {
        Ok(Loan {
            id: u64::try_from(row.id).context("negative loan id")?,
            lender: row.lender.parse().context("invalid lender address")?,
            borrower: row
                .borrower
                .map(|b| b.parse::<Address>())
                .transpose()
                .context("invalid borrower address")?,
            amount: row.amount.parse().context("invalid amount")?,
            interest_rate: u32::try_from(row.interest_rate).context("invalid interest rate")?,
            collateral: row.collateral.parse().context("invalid collateral")?,
            due_date: row.due_date,
            completed: row.completed,
        })
    }
}

/// 대출 이벤트 행 (journal)
#[derive(Debug, Clone, FromRow)]
pub struct LoanEventRow {
    /// - LoanOffered
    /// - LoanTaken
    /// - LoanCompleted
    /// - InterestRateAdjusted
    pub event_type: String,

    /// 이벤트 전체 (JSONB)
    pub payload: Json<LedgerEvent>,

    pub recorded_at: DateTime<Utc>,
}

impl From<LoanEventRow> for JournalEntry {
    fn from(row: LoanEventRow) -> Self {
        JournalEntry {
            event: row.payload.0,
            recorded_at: row.recorded_at,
        }
    }
}

pub fn address_hex(address: &Address) -> String {
    format!("{:?}", address)
}
