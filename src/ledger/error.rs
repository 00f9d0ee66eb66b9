//! Ledger error types
//!
//! Messages are part of the public contract: integrations branch on the
//! exact strings, so they must not change.

use thiserror::Error;

/// 에러 분류 (HTTP 상태 코드 매핑에 사용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Internal,
}

/// Loan ledger 에러
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Collateral must be at least 50% of the loan amount")]
    InsufficientCollateral,

    #[error("The loan has expired")]
    LoanExpired,

    #[error("The amount sent must match the loan amount")]
    AmountMismatch,

    #[error("The amount sent must match the repayment amount")]
    RepaymentMismatch,

    #[error("The loan has already been completed")]
    AlreadyCompleted,

    #[error("The loan has already been taken")]
    AlreadyTaken,

    #[error("The loan has not been taken")]
    NotTaken,

    #[error("Only the lender can adjust the interest rate")]
    Unauthorized,

    #[error("Only the borrower can complete the loan")]
    NotBorrower,

    #[error("The loan does not exist")]
    LoanNotFound,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Value transfer failed: {0}")]
    Transfer(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InsufficientCollateral
            | LedgerError::LoanExpired
            | LedgerError::AmountMismatch
            | LedgerError::RepaymentMismatch
            | LedgerError::AlreadyCompleted
            | LedgerError::AlreadyTaken
            | LedgerError::NotTaken
            | LedgerError::ArithmeticOverflow => ErrorKind::Validation,
            LedgerError::Unauthorized | LedgerError::NotBorrower => ErrorKind::Authorization,
            LedgerError::LoanNotFound => ErrorKind::NotFound,
            LedgerError::Transfer(_) | LedgerError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// 기계가 읽을 수 있는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientCollateral => "INSUFFICIENT_COLLATERAL",
            LedgerError::LoanExpired => "LOAN_EXPIRED",
            LedgerError::AmountMismatch => "AMOUNT_MISMATCH",
            LedgerError::RepaymentMismatch => "REPAYMENT_MISMATCH",
            LedgerError::AlreadyCompleted => "ALREADY_COMPLETED",
            LedgerError::AlreadyTaken => "ALREADY_TAKEN",
            LedgerError::NotTaken => "NOT_TAKEN",
            LedgerError::Unauthorized => "UNAUTHORIZED",
            LedgerError::NotBorrower => "NOT_BORROWER",
            LedgerError::LoanNotFound => "LOAN_NOT_FOUND",
            LedgerError::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
            LedgerError::Transfer(_) => "TRANSFER_FAILED",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
