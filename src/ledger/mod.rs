//! Loan Ledger
//!
//! # State Machine
//!
//! ```text
//!  offerLoan            takeLoan              completeLoan
//! ──────────▶ Offered ────────────▶ Active ────────────────▶ Completed
//!               │                     │
//!               └── adjustInterestRate (lender only) ──┘
//! ```
//!
//! # Atomicity
//!
//! 모든 변경 연산은 하나의 `tokio::sync::Mutex` 안에서 직렬 실행된다.
//! lock은 treasury / store 호출 동안에도 유지되므로 같은 대출에 대한
//! 두 전이가 섞이지 않는다.
//!
//! 연산 순서: 검증 → 첨부 금액 수령 → 저장 → 메모리 반영 → 이벤트 발행.
//! 저장이 실패하면 수령한 금액을 돌려주고 아무 것도 반영하지 않는다.

mod error;
mod events;
mod loan;

pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use events::{JournalEntry, LedgerEvent, LedgerUpdate};
pub use loan::{minimum_collateral, repayment_for, Loan, LoanStatus};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use ethers::types::Address;
use tokio::sync::{broadcast, Mutex};

use crate::db::LoanStore;
use crate::services::{Clock, Treasury};
use crate::types::Amount;

/// 대출 만기: 생성 후 30일
pub const LOAN_TERM_DAYS: i64 = 30;

/// 최소 담보 비율 (%)
pub const MIN_COLLATERAL_PERCENT: u32 = 50;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 검증된 호출자 주소
///
/// 인증 계층(`services::auth`)만 생성할 수 있다. 클라이언트가 선언한
/// 주소를 그대로 믿지 않기 위함.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Caller(Address);

impl Caller {
    pub(crate) fn verified(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

/// 정책 옵션
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    /// true면 등록된 borrower만 completeLoan 가능
    pub restrict_completion_to_borrower: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            restrict_completion_to_borrower: true,
        }
    }
}

struct LedgerState {
    loans: BTreeMap<u64, Loan>,
    next_id: u64,
}

pub struct LoanLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    treasury: Arc<dyn Treasury>,
    store: Arc<dyn LoanStore>,
    events: broadcast::Sender<LedgerUpdate>,
    policy: LedgerPolicy,
}

impl LoanLedger {
    /// store에서 기존 레코드를 복원하고 ledger 생성
    ///
    /// id 카운터는 `max(id) + 1`부터 재개 (id 재사용 금지).
    pub async fn open(
        clock: Arc<dyn Clock>,
        treasury: Arc<dyn Treasury>,
        store: Arc<dyn LoanStore>,
        policy: LedgerPolicy,
    ) -> anyhow::Result<Self> {
        let loans: BTreeMap<u64, Loan> = store
            .load_loans()
            .await?
            .into_iter()
            .map(|loan| (loan.id, loan))
            .collect();
        let next_id = loans.keys().next_back().map_or(1, |max| max + 1);

        tracing::info!(restored = loans.len(), next_id, "loan ledger opened");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            state: Mutex::new(LedgerState { loans, next_id }),
            clock,
            treasury,
            store,
            events,
            policy,
        })
    }

    // ============ Mutations ============

    /// offerLoan: 호출자가 lender가 됨
    pub async fn offer_loan(
        &self,
        caller: Caller,
        amount: Amount,
        interest_rate: u32,
        collateral: Amount,
    ) -> LedgerResult<Loan> {
        let result = self.apply_offer(caller, amount, interest_rate, collateral).await;
        self.trace_outcome("offerLoan", caller, &result);
        result
    }

    /// takeLoan: 호출자가 borrower가 되고 원금을 첨부
    pub async fn take_loan(&self, caller: Caller, id: u64, value: Amount) -> LedgerResult<Loan> {
        let result = self.apply_take(caller, id, value).await;
        self.trace_outcome("takeLoan", caller, &result);
        result
    }

    /// completeLoan: 원금 + 이자 상환
    pub async fn complete_loan(&self, caller: Caller, id: u64, value: Amount) -> LedgerResult<Loan> {
        let result = self.apply_complete(caller, id, value).await;
        self.trace_outcome("completeLoan", caller, &result);
        result
    }

    /// adjustInterestRate: lender만, 완료 전까지
    pub async fn adjust_interest_rate(
        &self,
        caller: Caller,
        id: u64,
        new_rate: u32,
    ) -> LedgerResult<Loan> {
        let result = self.apply_rate_change(caller, id, new_rate).await;
        self.trace_outcome("adjustInterestRate", caller, &result);
        result
    }

    // ============ Reads ============

    pub async fn loan(&self, id: u64) -> LedgerResult<Loan> {
        let state = self.state.lock().await;
        state.loans.get(&id).cloned().ok_or(LedgerError::LoanNotFound)
    }

    pub async fn loan_count(&self) -> usize {
        self.state.lock().await.loans.len()
    }

    /// 현재 이자율 기준 상환 금액
    pub async fn repayment_quote(&self, id: u64) -> LedgerResult<Amount> {
        self.loan(id).await?.repayment_amount()
    }

    pub async fn history(
        &self,
        id: u64,
        page: u32,
        limit: u32,
    ) -> LedgerResult<(Vec<JournalEntry>, u64)> {
        // 존재 확인
        self.loan(id).await?;
        self.store
            .history(id, page, limit)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerUpdate> {
        self.events.subscribe()
    }

    pub async fn escrow_balance(&self) -> anyhow::Result<Amount> {
        self.treasury.balance().await
    }

    pub async fn store_health(&self) -> anyhow::Result<()> {
        self.store.health_check().await
    }

    // ============ Internals ============

    async fn apply_offer(
        &self,
        caller: Caller,
        amount: Amount,
        interest_rate: u32,
        collateral: Amount,
    ) -> LedgerResult<Loan> {
        if collateral < minimum_collateral(amount)? {
            return Err(LedgerError::InsufficientCollateral);
        }

        let mut state = self.state.lock().await;
        let id = state.next_id;
        let loan = Loan {
            id,
            lender: caller.address(),
            borrower: None,
            amount,
            interest_rate,
            collateral,
            due_date: self.clock.now() + Duration::days(LOAN_TERM_DAYS),
            completed: false,
        };
        let event = LedgerEvent::LoanOffered {
            id,
            lender: loan.lender,
            amount,
            interest_rate,
        };

        let loan = self.commit(&mut state, caller, Amount::ZERO, loan, event).await?;
        state.next_id = id + 1;
        Ok(loan)
    }

    async fn apply_take(&self, caller: Caller, id: u64, value: Amount) -> LedgerResult<Loan> {
        let mut state = self.state.lock().await;
        let mut loan = state.loans.get(&id).cloned().ok_or(LedgerError::LoanNotFound)?;

        if loan.is_expired(self.clock.now()) {
            return Err(LedgerError::LoanExpired);
        }
        if value != loan.amount {
            return Err(LedgerError::AmountMismatch);
        }
        if loan.is_taken() {
            return Err(LedgerError::AlreadyTaken);
        }

        loan.borrower = Some(caller.address());
        let event = LedgerEvent::LoanTaken {
            id,
            borrower: caller.address(),
        };
        self.commit(&mut state, caller, value, loan, event).await
    }

    async fn apply_complete(&self, caller: Caller, id: u64, value: Amount) -> LedgerResult<Loan> {
        let mut state = self.state.lock().await;
        let mut loan = state.loans.get(&id).cloned().ok_or(LedgerError::LoanNotFound)?;

        if loan.completed {
            return Err(LedgerError::AlreadyCompleted);
        }
        let borrower = loan.borrower.ok_or(LedgerError::NotTaken)?;
        if self.policy.restrict_completion_to_borrower && borrower != caller.address() {
            return Err(LedgerError::NotBorrower);
        }
        // 이자율은 호출 시점 값 기준
        if value != loan.repayment_amount()? {
            return Err(LedgerError::RepaymentMismatch);
        }

        loan.completed = true;
        let event = LedgerEvent::LoanCompleted { id };
        self.commit(&mut state, caller, value, loan, event).await
    }

    async fn apply_rate_change(&self, caller: Caller, id: u64, new_rate: u32) -> LedgerResult<Loan> {
        let mut state = self.state.lock().await;
        let mut loan = state.loans.get(&id).cloned().ok_or(LedgerError::LoanNotFound)?;

        if loan.lender != caller.address() {
            return Err(LedgerError::Unauthorized);
        }
        if loan.completed {
            return Err(LedgerError::AlreadyCompleted);
        }

        let old_rate = loan.interest_rate;
        loan.interest_rate = new_rate;
        let event = LedgerEvent::InterestRateAdjusted {
            id,
            old_rate,
            new_rate,
        };
        self.commit(&mut state, caller, Amount::ZERO, loan, event).await
    }

    /// 수령 → 저장 → 반영 → 발행
    async fn commit(
        &self,
        state: &mut LedgerState,
        caller: Caller,
        attached: Amount,
        loan: Loan,
        event: LedgerEvent,
    ) -> LedgerResult<Loan> {
        if !attached.is_zero() {
            self.treasury
                .receive(caller.address(), attached)
                .await
                .map_err(|e| LedgerError::Transfer(e.to_string()))?;
        }

        let entry = JournalEntry {
            event: event.clone(),
            recorded_at: self.clock.now(),
        };

        if let Err(err) = self.store.save(&loan, &entry).await {
            tracing::error!(loan_id = loan.id, error = %err, "failed to persist loan");
            if !attached.is_zero() {
                if let Err(refund_err) = self.treasury.send(caller.address(), attached).await {
                    tracing::error!(
                        loan_id = loan.id,
                        caller = ?caller.address(),
                        amount = %attached,
                        error = %refund_err,
                        "refund after failed persist did not go through"
                    );
                }
            }
            return Err(LedgerError::Storage(err.to_string()));
        }

        state.loans.insert(loan.id, loan.clone());
        // 구독자가 없으면 Err - 무시
        let _ = self.events.send(LedgerUpdate {
            event,
            loan: loan.clone(),
        });

        Ok(loan)
    }

    fn trace_outcome(&self, operation: &str, caller: Caller, result: &LedgerResult<Loan>) {
        match result {
            Ok(loan) => tracing::info!(
                operation,
                loan_id = loan.id,
                caller = ?caller.address(),
                status = ?loan.status(),
                "ledger call applied"
            ),
            Err(err) if err.kind() == ErrorKind::Internal => tracing::error!(
                operation,
                caller = ?caller.address(),
                error = %err,
                "ledger call failed"
            ),
            Err(err) => tracing::debug!(
                operation,
                caller = ?caller.address(),
                error = %err,
                "ledger call rejected"
            ),
        }
    }
}
