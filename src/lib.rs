//! Loan Ledger Library
//!
//! # Overview
//!
//! 담보 기반 P2P 대출 장부. lender가 대출 조건을 올리고, borrower가 대출을
//! 받고, borrower가 원금 + 이자를 상환한다.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │─▶│ Ledger  │─▶│Services │  │   DB    │    │
//! │  └─────────┘  └────┬────┘  └─────────┘  └────▲────┘    │
//! │                    │                         │          │
//! │                    └─────────────────────────┘          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `ledger`: 대출 상태 머신 (offer / take / complete / adjust)
//! - `services`: Clock, Treasury, 서명 검증, WebSocket hub
//! - `db`: LoanStore (PostgreSQL / in-memory)
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loan_ledger::{build_state, routes, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = build_state(config).await?;
//!     let app = routes::router(state);
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod ledger;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::{Database, LoanStore, MemoryLoanStore};
pub use ledger::{Caller, LedgerError, LedgerEvent, LedgerPolicy, LedgerUpdate, Loan, LoanLedger, LoanStatus};
pub use services::{Clock, EscrowBook, SignatureVerifier, SystemClock, Treasury, WsHub};
pub use types::Amount;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LoanLedger>,
    pub verifier: Arc<SignatureVerifier>,
    pub ws_hub: Arc<WsHub>,
    pub config: Arc<Config>,
}

/// 설정으로부터 전체 상태 구성
///
/// `DATABASE_URL`이 있으면 PostgreSQL (마이그레이션 포함),
/// 없으면 in-memory store 사용.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let store: Arc<dyn LoanStore> = match &config.database_url {
        Some(url) => {
            let db = Database::connect(url).await?;
            tracing::info!("🗄️  Database connected");

            db.run_migrations().await?;
            tracing::info!("📦 Migrations completed");
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, loans are kept in memory only");
            Arc::new(MemoryLoanStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let treasury: Arc<dyn Treasury> = Arc::new(EscrowBook::new());

    let ledger = LoanLedger::open(
        clock.clone(),
        treasury,
        store,
        LedgerPolicy {
            restrict_completion_to_borrower: config.restrict_completion_to_borrower,
        },
    )
    .await?;
    tracing::info!("📒 Loan ledger ready");

    Ok(AppState {
        ledger: Arc::new(ledger),
        verifier: Arc::new(SignatureVerifier::new(clock, config.signature_ttl_secs)),
        ws_hub: Arc::new(WsHub::new()),
        config: Arc::new(config),
    })
}
