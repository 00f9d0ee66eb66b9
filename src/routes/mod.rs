//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - 서버 상태 확인
//!
//! POST /loans                     - offerLoan (서명 필요)
//! GET  /loans/:id                 - 대출 조회
//! POST /loans/:id/take            - takeLoan (서명 필요)
//! POST /loans/:id/complete        - completeLoan (서명 필요)
//! POST /loans/:id/interest-rate   - adjustInterestRate (서명 필요)
//! GET  /loans/:id/repayment       - 상환 견적
//! GET  /loans/:id/history         - 이벤트 히스토리
//!
//! GET  /ws                        - WebSocket 실시간 이벤트
//! ```

pub mod extract;
pub mod health;
pub mod loans;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// 라우터 생성 (미들웨어 제외)
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Loans
        .route("/loans", post(loans::offer_loan))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/take", post(loans::take_loan))
        .route("/loans/:id/complete", post(loans::complete_loan))
        .route("/loans/:id/interest-rate", post(loans::adjust_interest_rate))
        .route("/loans/:id/repayment", get(loans::get_repayment))
        .route("/loans/:id/history", get(loans::get_loan_history))

        // WebSocket
        .route("/ws", get(ws::ws_handler))

        // 상태 주입
        .with_state(state)
}
