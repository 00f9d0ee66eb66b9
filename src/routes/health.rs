//! Health Check Endpoint
//!
//! # Interview Q&A
//!
//! Q: Health check 엔드포인트는 왜 필요한가?
//! A: 3가지 용도
//!    1. 로드밸런서 헬스체크 (ALB, nginx)
//!    2. Kubernetes liveness/readiness probe
//!    3. 모니터링 시스템 연동
//!
//! Q: Store 연결 상태도 체크하는 이유는?
//! A: "깊은 헬스체크"(deep health check) 패턴
//!    - 단순 200 OK: 프로세스 살아있음
//!    - Store 체크: 실제로 대출을 기록할 수 있는 상태

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{types::Amount, AppState};

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: StoreStatus,
    pub ledger: LedgerStatus,
    pub ws_connections: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct LedgerStatus {
    pub loans: usize,
    /// 에스크로 잔고 (wei)
    pub escrow_balance: Option<Amount>,
}

/// GET /health
///
/// 서버 및 의존성 상태 확인
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    // Store 연결 테스트
    let store_start = std::time::Instant::now();
    let store_status = match state.ledger.store_health().await {
        Ok(_) => StoreStatus {
            connected: true,
            latency_ms: Some(store_start.elapsed().as_millis() as u64),
        },
        Err(err) => {
            tracing::warn!("Store health check failed: {:?}", err);
            StoreStatus {
                connected: false,
                latency_ms: None,
            }
        }
    };

    let ledger_status = LedgerStatus {
        loans: state.ledger.loan_count().await,
        escrow_balance: state.ledger.escrow_balance().await.ok(),
    };

    Json(HealthResponse {
        status: if store_status.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status,
        ledger: ledger_status,
        ws_connections: state.ws_hub.active_connections().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_health_reports_ledger_state() {
        let t = TestApp::new().await;

        let response = t
            .app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["connected"], true);
        assert_eq!(body["ledger"]["loans"], 0);
        assert_eq!(body["ledger"]["escrow_balance"], "0");
    }
}
