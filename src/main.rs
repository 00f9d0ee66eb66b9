//! Loan Ledger API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (wallet-signed requests)              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /loans/*  /ws                                  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Ledger + Services                     ││
//! │  │  LoanLedger    SignatureVerifier    EscrowBook   WsHub   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL LoanStore    In-memory LoanStore             ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loan_ledger::{
    build_state, routes,
    services::auth::{ADDRESS_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER},
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "loan_ledger=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Loan Ledger API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("📋 Configuration loaded ({:?})", config.environment);

    let cors = cors_layer(&config);
    let port = config.port;

    // 앱 상태 구성 (store, ledger, verifier, ws hub)
    let state = build_state(config).await?;

    // 라우터 구성
    let app: Router = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS 설정
///
/// 프로덕션: ALLOWED_ORIGINS 도메인만 허용
/// 개발: localhost 허용
fn cors_layer(config: &Config) -> CorsLayer {
    let signed_headers = [
        header::CONTENT_TYPE,
        header::HeaderName::from_static(ADDRESS_HEADER),
        header::HeaderName::from_static(SIGNATURE_HEADER),
        header::HeaderName::from_static(TIMESTAMP_HEADER),
    ];

    if config.is_production() {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(signed_headers)
    } else {
        let origins: Vec<HeaderValue> = [
            "http://localhost:5173", // Vite dev server
            "http://localhost:3000",
            "http://127.0.0.1:5173",
        ]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
