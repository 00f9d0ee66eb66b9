//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Ledger errors keep their exact message in the `error` field so clients can
//! branch on it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{ErrorKind, LedgerError};
use crate::services::AuthError;

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 검증 실패: 422
/// - 권한 없음: 403 (인증 실패는 401)
/// - 서버 에러: 5xx (내부 정보는 숨김)
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ============ 401 Unauthorized ============
    #[error("Authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    // ============ 403 / 404 / 422 / 500 ============
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // ============ 500 Internal Server Error ============
    #[error("Internal server error")]
    InternalError,
}

/// API 에러 응답 구조
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Invalid request".to_string(),
                Some(msg.clone()),
            ),
            ApiError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required".to_string(),
                Some(err.to_string()),
            ),
            ApiError::Ledger(err) => match err.kind() {
                ErrorKind::Validation => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    err.code(),
                    err.to_string(),
                    None,
                ),
                ErrorKind::Authorization => {
                    (StatusCode::FORBIDDEN, err.code(), err.to_string(), None)
                }
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.code(), err.to_string(), None),
                ErrorKind::Internal => {
                    // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                    tracing::error!("Ledger internal error: {:?}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        err.code(),
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}
