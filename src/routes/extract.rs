//! Signed request extractor
//!
//! `Signed<T>` reads the raw body, verifies the caller signature against it
//! and only then deserializes `T`. Must be the last extractor of a handler.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::HeaderMap,
};
use serde::de::DeserializeOwned;

use crate::{
    error::ApiError,
    ledger::Caller,
    services::auth::{AuthError, CallerClaim, ADDRESS_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER},
    AppState,
};

/// 요청 body 최대 크기 (64 KiB)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// 인증된 호출자 + 요청 body
#[derive(Debug)]
pub struct Signed<T> {
    pub caller: Caller,
    pub body: T,
}

#[async_trait]
impl<T> FromRequest<AppState> for Signed<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Unreadable body: {}", e)))?;

        let claim = CallerClaim {
            address: header(&parts.headers, ADDRESS_HEADER)?,
            signature: header(&parts.headers, SIGNATURE_HEADER)?,
            timestamp: header(&parts.headers, TIMESTAMP_HEADER)?,
        };

        let caller = state
            .verifier
            .verify(parts.method.as_str(), parts.uri.path(), claim, &bytes)?;

        let body = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

        Ok(Signed { caller, body })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .ok_or(AuthError::MissingHeader(name))?
        .to_str()
        .map_err(|_| AuthError::MissingHeader(name))
}
