//! Caller Authentication
//!
//! Mutating calls must prove the caller's address with an EIP-191
//! `personal_sign` signature over the request:
//!
//! ```text
//! loan-ledger
//! POST /loans/1/take
//! timestamp:1700000000
//! body:0x<keccak256(raw body)>
//! ```
//!
//! Headers: `x-caller-address`, `x-caller-signature`, `x-caller-timestamp`.
//!
//! # Interview Q&A
//!
//! Q: 왜 주소 헤더만 받지 않는가?
//! A: 헤더는 누구나 위조 가능. 서명에서 복구한 주소만 신뢰.
//!
//! Q: Replay 공격은?
//! A: 타임스탬프 TTL + TTL 동안 처리한 (서명자, 메시지 해시) 기록.
//!    서명 바이트가 아니라 서명된 내용으로 기록하므로 `v`를 27/0/35로
//!    바꿔 쓰거나 `s`를 뒤집은 같은 서명도 재사용으로 걸러짐.
//!    body hash가 서명에 포함되므로 다른 인자로 재사용 불가.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use ethers::types::{Address, Signature};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use super::Clock;
use crate::ledger::Caller;

pub const ADDRESS_HEADER: &str = "x-caller-address";
pub const SIGNATURE_HEADER: &str = "x-caller-signature";
pub const TIMESTAMP_HEADER: &str = "x-caller-timestamp";

const MESSAGE_DOMAIN: &str = "loan-ledger";

/// 서명 유효 시간 상한 (1일)
pub const MAX_SIGNATURE_TTL_SECS: u64 = 24 * 60 * 60;

/// 재사용 판별 키: (서명자, keccak256(메시지))
type ReplayKey = (Address, [u8; 32]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid caller address")]
    InvalidAddress,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Signature timestamp outside the accepted window")]
    Stale,

    #[error("Signature does not match caller address")]
    SignerMismatch,

    #[error("Signature already used")]
    Replayed,
}

/// 헤더에서 꺼낸 인증 정보 (아직 검증 전)
#[derive(Debug, Clone, Copy)]
pub struct CallerClaim<'a> {
    pub address: &'a str,
    pub signature: &'a str,
    pub timestamp: &'a str,
}

/// 서명 대상 메시지 생성
pub fn signing_message(method: &str, path: &str, timestamp: i64, body: &[u8]) -> String {
    let body_hash = Keccak256::digest(body);
    format!(
        "{}\n{} {}\ntimestamp:{}\nbody:0x{}",
        MESSAGE_DOMAIN,
        method.to_uppercase(),
        path,
        timestamp,
        hex::encode(body_hash)
    )
}

pub struct SignatureVerifier {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// (서명자, 메시지 해시) → 만료 시각
    seen: Mutex<HashMap<ReplayKey, DateTime<Utc>>>,
}

impl SignatureVerifier {
    /// `ttl_secs`는 `MAX_SIGNATURE_TTL_SECS`로 잘림 (`Config`에서 이미 검증)
    pub fn new(clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_SIGNATURE_TTL_SECS) as i64;
        Self {
            clock,
            ttl: Duration::seconds(ttl_secs),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// 서명 검증 후 `Caller` 반환
    ///
    /// # Checks
    ///
    /// 1. 헤더 형식 (주소, 서명, 타임스탬프)
    /// 2. 타임스탬프가 서버 시각 ± TTL 이내
    /// 3. 복구된 서명자 == 선언된 주소
    /// 4. TTL 내 재사용 아님
    pub fn verify(
        &self,
        method: &str,
        path: &str,
        claim: CallerClaim<'_>,
        body: &[u8],
    ) -> Result<Caller, AuthError> {
        let address: Address = claim
            .address
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidAddress)?;
        let signature: Signature = claim
            .signature
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidSignature)?;
        let timestamp: i64 = claim
            .timestamp
            .trim()
            .parse()
            .map_err(|_| AuthError::InvalidTimestamp)?;
        let signed_at =
            DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or(AuthError::InvalidTimestamp)?;

        let now = self.clock.now();
        if (now - signed_at).abs() > self.ttl {
            return Err(AuthError::Stale);
        }

        let message = signing_message(method, path, timestamp, body);
        let recovered = signature
            .recover(message.as_str())
            .map_err(|_| AuthError::InvalidSignature)?;
        if recovered != address {
            tracing::warn!(claimed = ?address, recovered = ?recovered, "caller signature mismatch");
            return Err(AuthError::SignerMismatch);
        }

        let expires_at = signed_at
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::InvalidTimestamp)?;
        let digest: [u8; 32] = Keccak256::digest(message.as_bytes()).into();
        self.remember((recovered, digest), expires_at, now)?;

        Ok(Caller::verified(address))
    }

    fn remember(
        &self,
        key: ReplayKey,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.retain(|_, expiry| *expiry >= now);

        if seen.contains_key(&key) {
            return Err(AuthError::Replayed);
        }
        seen.insert(key, expires_at);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::http::HeaderMap;
    use ethers::signers::{LocalWallet, Signer};

    pub fn wallet() -> LocalWallet {
        LocalWallet::new(&mut rand::thread_rng())
    }

    /// 요청 서명 후 헤더 생성
    pub async fn signed_headers(
        wallet: &LocalWallet,
        method: &str,
        path: &str,
        timestamp: i64,
        body: &[u8],
    ) -> HeaderMap {
        let message = signing_message(method, path, timestamp, body);
        let signature = wallet.sign_message(message).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(ADDRESS_HEADER, format!("{:?}", wallet.address()).parse().unwrap());
        headers.insert(
            SIGNATURE_HEADER,
            format!("0x{}", hex::encode(signature.to_vec())).parse().unwrap(),
        );
        headers.insert(TIMESTAMP_HEADER, timestamp.to_string().parse().unwrap());
        headers
    }
}
