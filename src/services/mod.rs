//! Services Module
//!
//! Ledger가 사용하는 외부 협력자와 부가 서비스
//!
//! # Services
//! - `Clock`: 현재 시각
//! - `Treasury`: 금액 이동 (caller → ledger → party)
//! - `SignatureVerifier`: 호출자 서명 검증
//! - `WsHub`: WebSocket 실시간 이벤트

pub mod auth;
mod clock;
mod treasury;
pub mod websocket;

pub use auth::{AuthError, CallerClaim, SignatureVerifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use treasury::{EscrowBook, Treasury};
pub use websocket::{Channel, ClientMessage, WsHub, WsMessage};
