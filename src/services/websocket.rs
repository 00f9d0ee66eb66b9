//! WebSocket Service
//!
//! Real-time ledger notifications via WebSocket.
//!
//! # Channels
//! - `all`: 모든 이벤트
//! - `loan:<id>`: 특정 대출
//! - `party:<address>`: 특정 주소가 lender 또는 borrower인 대출

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::ledger::{LedgerEvent, LedgerUpdate};

/// WebSocket 메시지 타입 (서버 → 클라이언트)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Ledger 이벤트
    Event(LedgerEvent),
    /// 구독 확인
    Subscribed(SubscriptionConfirm),
    /// 에러
    Error(WsError),
    Pong,
}

/// WebSocket 에러
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsError {
    pub code: i32,
    pub message: String,
}

/// 구독 확인
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfirm {
    pub channel: String,
    pub subscribed: bool,
}

/// WebSocket 클라이언트 메시지 (수신)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// 채널 구독
    Subscribe { channel: String },
    /// 구독 취소
    Unsubscribe { channel: String },
    /// Ping (keepalive)
    Ping,
}

/// 구독 채널
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Channel {
    All,
    Loan(u64),
    Party(Address),
}

impl Channel {
    /// 업데이트가 이 채널로 전달되어야 하는지
    ///
    /// party 판별은 업데이트에 실린 반영 직후 레코드 기준
    pub fn matches(&self, update: &LedgerUpdate) -> bool {
        match self {
            Channel::All => true,
            Channel::Loan(id) => update.event.loan_id() == *id,
            Channel::Party(address) => {
                update.loan.lender == *address || update.loan.borrower == Some(*address)
            }
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::All => write!(f, "all"),
            Channel::Loan(id) => write!(f, "loan:{}", id),
            Channel::Party(addr) => write!(f, "party:{:?}", addr),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "all" => Ok(Channel::All),
            Some(("loan", id)) => id
                .parse()
                .map(Channel::Loan)
                .map_err(|_| format!("invalid loan id: {}", id)),
            Some(("party", addr)) => addr
                .parse()
                .map(Channel::Party)
                .map_err(|_| format!("invalid address: {}", addr)),
            _ => Err(format!("unknown channel: {}", s)),
        }
    }
}

/// 연결 상태
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: String,
    pub connected_at: u64,
    pub subscriptions: HashSet<Channel>,
}

/// WebSocket Hub
///
/// 연결별 구독 채널 관리. 이벤트 자체는 ledger의 broadcast 채널에서
/// 받고, 여기서는 어떤 연결로 보낼지만 판단한다.
///
/// ```text
/// LoanLedger ──broadcast──▶ ws task (연결마다) ──▶ WsHub::should_deliver ──▶ Client
/// ```
pub struct WsHub {
    connections: Arc<RwLock<HashMap<String, ConnectionInfo>>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 연결 등록 (기본 구독: all)
    pub async fn register_connection(&self, id: String, connected_at: u64) {
        let mut conns = self.connections.write().await;
        conns.insert(
            id.clone(),
            ConnectionInfo {
                id,
                connected_at,
                subscriptions: HashSet::from([Channel::All]),
            },
        );
    }

    /// 연결 해제
    pub async fn unregister_connection(&self, id: &str) {
        let mut conns = self.connections.write().await;
        conns.remove(id);
    }

    /// 활성 연결 수
    pub async fn active_connections(&self) -> usize {
        let conns = self.connections.read().await;
        conns.len()
    }

    pub async fn subscribe(&self, id: &str, channel: Channel) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(id) {
            Some(info) => {
                info.subscriptions.insert(channel);
                true
            }
            None => false,
        }
    }

    pub async fn unsubscribe(&self, id: &str, channel: &Channel) -> bool {
        let mut conns = self.connections.write().await;
        match conns.get_mut(id) {
            Some(info) => info.subscriptions.remove(channel),
            None => false,
        }
    }

    pub async fn subscriptions(&self, id: &str) -> Vec<Channel> {
        let conns = self.connections.read().await;
        conns
            .get(id)
            .map(|info| info.subscriptions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 연결이 이 이벤트를 받아야 하는지
    pub async fn should_deliver(&self, id: &str, update: &LedgerUpdate) -> bool {
        let conns = self.connections.read().await;
        conns.get(id).is_some_and(|info| {
            info.subscriptions
                .iter()
                .any(|channel| channel.matches(update))
        })
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 클라이언트 메시지 파싱
pub fn parse_client_message(data: &str) -> Result<ClientMessage> {
    serde_json::from_str(data).map_err(Into::into)
}

/// 서버 메시지 직렬화
pub fn serialize_message(msg: &WsMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(Into::into)
}
