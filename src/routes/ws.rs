//! WebSocket Routes
//!
//! 실시간 ledger 이벤트 스트리밍 WebSocket 엔드포인트
//!
//! # Endpoints
//! - `GET /ws` - WebSocket 연결

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::{
    services::{
        websocket::{parse_client_message, serialize_message, SubscriptionConfirm, WsError},
        Channel, ClientMessage, WsHub, WsMessage,
    },
    AppState,
};

/// WebSocket 업그레이드 핸들러
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// WebSocket 연결 처리
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // 연결 등록 전에 구독해야 이벤트 누락이 없음
    let mut events = state.ledger.subscribe();

    // 연결 ID 생성
    let conn_id = uuid::Uuid::new_v4().to_string();
    let connected_at = chrono::Utc::now().timestamp().max(0) as u64;
    state.ws_hub.register_connection(conn_id.clone(), connected_at).await;
    tracing::debug!("WebSocket connection {} opened", conn_id);

    // 클라이언트 요청에 대한 응답 큐
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsMessage>(32);

    // 수신 태스크
    let hub = state.ws_hub.clone();
    let recv_conn_id = conn_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match parse_client_message(&text) {
                        Ok(client_msg) => handle_client_message(&hub, &recv_conn_id, client_msg).await,
                        Err(_) => WsMessage::Error(WsError {
                            code: 400,
                            message: "Unrecognized message".to_string(),
                        }),
                    };
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // 송신 태스크
    let hub_for_send = state.ws_hub.clone();
    let send_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                event = events.recv() => match event {
                    Ok(update) => {
                        if !hub_for_send.should_deliver(&send_conn_id, &update).await {
                            continue;
                        }
                        WsMessage::Event(update.event)
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => WsMessage::Error(WsError {
                        code: 1008,
                        message: format!("{} events dropped, resync via /loans/:id", missed),
                    }),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };

            let Ok(json) = serialize_message(&outgoing) else {
                continue;
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // 연결이 종료될 때까지 대기
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    // 연결 해제
    state.ws_hub.unregister_connection(&conn_id).await;
    tracing::debug!("WebSocket connection {} closed", conn_id);
}

/// 클라이언트 메시지 처리 → 응답 메시지
async fn handle_client_message(hub: &WsHub, conn_id: &str, msg: ClientMessage) -> WsMessage {
    match msg {
        ClientMessage::Subscribe { channel } => match channel.parse::<Channel>() {
            Ok(parsed) => {
                hub.subscribe(conn_id, parsed).await;
                tracing::info!("Connection {} subscribed to {}", conn_id, channel);
                WsMessage::Subscribed(SubscriptionConfirm {
                    channel,
                    subscribed: true,
                })
            }
            Err(message) => WsMessage::Error(WsError { code: 400, message }),
        },
        ClientMessage::Unsubscribe { channel } => match channel.parse::<Channel>() {
            Ok(parsed) => {
                hub.unsubscribe(conn_id, &parsed).await;
                tracing::info!("Connection {} unsubscribed from {}", conn_id, channel);
                WsMessage::Subscribed(SubscriptionConfirm {
                    channel,
                    subscribed: false,
                })
            }
            Err(message) => WsMessage::Error(WsError { code: 400, message }),
        },
        ClientMessage::Ping => WsMessage::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::Caller, routes::test_support::TestApp, types::Amount};
    use ethers::types::Address;

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let hub = WsHub::new();
        hub.register_connection("c1".into(), 0).await;

        let reply = handle_client_message(
            &hub,
            "c1",
            ClientMessage::Subscribe {
                channel: "loan:3".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, WsMessage::Subscribed(SubscriptionConfirm { subscribed: true, .. })));
        assert!(hub.subscriptions("c1").await.contains(&Channel::Loan(3)));

        let reply = handle_client_message(
            &hub,
            "c1",
            ClientMessage::Unsubscribe {
                channel: "all".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, WsMessage::Subscribed(SubscriptionConfirm { subscribed: false, .. })));
        assert_eq!(hub.subscriptions("c1").await, vec![Channel::Loan(3)]);
    }

    #[tokio::test]
    async fn test_bad_channel_and_ping() {
        let hub = WsHub::new();
        hub.register_connection("c1".into(), 0).await;

        let reply = handle_client_message(
            &hub,
            "c1",
            ClientMessage::Subscribe {
                channel: "pool_status".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, WsMessage::Error(WsError { code: 400, .. })));

        let reply = handle_client_message(&hub, "c1", ClientMessage::Ping).await;
        assert!(matches!(reply, WsMessage::Pong));
    }

    #[tokio::test]
    async fn test_party_subscriber_receives_take_from_update_alone() {
        let t = TestApp::new().await;
        let lender = Caller::verified(Address::repeat_byte(0x1e));
        let borrower = Caller::verified(Address::repeat_byte(0xb0));
        let hub = &t.state.ws_hub;
        hub.register_connection("c1".into(), 0).await;
        hub.unsubscribe("c1", &Channel::All).await;
        hub.subscribe("c1", Channel::Party(borrower.address())).await;

        let ledger = &t.state.ledger;
        let mut rx = ledger.subscribe();
        ledger
            .offer_loan(lender, Amount::from_ether(10), 5, Amount::from_ether(5))
            .await
            .unwrap();
        ledger
            .take_loan(borrower, 1, Amount::from_ether(10))
            .await
            .unwrap();

        // offer 시점에는 borrower가 없음
        let offered = rx.recv().await.unwrap();
        assert!(!hub.should_deliver("c1", &offered).await);

        // 업데이트에 실린 레코드만으로 party 판별
        let taken = rx.recv().await.unwrap();
        assert_eq!(taken.loan.borrower, Some(borrower.address()));
        assert!(hub.should_deliver("c1", &taken).await);
    }
}
