use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Uuid,
}

/// WebSocket upgrade for the notification feed. Each connection subscribes
/// to its user's Redis channel, so delivery works no matter which instance
/// published the event.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let mut pubsub = match state.notifier.subscribe(user_id).await {
        Ok(pubsub) => pubsub,
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "notification subscription failed");
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let mut published = pubsub.on_message();
    let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
            event = published.next() => {
                match event {
                    Some(msg) => {
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::error!(error = %e, "undecodable notification payload");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!(user_id = %user_id, "notification stream closed");
}
