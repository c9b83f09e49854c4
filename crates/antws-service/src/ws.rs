//! WebSocket endpoint for pub/sub clients.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::protocol::{ServerMessage, Session};
use crate::state::AppState;

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(ws_handler))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize replies into one text frame. Single replies are sent bare,
/// batches as an array.
fn encode(replies: &[ServerMessage]) -> Option<String> {
    let encoded = match replies {
        [] => return None,
        [single] => serde_json::to_string(single),
        many => serde_json::to_string(many),
    };
    match encoded {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to serialize reply: {}", e);
            None
        }
    }
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading anything so nothing published after a
    // subscribe ack is missed.
    let mut rx = state.hub.subscribe();
    let _client = state.hub.client_connected();
    let mut session = Session::new(state.config.server.ping_interval());
    let mut ping = tokio::time::interval(state.config.server.ping_interval());
    ping.tick().await;

    info!("WebSocket client {} connected", session.client_id());

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                };

                let replies = session.handle_text(text.as_str());
                if let Some(reply) = encode(&replies)
                    && sender.send(Message::Text(reply.into())).await.is_err()
                {
                    break;
                }
                if session.is_closed() {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
            delivery = rx.recv() => {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Client {} lagging, dropped {} messages",
                            session.client_id(),
                            skipped
                        );
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !session.wants(&delivery.channel) {
                    continue;
                }
                let Some(text) = encode(&[ServerMessage::from(delivery)]) else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                debug!("Pinging client {}", session.client_id());
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("WebSocket client {} disconnected", session.client_id());
}
