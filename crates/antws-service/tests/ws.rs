//! End-to-end tests of the pub/sub endpoint over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use antws_core::PubSubBridge;
use antws_service::{AppState, Config, app};
use antws_types::Message;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> (Arc<AppState>, SocketAddr) {
    let state = AppState::new(Config::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (state, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    client
}

async fn send(client: &mut Client, value: Value) {
    client
        .send(WsMessage::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a message")
            .unwrap()
            .unwrap();
        if let WsMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn telemetry(text: &str) -> Message {
    Message {
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_subscriber_receives_channel_messages() {
    let (state, addr) = start_server().await;
    let mut client = connect(addr).await;

    send(&mut client, json!({"channel": "/meta/subscribe", "subscription": "/hr"})).await;
    assert_eq!(
        next_json(&mut client).await,
        json!({"channel": "/meta/subscribe", "successful": true, "subscription": "/hr"})
    );

    state
        .hub
        .publish("/bike_power", telemetry(r#"{"power":250}"#))
        .unwrap();
    state
        .hub
        .publish("/hr", telemetry(r#"{"heartRate":72,"type":"hr"}"#))
        .unwrap();

    let delivery = next_json(&mut client).await;
    assert_eq!(delivery["channel"], "/hr");
    let frame: Value = serde_json::from_str(delivery["data"]["text"].as_str().unwrap()).unwrap();
    assert_eq!(frame["heartRate"], 72);
}

#[tokio::test]
async fn test_wildcard_subscription_and_unsubscribe() {
    let (state, addr) = start_server().await;
    let mut client = connect(addr).await;

    send(&mut client, json!({"channel": "/meta/subscribe", "subscription": "/*"})).await;
    next_json(&mut client).await;

    state.hub.publish("/speed_cadence", telemetry("{}")).unwrap();
    assert_eq!(next_json(&mut client).await["channel"], "/speed_cadence");

    send(&mut client, json!({"channel": "/meta/unsubscribe", "subscription": "/*"})).await;
    next_json(&mut client).await;
    send(&mut client, json!({"channel": "/meta/subscribe", "subscription": "/hr"})).await;
    next_json(&mut client).await;

    state.hub.publish("/speed_cadence", telemetry("{}")).unwrap();
    state.hub.publish("/hr", telemetry("{}")).unwrap();
    assert_eq!(next_json(&mut client).await["channel"], "/hr");
}

#[tokio::test]
async fn test_malformed_message_gets_error_reply() {
    let (_state, addr) = start_server().await;
    let mut client = connect(addr).await;

    client
        .send(WsMessage::Text("not json".into()))
        .await
        .unwrap();
    let reply = next_json(&mut client).await;
    assert_eq!(reply["channel"], "/meta/error");
    assert_eq!(reply["successful"], false);
}

#[tokio::test]
async fn test_client_count_tracks_connections() {
    let (state, addr) = start_server().await;
    let mut client = connect(addr).await;

    send(&mut client, json!({"channel": "/meta/handshake"})).await;
    let handshake = next_json(&mut client).await;
    assert!(handshake["clientId"].is_string());
    assert_eq!(state.hub.clients(), 1);

    send(&mut client, json!({"channel": "/meta/disconnect"})).await;
    next_json(&mut client).await;
    drop(client);

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.hub.clients() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
