//! Bayeux-style client protocol.
//!
//! Clients speak JSON over the WebSocket at `/`. A frame holds one message
//! object or an array of them. Supported meta channels:
//!
//! - `/meta/handshake` – returns a `clientId`
//! - `/meta/connect` – keep-alive, acknowledged with reconnect advice
//! - `/meta/subscribe` / `/meta/unsubscribe` – `subscription` is a channel
//!   pattern or a list of them; each gets its own acknowledgement
//! - `/meta/disconnect` – acknowledged, then the connection is closed
//!
//! Telemetry arrives as `{"channel":"/hr","data":{"text":"..."}}`.
//!
//! Unlike a stock Faye server, which relays a client publish to every other
//! subscriber, this endpoint rejects publishes on non-meta channels with
//! `403`. The bridge is the only source of telemetry, so a subscriber on
//! `/hr` only ever sees frames from the heart rate sensor.

use std::collections::BTreeSet;
use std::time::Duration;

use antws_types::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::hub::{Delivery, META_PREFIX, channel_matches, is_valid_pattern};

/// Protocol version reported in handshakes.
pub const BAYEUX_VERSION: &str = "1.0";

const HANDSHAKE: &str = "/meta/handshake";
const CONNECT: &str = "/meta/connect";
const SUBSCRIBE: &str = "/meta/subscribe";
const UNSUBSCRIBE: &str = "/meta/unsubscribe";
const DISCONNECT: &str = "/meta/disconnect";
const ERROR_CHANNEL: &str = "/meta/error";

/// One or more values, as Bayeux allows for subscriptions and frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientMessage {
    pub channel: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub subscription: Option<OneOrMany<String>>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A message sent to a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerMessage {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        rename = "supportedConnectionTypes"
    )]
    pub supported_connection_types: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Message>,
}

impl ServerMessage {
    fn ack(request: &ClientMessage) -> Self {
        Self {
            channel: request.channel.clone(),
            successful: Some(true),
            id: request.id.clone(),
            ..Default::default()
        }
    }

    fn reject(request: &ClientMessage, error: String) -> Self {
        Self {
            channel: request.channel.clone(),
            successful: Some(false),
            id: request.id.clone(),
            error: Some(error),
            ..Default::default()
        }
    }
}

impl From<Delivery> for ServerMessage {
    fn from(delivery: Delivery) -> Self {
        Self {
            channel: delivery.channel,
            data: Some(delivery.data),
            ..Default::default()
        }
    }
}

/// Protocol state for one connected client.
#[derive(Debug)]
pub struct Session {
    client_id: String,
    subscriptions: BTreeSet<String>,
    ping_interval: Duration,
    closed: bool,
}

impl Session {
    /// Start a session with a fresh client id.
    pub fn new(ping_interval: Duration) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            subscriptions: BTreeSet::new(),
            ping_interval,
            closed: false,
        }
    }

    /// The id handed out at handshake.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current subscription patterns.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Whether the client asked to disconnect.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a delivery on `channel` should be forwarded to this client.
    pub fn wants(&self, channel: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|pattern| channel_matches(pattern, channel))
    }

    /// Handle one text frame and return the replies to send.
    pub fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        match serde_json::from_str::<OneOrMany<ClientMessage>>(text) {
            Ok(messages) => messages
                .into_vec()
                .into_iter()
                .flat_map(|message| self.handle(message))
                .collect(),
            Err(e) => {
                debug!("Malformed client message: {}", e);
                vec![ServerMessage {
                    channel: ERROR_CHANNEL.to_string(),
                    successful: Some(false),
                    error: Some(format!("400::Malformed message: {}", e)),
                    ..Default::default()
                }]
            }
        }
    }

    /// Handle one client message.
    pub fn handle(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message.channel.as_str() {
            HANDSHAKE => vec![ServerMessage {
                client_id: Some(self.client_id.clone()),
                version: Some(BAYEUX_VERSION),
                supported_connection_types: Some(vec!["websocket"]),
                ..ServerMessage::ack(&message)
            }],
            CONNECT => vec![ServerMessage {
                client_id: Some(self.client_id.clone()),
                advice: Some(json!({
                    "reconnect": "retry",
                    "interval": 0,
                    "timeout": self.ping_interval.as_millis() as u64,
                })),
                ..ServerMessage::ack(&message)
            }],
            SUBSCRIBE => self.subscription_change(&message, true),
            UNSUBSCRIBE => self.subscription_change(&message, false),
            DISCONNECT => {
                self.closed = true;
                vec![ServerMessage::ack(&message)]
            }
            channel if channel.starts_with(META_PREFIX) => vec![ServerMessage::reject(
                &message,
                format!("404:{}:Unknown meta channel", channel),
            )],
            channel => vec![ServerMessage::reject(
                &message,
                format!("403:{}:Publishing is not allowed", channel),
            )],
        }
    }

    fn subscription_change(&mut self, message: &ClientMessage, subscribe: bool) -> Vec<ServerMessage> {
        let Some(patterns) = message.subscription.clone().map(OneOrMany::into_vec) else {
            return vec![ServerMessage::reject(
                message,
                "400::Missing subscription".to_string(),
            )];
        };

        patterns
            .into_iter()
            .map(|pattern| {
                if !is_valid_pattern(&pattern) || pattern.starts_with(META_PREFIX) {
                    return ServerMessage {
                        subscription: Some(pattern.clone()),
                        ..ServerMessage::reject(message, format!("405:{}:Invalid channel", pattern))
                    };
                }
                if subscribe {
                    debug!("Client {} subscribed to {}", self.client_id, pattern);
                    self.subscriptions.insert(pattern.clone());
                } else {
                    debug!("Client {} unsubscribed from {}", self.client_id, pattern);
                    self.subscriptions.remove(&pattern);
                }
                ServerMessage {
                    subscription: Some(pattern),
                    ..ServerMessage::ack(message)
                }
            })
            .collect()
    }
}
