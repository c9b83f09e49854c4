//! In-process pub/sub hub.
//!
//! The hub is the [`PubSubBridge`] the discovery pipeline publishes into. Every
//! accepted message is broadcast to all connected WebSocket sessions; each
//! session filters by its own subscriptions.
//!
//! # Channel names
//!
//! Channels are `/`-separated paths such as `/hr`. Subscriptions may end in a
//! wildcard segment:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `/hr` | exactly `/hr` |
//! | `/*` | any single-segment channel (`/hr`, `/bike_power`) |
//! | `/**` | every channel |
//!
//! Channels under `/meta/` are reserved for the protocol and cannot be
//! published to or subscribed to.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use antws_core::{PubSubBridge, Publication, PublishError};
use antws_types::Message;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Prefix of protocol channels.
pub const META_PREFIX: &str = "/meta/";

/// A message on its way to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Channel the message was published on.
    pub channel: String,
    /// The payload.
    pub data: Message,
}

/// Broadcast hub shared by the pipeline and every client session.
#[derive(Debug)]
pub struct Hub {
    tx: broadcast::Sender<Delivery>,
    published: AtomicU64,
    clients: AtomicUsize,
}

impl Hub {
    /// Create a hub buffering up to `buffer` messages per slow receiver.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is 0; configuration validation rejects that.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            published: AtomicU64::new(0),
            clients: AtomicUsize::new(0),
        }
    }

    /// Receive every delivery from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }

    /// Messages accepted since startup.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Connected client sessions.
    pub fn clients(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    /// Count a client session until the returned guard is dropped.
    pub fn client_connected(&self) -> ClientGuard<'_> {
        self.clients.fetch_add(1, Ordering::Relaxed);
        ClientGuard { hub: self }
    }
}

impl PubSubBridge for Hub {
    fn publish(&self, topic: &str, message: Message) -> Result<Publication, PublishError> {
        if !is_valid_channel(topic) || topic.starts_with(META_PREFIX) {
            return Err(PublishError::new(topic, "invalid channel name"));
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        // No receivers is normal: nobody is connected yet.
        let receivers = self
            .tx
            .send(Delivery {
                channel: topic.to_string(),
                data: message,
            })
            .unwrap_or(0);
        trace!("Published on {} to {} receivers", topic, receivers);

        Ok(Publication {
            topic: topic.to_string(),
            receivers,
        })
    }
}

/// Keeps a session counted in [`Hub::clients`].
#[derive(Debug)]
pub struct ClientGuard<'a> {
    hub: &'a Hub,
}

impl Drop for ClientGuard<'_> {
    fn drop(&mut self) {
        self.hub.clients.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Whether `channel` is a concrete channel name (no wildcards).
pub fn is_valid_channel(channel: &str) -> bool {
    match channel.strip_prefix('/') {
        Some(rest) => rest
            .split('/')
            .all(|segment| !segment.is_empty() && !segment.contains('*')),
        None => false,
    }
}

/// Whether `pattern` is a valid subscription: a channel name, optionally
/// ending in a `*` or `**` segment.
pub fn is_valid_pattern(pattern: &str) -> bool {
    let Some(rest) = pattern.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    segments.iter().enumerate().all(|(i, segment)| {
        if i == last && (*segment == "*" || *segment == "**") {
            return true;
        }
        !segment.is_empty() && !segment.contains('*')
    })
}

/// Whether a subscription `pattern` covers `channel`.
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("**") {
        return channel.len() > prefix.len() && channel.starts_with(prefix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return channel
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'));
    }
    pattern == channel
}
