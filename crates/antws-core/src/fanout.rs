//! Telemetry fan-out to the pub/sub bridge.
//!
//! For every attached sensor and every event name of its category,
//! [`TelemetryPublisher::wire`] installs a handler that tags the frame,
//! publishes it on `/<category>` and logs it. Handlers are permanent; there is
//! no unsubscribe path.
//!
//! # Logging
//!
//! Every frame is logged once as a JSON dump. In verbose mode each field is
//! additionally logged on its own line as `key: value`, before the dump.

use std::sync::Arc;

use antws_types::{Message, TelemetryFrame, topic_for};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::sensor::SensorInstance;

/// Error returned by a pub/sub bridge.
#[derive(Debug, Clone, Error)]
#[error("Publish to '{topic}' failed: {reason}")]
pub struct PublishError {
    /// Topic the message was meant for.
    pub topic: String,
    /// Why the bridge refused it.
    pub reason: String,
}

impl PublishError {
    /// Create a publish error.
    pub fn new(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Handle describing a message the bridge accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Topic the message was published on.
    pub topic: String,
    /// Subscribers the bridge handed it to (0 is normal).
    pub receivers: usize,
}

/// The publish side of the pub/sub transport.
///
/// `publish` is called from sensor handlers, possibly from several drivers
/// at once, and must not block.
pub trait PubSubBridge: Send + Sync {
    /// Hand `message` to the bus on `topic`. No acknowledgement is awaited.
    fn publish(&self, topic: &str, message: Message) -> Result<Publication, PublishError>;
}

/// Wires sensor telemetry streams to a [`PubSubBridge`].
#[derive(Clone)]
pub struct TelemetryPublisher {
    bridge: Arc<dyn PubSubBridge>,
    verbose: bool,
}

impl std::fmt::Debug for TelemetryPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPublisher")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl TelemetryPublisher {
    /// Create a publisher.
    pub fn new(bridge: Arc<dyn PubSubBridge>) -> Self {
        Self {
            bridge,
            verbose: false,
        }
    }

    /// Enable per-field logging.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Subscribe a handler for each of `event_names` on `instance`.
    pub fn wire(&self, instance: &SensorInstance, event_names: &[String]) {
        for event_name in event_names {
            let bridge = Arc::clone(&self.bridge);
            let category = instance.category().to_string();
            let event = event_name.clone();
            let verbose = self.verbose;
            instance.driver().subscribe(
                event_name,
                Box::new(move |frame| {
                    forward(bridge.as_ref(), &category, &event, frame, verbose);
                }),
            );
        }
    }
}

/// Tag, publish and log one frame.
///
/// Returns the tagged frame so callers (and tests) can inspect what was sent.
pub fn forward(
    bridge: &dyn PubSubBridge,
    category: &str,
    event_name: &str,
    mut frame: TelemetryFrame,
    verbose: bool,
) -> TelemetryFrame {
    frame.tag(category, event_name);
    let topic = topic_for(category);

    match Message::from_frame(&frame) {
        Ok(message) => {
            if let Err(e) = bridge.publish(&topic, message) {
                warn!("{}", e);
            }
        }
        Err(e) => warn!("Failed to serialize {} frame: {}", category, e),
    }

    for line in frame_log_lines(&frame, verbose) {
        info!(target: "antws_core::fanout", "{}", line);
    }
    frame
}

/// The log lines emitted for a tagged frame.
///
/// Non-verbose: just the JSON dump. Verbose: one `key: value` line per field
/// followed by the dump.
pub fn frame_log_lines(frame: &TelemetryFrame, verbose: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(if verbose { frame.len() + 1 } else { 1 });
    if verbose {
        lines.extend(frame.iter().map(|(key, value)| match value {
            Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        }));
    }
    lines.push(frame.to_string());
    lines
}
