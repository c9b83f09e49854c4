//! Discovery progress events.
//!
//! The discovery pipeline reports what it is doing through a broadcast
//! channel so that other parts of the process (a status endpoint, a UI) can
//! follow along without being wired into the pipeline itself.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted while discovering sticks and sensors.
///
/// All events are serializable for logging and status reporting.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiscoveryEvent {
    /// A candidate stick reported presence and was selected.
    StickFound { model: String },
    /// No candidate stick was present.
    NoStickFound,
    /// The selected stick finished its startup.
    StickReady { model: String },
    /// Opening the stick failed; discovery stops.
    StartupFailed { model: String, error: String },
    /// A scan for a category began.
    ScanStarted { category: String },
    /// A device attached and its telemetry is now wired.
    SensorAttached { category: String },
    /// A category's scan gave up.
    ScanFailed { category: String, error: String },
    /// Discovery finished; telemetry is purely event-driven from here.
    Listening { attached: Vec<String> },
}

/// Sender for discovery events.
pub type EventSender = broadcast::Sender<DiscoveryEvent>;

/// Receiver for discovery events.
pub type EventReceiver = broadcast::Receiver<DiscoveryEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: DiscoveryEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_to_multiple_receivers() {
        let dispatcher = EventDispatcher::default();
        let mut rx1 = dispatcher.subscribe();
        let mut rx2 = dispatcher.subscribe();

        dispatcher.send(DiscoveryEvent::StickReady {
            model: "GarminStick3".into(),
        });

        assert_eq!(
            rx1.recv().await.unwrap(),
            DiscoveryEvent::StickReady {
                model: "GarminStick3".into()
            }
        );
        assert!(matches!(
            rx2.recv().await.unwrap(),
            DiscoveryEvent::StickReady { .. }
        ));
    }

    #[test]
    fn test_send_without_receivers_is_ignored() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.send(DiscoveryEvent::NoStickFound);
        let mut late = dispatcher.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = DiscoveryEvent::ScanFailed {
            category: "hr".into(),
            error: "timed out".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scan_failed");
        assert_eq!(json["category"], "hr");

        let json = serde_json::to_string(&DiscoveryEvent::NoStickFound).unwrap();
        assert_eq!(json, r#"{"type":"no_stick_found"}"#);
    }
}
