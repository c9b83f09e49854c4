//! Platform-agnostic types for the ANT+ to pub/sub bridge.
//!
//! This crate provides the data shared by the discovery core
//! (antws-core) and the network service (antws-service).
//!
//! # Features
//!
//! - [`TelemetryFrame`]: the key/value record a sensor emits, and its tagging
//! - [`Message`]: the `{ text }` envelope handed to the pub/sub layer
//! - [`profile`]: the static table of supported ANT+ device profiles
//! - Error types for frame and topic parsing
//!
//! # Example
//!
//! ```
//! use antws_types::{Message, TelemetryFrame, topic_for};
//!
//! let mut frame = TelemetryFrame::new().with("heartRate", 72);
//! frame.tag("hr", "hbData");
//!
//! let message = Message::from_frame(&frame).unwrap();
//! assert_eq!(topic_for("hr"), "/hr");
//! assert!(message.text.contains("\"eventName\":\"hbData\""));
//! ```

pub mod error;
pub mod frame;
pub mod profile;

pub use error::{ParseError, ParseResult};
pub use frame::{
    EVENT_NAME_FIELD, Message, TYPE_FIELD, TelemetryFrame, category_from_topic, topic_for,
};
pub use profile::{ANT_PLUS_PROFILES, SensorProfile};
