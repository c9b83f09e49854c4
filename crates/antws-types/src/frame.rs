//! Telemetry frames and the messages they are published as.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ParseError, ParseResult};

/// Field holding the originating sensor category after tagging.
pub const TYPE_FIELD: &str = "type";

/// Field holding the telemetry stream name after tagging.
pub const EVENT_NAME_FIELD: &str = "eventName";

/// One structured unit of sensor data emitted by an attached device.
///
/// A frame is an ordered set of driver-specific fields. Once it has passed
/// through [`TelemetryFrame::tag`] it also carries [`TYPE_FIELD`] and
/// [`EVENT_NAME_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryFrame(Map<String, Value>);

impl TelemetryFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Stamp the frame with its category and event name.
    ///
    /// Existing fields with the same names are overwritten, so a tagged frame
    /// always reports the category that produced it.
    pub fn tag(&mut self, category: &str, event_name: &str) {
        self.insert(TYPE_FIELD, category);
        self.insert(EVENT_NAME_FIELD, event_name);
    }

    /// The `type` field, if the frame has been tagged.
    pub fn category(&self) -> Option<&str> {
        self.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// The `eventName` field, if the frame has been tagged.
    pub fn event_name(&self) -> Option<&str> {
        self.get(EVENT_NAME_FIELD).and_then(Value::as_str)
    }

    /// Serialize to compact JSON text.
    pub fn to_json(&self) -> ParseResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Parse a frame from JSON text. The top-level value must be an object.
    pub fn from_json(text: &str) -> ParseResult<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ParseError::NotAnObject("null")),
            Value::Bool(_) => Err(ParseError::NotAnObject("bool")),
            Value::Number(_) => Err(ParseError::NotAnObject("number")),
            Value::String(_) => Err(ParseError::NotAnObject("string")),
            Value::Array(_) => Err(ParseError::NotAnObject("array")),
        }
    }
}

impl From<Map<String, Value>> for TelemetryFrame {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for TelemetryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// A message handed to the pub/sub bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The serialized, tagged telemetry frame.
    pub text: String,
}

impl Message {
    /// Serialize a (tagged) frame into a message.
    pub fn from_frame(frame: &TelemetryFrame) -> ParseResult<Self> {
        Ok(Self {
            text: frame.to_json()?,
        })
    }

    /// Decode the message text back into a frame.
    pub fn frame(&self) -> ParseResult<TelemetryFrame> {
        TelemetryFrame::from_json(&self.text)
    }
}

/// The pub/sub topic for a sensor category: `/` followed by the name.
///
/// ```
/// assert_eq!(antws_types::topic_for("hr"), "/hr");
/// ```
pub fn topic_for(category: &str) -> String {
    format!("/{category}")
}

/// Inverse of [`topic_for`].
pub fn category_from_topic(topic: &str) -> ParseResult<&str> {
    match topic.strip_prefix('/') {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        _ => Err(ParseError::InvalidTopic(topic.to_string())),
    }
}
