//! Error types for data parsing in antws-types.

use thiserror::Error;

/// Errors that can occur when building or decoding telemetry data.
///
/// This error type is transport-agnostic and does not include
/// driver or pub/sub errors (those belong in antws-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The decoded JSON value was not an object.
    #[error("Telemetry frame must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The message text was not valid JSON.
    #[error("Invalid message text: {0}")]
    Json(#[from] serde_json::Error),

    /// A topic string did not follow the `/<category>` convention.
    #[error("Invalid topic '{0}': expected '/<category>'")]
    InvalidTopic(String),
}

/// Result type alias using antws-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
