//! Error types for antws-core.
//!
//! This module defines the errors that can occur while bringing up a radio
//! stick and discovering sensors.
//!
//! # Where errors surface
//!
//! | Error | Raised by | Effect on the pipeline |
//! |-------|-----------|------------------------|
//! | [`Error::TransportOpen`] | [`crate::StickManager::startup`] | Discovery stops, no scan is attempted |
//! | [`Error::AlreadyStarted`] | [`crate::StickManager::startup`] | Programming error, second call rejected |
//! | [`Error::ScanTimedOut`] | [`crate::SensorScanner::scan`] | That category is skipped |
//! | [`Error::SignalAbandoned`] | one-shot waits | The driver went away before signalling |
//! | [`Error::Driver`] | sensor drivers | That category is skipped |
//! | [`Error::InvalidConfig`] | registry construction | Fix configuration and restart |
//!
//! A missing stick is not an error: it is reported as
//! [`crate::DiscoveryOutcome::NoTransportFound`]. Publish failures belong to
//! the bridge and are reported as [`crate::PublishError`]; the fan-out only
//! logs them.

use std::time::Duration;

use thiserror::Error;

use crate::sensor::DriverError;

/// Errors raised by the discovery pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport's `open()` reported immediate failure.
    #[error("Unable to open {model} stick")]
    TransportOpen {
        /// Model name of the stick that failed.
        model: String,
    },

    /// `startup()` was called more than once on the same stick.
    #[error("Stick {model} was already started")]
    AlreadyStarted {
        /// Model name of the stick.
        model: String,
    },

    /// No device of the category attached before the scan deadline.
    #[error("Scan for '{category}' timed out after {duration:?}")]
    ScanTimedOut {
        /// Category that was being scanned.
        category: String,
        /// The configured scan timeout.
        duration: Duration,
    },

    /// A generic wait exceeded its deadline.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Every sender of a one-shot signal was dropped before it fired.
    #[error("Signal '{signal}' was dropped before it fired")]
    SignalAbandoned {
        /// Name of the signal (`ready`, `attached`).
        signal: &'static str,
    },

    /// A sensor driver rejected a command.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Frame serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a transport open error.
    pub fn transport_open(model: impl Into<String>) -> Self {
        Self::TransportOpen {
            model: model.into(),
        }
    }

    /// Create a scan timeout error.
    pub fn scan_timed_out(category: impl Into<String>, duration: Duration) -> Self {
        Self::ScanTimedOut {
            category: category.into(),
            duration,
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using antws-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport_open("GarminStick3");
        assert_eq!(err.to_string(), "Unable to open GarminStick3 stick");

        let err = Error::scan_timed_out("hr", Duration::from_secs(30));
        assert!(err.to_string().contains("'hr'"));
        assert!(err.to_string().contains("30s"));

        let err = Error::SignalAbandoned { signal: "ready" };
        assert!(err.to_string().contains("ready"));

        let err = Error::invalid_config("duplicate category 'hr'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: duplicate category 'hr'"
        );
    }
}
