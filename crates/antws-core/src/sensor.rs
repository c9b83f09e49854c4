//! Sensor drivers and attached sensor instances.

use std::fmt;
use std::sync::{Arc, Weak};

use antws_types::TelemetryFrame;
use thiserror::Error;

use crate::signal::OneShot;
use crate::transport::Transport;

/// Callback invoked for every telemetry frame on one event stream.
///
/// Handlers run synchronously inside the driver's delivery path and must not
/// block.
pub type TelemetryHandler = Box<dyn Fn(TelemetryFrame) + Send + Sync>;

/// Error reported by a sensor driver.
#[derive(Debug, Clone, Error)]
#[error("Driver error: {message}")]
pub struct DriverError {
    /// What the driver reported.
    pub message: String,
}

impl DriverError {
    /// Create a driver error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Capability interface every sensor category driver exposes.
///
/// Drivers differ only in how they are constructed and in the event names
/// they emit; the names come from the category descriptor, so one trait
/// covers every ANT+ profile.
pub trait SensorDriver: Send + Sync {
    /// Ask the radio to start searching for a device of this category.
    fn begin_scan(&self) -> Result<(), DriverError>;

    /// Register the signal to fire when a device attaches.
    fn on_attached(&self, attached: OneShot<()>);

    /// Register a handler for one named telemetry stream.
    fn subscribe(&self, event_name: &str, handler: TelemetryHandler);
}

/// One attached physical device of a given category.
pub struct SensorInstance {
    category: String,
    driver: Box<dyn SensorDriver>,
    transport: Weak<dyn Transport>,
}

impl SensorInstance {
    pub(crate) fn new(
        category: impl Into<String>,
        driver: Box<dyn SensorDriver>,
        transport: &Arc<dyn Transport>,
    ) -> Self {
        Self {
            category: category.into(),
            driver,
            transport: Arc::downgrade(transport),
        }
    }

    /// Category the device was discovered under.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The underlying driver.
    pub fn driver(&self) -> &dyn SensorDriver {
        self.driver.as_ref()
    }

    /// Model of the stick the device is attached through, if it still exists.
    pub fn transport_model(&self) -> Option<String> {
        self.transport.upgrade().map(|t| t.model().to_string())
    }
}

impl fmt::Debug for SensorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorInstance")
            .field("category", &self.category)
            .field("transport", &self.transport_model())
            .finish()
    }
}
