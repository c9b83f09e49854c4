//! Sensor attachment scanning.
//!
//! A scan builds the category's driver against the open stick, tells it to
//! search, and waits for the first "attached" signal. Duplicate attach
//! signals from the driver are absorbed by the one-shot.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::SensorCategory;
use crate::sensor::SensorInstance;
use crate::signal::OneShot;
use crate::transport::SharedTransport;

/// How scans for successive categories are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// One category at a time, in registration order.
    #[default]
    Sequential,
    /// Every category at once; each is wired as soon as it attaches.
    Concurrent,
}

/// Options for scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Give up on a category after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Scheduling policy across categories.
    pub policy: ScanPolicy,
}

impl ScanOptions {
    /// Create new scan options with defaults (sequential, no timeout).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-category timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the per-category timeout in seconds; `0` disables it.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Set the scheduling policy.
    #[must_use]
    pub fn policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Runs "scan until first attach" operations.
#[derive(Debug, Clone, Default)]
pub struct SensorScanner {
    timeout: Option<Duration>,
}

impl SensorScanner {
    /// Create a scanner with the given options.
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            timeout: options.timeout,
        }
    }

    /// Scan for one device of `category` through `transport`.
    ///
    /// Issues exactly one scan command to the driver and resolves with the
    /// attached instance on the first attach signal.
    ///
    /// # Errors
    ///
    /// - [`Error::Driver`] if the driver refuses to start scanning.
    /// - [`Error::ScanTimedOut`] if nothing attaches within the timeout.
    /// - [`Error::SignalAbandoned`] if the driver drops the attach signal.
    pub async fn scan(
        &self,
        category: &SensorCategory,
        transport: &SharedTransport,
    ) -> Result<Arc<SensorInstance>> {
        let driver = category.create_driver(Arc::clone(transport));

        let (attached, settled) = OneShot::channel("attached");
        driver.on_attached(attached);

        debug!("Scanning for {} sensor", category.name());
        driver.begin_scan()?;

        match settled.wait_optional(self.timeout).await {
            Ok(()) => {
                info!("{} sensor attached", category.name());
                Ok(Arc::new(SensorInstance::new(
                    category.name(),
                    driver,
                    transport,
                )))
            }
            Err(Error::Timeout { duration, .. }) => {
                Err(Error::scan_timed_out(category.name(), duration))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{SimulatedAntPlus, SimulatedStick};
    use antws_types::profile::{BIKE_POWER, HEART_RATE};

    fn stick() -> SharedTransport {
        Arc::new(SimulatedStick::new("GarminStick3"))
    }

    #[tokio::test]
    async fn test_scan_resolves_on_attach() {
        let sim = SimulatedAntPlus::new();
        let category = SensorCategory::from_profile(&HEART_RATE, sim.factory_for(&HEART_RATE)).unwrap();
        let transport = stick();

        let instance = SensorScanner::default().scan(&category, &transport).await.unwrap();
        assert_eq!(instance.category(), "hr");
        assert_eq!(instance.transport_model().as_deref(), Some("GarminStick3"));

        let sensors = sim.sensors("hr");
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].scan_calls(), 1);
    }

    #[tokio::test]
    async fn test_scan_resolves_once_under_repeated_attach() {
        let sim = SimulatedAntPlus::new().attach_firings(4);
        let category = SensorCategory::from_profile(&HEART_RATE, sim.factory_for(&HEART_RATE)).unwrap();
        let transport = stick();

        SensorScanner::default().scan(&category, &transport).await.unwrap();

        let sensors = sim.sensors("hr");
        let sensor = &sensors[0];
        assert_eq!(sensor.attach_fired(), 4);
        assert_eq!(sensor.attach_accepted(), 1);
        assert!(!sensor.fire_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_times_out_without_device() {
        let sim = SimulatedAntPlus::new().absent(BIKE_POWER.name);
        let category = SensorCategory::from_profile(&BIKE_POWER, sim.factory_for(&BIKE_POWER)).unwrap();
        let transport = stick();

        let scanner = SensorScanner::new(&ScanOptions::new().timeout(Duration::from_secs(10)));
        let err = scanner.scan(&category, &transport).await.unwrap_err();

        match err {
            Error::ScanTimedOut { category, duration } => {
                assert_eq!(category, "bike_power");
                assert_eq!(duration, Duration::from_secs(10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_begin_scan_failure_propagates() {
        let sim = SimulatedAntPlus::new().failing_scan(HEART_RATE.name);
        let category = SensorCategory::from_profile(&HEART_RATE, sim.factory_for(&HEART_RATE)).unwrap();
        let transport = stick();

        let err = SensorScanner::default().scan(&category, &transport).await.unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
    }

    #[test]
    fn test_scan_options_builder() {
        let options = ScanOptions::new()
            .timeout_secs(0)
            .policy(ScanPolicy::Concurrent);
        assert_eq!(options.timeout, None);
        assert_eq!(options.policy, ScanPolicy::Concurrent);

        let options = ScanOptions::new().timeout_secs(45);
        assert_eq!(options.timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_scan_policy_serde() {
        let policy: ScanPolicy = serde_json::from_str("\"concurrent\"").unwrap();
        assert_eq!(policy, ScanPolicy::Concurrent);
        assert_eq!(ScanPolicy::default(), ScanPolicy::Sequential);
    }
}
