//! The ANT+ device profiles the bridge knows how to scan for.

use serde::Serialize;

/// A sensor category and the telemetry streams its driver emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorProfile {
    /// Category name, also the topic suffix (`/hr`).
    pub name: &'static str,
    /// Human-readable profile name.
    pub description: &'static str,
    /// Telemetry event names, in emission-independent but stable order.
    pub event_names: &'static [&'static str],
}

/// Heart-rate strap.
pub const HEART_RATE: SensorProfile = SensorProfile {
    name: "hr",
    description: "Heart rate monitor",
    event_names: &["hbData"],
};

/// Bicycle power meter.
pub const BIKE_POWER: SensorProfile = SensorProfile {
    name: "bike_power",
    description: "Bicycle power meter",
    event_names: &["powerData"],
};

/// Combined or separate speed and cadence sensor.
pub const SPEED_CADENCE: SensorProfile = SensorProfile {
    name: "speed_cadence",
    description: "Bicycle speed and cadence sensor",
    event_names: &["cadenceData", "speedData"],
};

/// Smart trainer or other fitness equipment.
pub const FITNESS_EQUIPMENT: SensorProfile = SensorProfile {
    name: "fitness_equipment",
    description: "Fitness equipment",
    event_names: &["fitnessData"],
};

/// Foot pod.
pub const STRIDE_SPEED_DISTANCE: SensorProfile = SensorProfile {
    name: "stride_speed_distance",
    description: "Stride-based speed and distance monitor",
    event_names: &["ssdData"],
};

/// Every supported profile in scan order.
pub const ANT_PLUS_PROFILES: [SensorProfile; 5] = [
    HEART_RATE,
    BIKE_POWER,
    SPEED_CADENCE,
    FITNESS_EQUIPMENT,
    STRIDE_SPEED_DISTANCE,
];

/// Look up a profile by category name.
///
/// ```
/// use antws_types::profile;
///
/// assert_eq!(profile::find("hr"), Some(profile::HEART_RATE));
/// assert_eq!(profile::find("radar"), None);
/// ```
pub fn find(name: &str) -> Option<SensorProfile> {
    ANT_PLUS_PROFILES.iter().copied().find(|p| p.name == name)
}
