//! Stick lifecycle, sensor discovery and telemetry fan-out for ANT+ bridges.
//!
//! This crate brings up a USB ANT+ stick, attaches one device of each
//! registered sensor category and forwards every telemetry frame those
//! devices emit to a pub/sub bus, one topic per category.
//!
//! # Features
//!
//! - **Stick selection**: probe candidate sticks in priority order and use the first present one
//! - **Startup**: open the stick and wait for its ready signal, once
//! - **Discovery**: scan each category until a device attaches, sequentially or concurrently
//! - **Fan-out**: tag each frame with its category and event name, publish it on `/<category>`
//! - **Progress events**: follow discovery through a broadcast channel
//! - **Simulation**: simulated sticks and sensors for tests and demos
//!
//! # Supported Profiles
//!
//! | Category | Event streams |
//! |----------|---------------|
//! | `hr` | `hbData` |
//! | `bike_power` | `powerData` |
//! | `speed_cadence` | `cadenceData`, `speedData` |
//! | `fitness_equipment` | `fitnessData` |
//! | `stride_speed_distance` | `ssdData` |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use antws_core::mock::{SimulatedAntPlus, SimulatedStick};
//! use antws_core::{
//!     Discovery, PubSubBridge, Publication, PublishError, SensorRegistry, SharedTransport,
//!     TelemetryPublisher,
//! };
//! use antws_types::{ANT_PLUS_PROFILES, Message};
//!
//! struct PrintBridge;
//!
//! impl PubSubBridge for PrintBridge {
//!     fn publish(&self, topic: &str, message: Message) -> Result<Publication, PublishError> {
//!         println!("{topic} {}", message.text);
//!         Ok(Publication { topic: topic.to_string(), receivers: 1 })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sim = SimulatedAntPlus::new();
//!     let registry = SensorRegistry::from_profiles(&ANT_PLUS_PROFILES, |p| sim.factory_for(p))?;
//!
//!     let discovery = Discovery::new(
//!         vec![Arc::new(SimulatedStick::new("GarminStick3")) as SharedTransport],
//!         Arc::new(registry),
//!         TelemetryPublisher::new(Arc::new(PrintBridge)),
//!     );
//!     println!("{}", discovery.run().await);
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod events;
pub mod fanout;
pub mod mock;
pub mod registry;
pub mod scan;
pub mod sensor;
pub mod signal;
pub mod stick;
pub mod transport;

pub use discovery::{Discovery, DiscoveryOutcome};
pub use error::{Error, Result};
pub use events::{DiscoveryEvent, EventDispatcher, EventReceiver, EventSender};
pub use fanout::{PubSubBridge, Publication, PublishError, TelemetryPublisher};
pub use registry::{DriverFactory, SensorCategory, SensorRegistry, SensorRegistryBuilder};
pub use scan::{ScanOptions, ScanPolicy, SensorScanner};
pub use sensor::{DriverError, SensorDriver, SensorInstance, TelemetryHandler};
pub use signal::{OneShot, Settled};
pub use stick::{StickManager, select_present};
pub use transport::{SharedTransport, StickState, Transport};

// Re-export the shared data types
pub use antws_types::{Message, SensorProfile, TelemetryFrame};
