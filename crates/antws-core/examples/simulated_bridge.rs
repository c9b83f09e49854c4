//! Example: Discovery Against Simulated Hardware
//!
//! This example runs the full discovery pipeline against a simulated
//! GarminStick3 and a simulated set of ANT+ sensors, printing every message
//! the pipeline publishes.
//!
//! Run with: `cargo run --example simulated_bridge -- [SECONDS]`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use antws_core::mock::{SimulatedAntPlus, SimulatedStick};
use antws_core::{
    Discovery, PubSubBridge, Publication, PublishError, ScanOptions, SensorRegistry,
    SharedTransport, TelemetryPublisher,
};
use antws_types::{ANT_PLUS_PROFILES, Message};

struct PrintBridge;

impl PubSubBridge for PrintBridge {
    fn publish(&self, topic: &str, message: Message) -> Result<Publication, PublishError> {
        println!("{:<16} {}", topic, message.text);
        Ok(Publication {
            topic: topic.to_string(),
            receivers: 1,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let seconds: u64 = env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(5);

    let sim = SimulatedAntPlus::new()
        .attach_delay(Duration::from_millis(300))
        .frame_interval(Duration::from_secs(1));
    let registry = SensorRegistry::from_profiles(&ANT_PLUS_PROFILES, |p| sim.factory_for(p))?;

    let discovery = Discovery::new(
        vec![
            Arc::new(SimulatedStick::new("GarminStick3")) as SharedTransport,
            Arc::new(SimulatedStick::new("GarminStick2")) as SharedTransport,
        ],
        Arc::new(registry),
        TelemetryPublisher::new(Arc::new(PrintBridge)),
    )
    .with_options(ScanOptions::new().timeout_secs(10));

    println!("Discovering sensors...");
    let outcome = discovery.run().await;
    println!("{}", outcome);
    println!();

    if outcome.is_listening() {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    }

    Ok(())
}
