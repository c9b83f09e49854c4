//! Wiring the discovery pipeline into the service.

use std::sync::Arc;
use std::time::Duration;

use antws_core::mock::{SimulatedAntPlus, SimulatedStick};
use antws_core::{
    Discovery, DiscoveryOutcome, SensorRegistry, SharedTransport, TelemetryPublisher,
};
use antws_types::ANT_PLUS_PROFILES;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::hardware::{UnsupportedDriver, UsbStick};
use crate::state::AppState;

/// How long simulated sensors take to attach.
const SIMULATED_ATTACH_DELAY: Duration = Duration::from_millis(750);

/// How often simulated sensors report.
const SIMULATED_FRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Stick candidates, newest model first.
pub fn candidate_sticks(config: &DiscoveryConfig) -> Vec<SharedTransport> {
    if config.simulate {
        vec![
            Arc::new(
                SimulatedStick::builder("GarminStick3")
                    .ready_delay(Duration::from_millis(250))
                    .build(),
            ) as SharedTransport,
            Arc::new(SimulatedStick::builder("GarminStick2").present(false).build())
                as SharedTransport,
        ]
    } else {
        UsbStick::candidates()
    }
}

/// Sensor categories to scan for, in scan order.
pub fn sensor_registry(config: &DiscoveryConfig) -> antws_core::Result<SensorRegistry> {
    let registry = if config.simulate {
        let sim = SimulatedAntPlus::new()
            .attach_delay(SIMULATED_ATTACH_DELAY)
            .frame_interval(SIMULATED_FRAME_INTERVAL);
        SensorRegistry::from_profiles(&ANT_PLUS_PROFILES, |p| sim.factory_for(p))?
    } else {
        SensorRegistry::from_profiles(&ANT_PLUS_PROFILES, |_| UnsupportedDriver::factory())?
    };
    registry.with_only(&config.categories)
}

/// Build the pipeline publishing into the state's hub.
pub fn build_discovery(state: &AppState) -> antws_core::Result<Discovery> {
    let config = &state.config.discovery;
    let registry = sensor_registry(config)?;
    let publisher = TelemetryPublisher::new(state.hub.clone()).verbose(config.verbose);

    Ok(
        Discovery::new(candidate_sticks(config), Arc::new(registry), publisher)
            .with_options(config.scan_options())
            .with_events(state.events.clone()),
    )
}

/// Run discovery in the background.
///
/// The stick and sensors live as long as `discovery` does, so the caller
/// keeps its handle for the life of the service.
pub fn spawn_discovery(discovery: Arc<Discovery>) -> JoinHandle<DiscoveryOutcome> {
    tokio::spawn(async move {
        let outcome = discovery.run().await;
        match &outcome {
            DiscoveryOutcome::Listening { .. } => info!("{}", outcome),
            _ => warn!("{}; serving without sensors", outcome),
        }
        outcome
    })
}
