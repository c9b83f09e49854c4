//! Application state shared across handlers.
//!
//! # Broadcast Channel Behavior
//!
//! Telemetry reaches WebSocket clients through the [`Hub`] broadcast channel:
//!
//! - **Buffer size**: configurable via `server.broadcast_buffer` (default: 256)
//! - **Message loss**: a client that falls behind by more than the buffer
//!   loses the oldest messages and a warning is logged
//! - **No blocking**: the sensor callbacks never wait on slow clients
//!
//! ```toml
//! [server]
//! broadcast_buffer = 512  # Larger buffer for slow clients
//! ```

use std::sync::Arc;

use antws_core::{DiscoveryEvent, EventDispatcher, EventReceiver};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::hub::Hub;

/// Shared application state.
pub struct AppState {
    /// Effective configuration (file plus command-line overrides).
    pub config: Config,
    /// Pub/sub hub fed by the discovery pipeline.
    pub hub: Arc<Hub>,
    /// Discovery progress events.
    pub events: EventDispatcher,
    /// Discovery progress, as reported by `/api/status`.
    pub discovery: RwLock<DiscoveryStatus>,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    /// Create new application state.
    ///
    /// The hub buffer size is taken from `config.server.broadcast_buffer`.
    pub fn new(config: Config) -> Arc<Self> {
        let hub = Arc::new(Hub::new(config.server.broadcast_buffer));
        Arc::new(Self {
            config,
            hub,
            events: EventDispatcher::default(),
            discovery: RwLock::new(DiscoveryStatus::default()),
            started_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Where discovery currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// Discovery has not reported anything yet.
    #[default]
    Pending,
    /// A stick was selected and is starting up.
    Starting,
    /// The stick is up and sensors are being scanned.
    Scanning,
    /// Discovery finished; telemetry flows as sensors report.
    Listening,
    /// No stick was present.
    NoStick,
    /// The selected stick failed to start.
    Failed,
}

/// Discovery progress summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStatus {
    pub phase: DiscoveryPhase,
    /// Model of the selected stick.
    pub stick: Option<String>,
    /// Categories whose scan has started but not finished.
    pub scanning: Vec<String>,
    /// Categories with an attached sensor.
    pub attached: Vec<String>,
    /// Categories whose scan gave up.
    pub failed: Vec<String>,
    /// Last startup error.
    pub error: Option<String>,
}

impl DiscoveryStatus {
    /// Fold one event into the summary.
    pub fn apply(&mut self, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::StickFound { model } => {
                self.phase = DiscoveryPhase::Starting;
                self.stick = Some(model.clone());
            }
            DiscoveryEvent::NoStickFound => self.phase = DiscoveryPhase::NoStick,
            DiscoveryEvent::StickReady { .. } => self.phase = DiscoveryPhase::Scanning,
            DiscoveryEvent::StartupFailed { error, .. } => {
                self.phase = DiscoveryPhase::Failed;
                self.error = Some(error.clone());
            }
            DiscoveryEvent::ScanStarted { category } => push_unique(&mut self.scanning, category),
            DiscoveryEvent::SensorAttached { category } => {
                self.scanning.retain(|c| c != category);
                push_unique(&mut self.attached, category);
            }
            DiscoveryEvent::ScanFailed { category, .. } => {
                self.scanning.retain(|c| c != category);
                push_unique(&mut self.failed, category);
            }
            DiscoveryEvent::Listening { attached } => {
                self.phase = DiscoveryPhase::Listening;
                self.scanning.clear();
                self.attached = attached.clone();
            }
            _ => debug!("Ignoring discovery event {:?}", event),
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Follow discovery events and keep `state.discovery` current.
///
/// Subscribe before discovery starts, or early events are missed.
pub fn track_discovery(state: Arc<AppState>, mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => state.discovery.write().await.apply(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Discovery status skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
