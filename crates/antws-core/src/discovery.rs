//! The discovery pipeline.
//!
//! Brings up the first present stick, scans every registered category and
//! wires each attached sensor into the telemetry fan-out. After
//! [`Discovery::run`] returns, everything is driven by hardware events.
//!
//! ```no_run
//! use std::sync::Arc;
//! use antws_core::{Discovery, ScanOptions, SensorRegistry, SharedTransport, TelemetryPublisher};
//! use antws_core::mock::{SimulatedAntPlus, SimulatedStick};
//! # use antws_core::{PubSubBridge, Publication, PublishError};
//! # struct NullBridge;
//! # impl PubSubBridge for NullBridge {
//! #     fn publish(&self, topic: &str, _: antws_types::Message) -> Result<Publication, PublishError> {
//! #         Ok(Publication { topic: topic.to_string(), receivers: 0 })
//! #     }
//! # }
//!
//! # async fn example() -> Result<(), antws_core::Error> {
//! let sim = SimulatedAntPlus::new();
//! let registry = SensorRegistry::from_profiles(&antws_types::ANT_PLUS_PROFILES, |p| sim.factory_for(p))?;
//! let discovery = Discovery::new(
//!     vec![Arc::new(SimulatedStick::new("GarminStick3")) as SharedTransport],
//!     Arc::new(registry),
//!     TelemetryPublisher::new(Arc::new(NullBridge)),
//! )
//! .with_options(ScanOptions::new().timeout_secs(30));
//!
//! let outcome = discovery.run().await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::events::{DiscoveryEvent, EventDispatcher};
use crate::fanout::TelemetryPublisher;
use crate::registry::{SensorCategory, SensorRegistry};
use crate::scan::{ScanOptions, ScanPolicy, SensorScanner};
use crate::stick::{StickManager, select_present};
use crate::transport::SharedTransport;

/// How a discovery run ended.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// No candidate stick was present. Not an error.
    NoTransportFound,
    /// The stick could not be brought up; no scan was attempted.
    Failed(Error),
    /// Discovery finished and telemetry is flowing for `attached`.
    Listening {
        /// Model of the stick in use.
        model: String,
        /// Categories with an attached sensor, in registration order.
        attached: Vec<String>,
        /// Categories whose scan failed or timed out.
        failed: Vec<String>,
    },
}

impl DiscoveryOutcome {
    /// Whether sensors are being listened to.
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening { .. })
    }
}

impl fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTransportFound => write!(f, "no ANT+ USB stick found"),
            Self::Failed(e) => write!(f, "discovery failed: {e}"),
            Self::Listening {
                model, attached, ..
            } => write!(
                f,
                "listening on {model} for {}",
                if attached.is_empty() {
                    "no sensors".to_string()
                } else {
                    attached.join(", ")
                }
            ),
        }
    }
}

/// Stick selection, startup, scanning and wiring, in that order.
pub struct Discovery {
    candidates: Vec<SharedTransport>,
    registry: Arc<SensorRegistry>,
    publisher: TelemetryPublisher,
    options: ScanOptions,
    events: EventDispatcher,
    active: OnceLock<Arc<StickManager>>,
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field(
                "candidates",
                &self.candidates.iter().map(|c| c.model()).collect::<Vec<_>>(),
            )
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("active", &self.active.get())
            .finish()
    }
}

impl Discovery {
    /// Create a pipeline.
    ///
    /// `candidates` are probed in order, so list the newest stick model
    /// first.
    pub fn new(
        candidates: Vec<SharedTransport>,
        registry: Arc<SensorRegistry>,
        publisher: TelemetryPublisher,
    ) -> Self {
        Self {
            candidates,
            registry,
            publisher,
            options: ScanOptions::default(),
            events: EventDispatcher::default(),
            active: OnceLock::new(),
        }
    }

    /// Set scan options.
    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Report progress through `events` instead of a private dispatcher.
    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// The progress event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// The registry, including attached instances.
    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.registry
    }

    /// The stick brought up by [`Discovery::run`], if any.
    pub fn active_stick(&self) -> Option<&Arc<StickManager>> {
        self.active.get()
    }

    /// Run discovery to completion.
    ///
    /// Never returns an error and never panics on hardware failures: every
    /// failure is logged and reported in the outcome.
    pub async fn run(&self) -> DiscoveryOutcome {
        let Some(transport) = select_present(&self.candidates) else {
            self.events.send(DiscoveryEvent::NoStickFound);
            return DiscoveryOutcome::NoTransportFound;
        };
        let model = transport.model().to_string();
        self.events.send(DiscoveryEvent::StickFound {
            model: model.clone(),
        });

        let manager = Arc::new(StickManager::new(transport));
        if self.active.set(Arc::clone(&manager)).is_err() {
            let e = Error::AlreadyStarted { model };
            error!("Error: {}", e);
            return DiscoveryOutcome::Failed(e);
        }

        if let Err(e) = manager.startup().await {
            error!("Error: {}", e);
            self.events.send(DiscoveryEvent::StartupFailed {
                model,
                error: e.to_string(),
            });
            return DiscoveryOutcome::Failed(e);
        }
        self.events.send(DiscoveryEvent::StickReady {
            model: model.clone(),
        });

        let scanner = SensorScanner::new(&self.options);
        let transport = manager.transport();
        let categories = self.registry.categories();

        let results: Vec<Result<()>> = match self.options.policy {
            ScanPolicy::Sequential => {
                let mut results = Vec::with_capacity(categories.len());
                for category in categories {
                    results.push(self.attach(&scanner, category, transport).await);
                }
                results
            }
            ScanPolicy::Concurrent => {
                join_all(
                    categories
                        .iter()
                        .map(|category| self.attach(&scanner, category, transport)),
                )
                .await
            }
        };

        let failed: Vec<String> = categories
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_err())
            .map(|(category, _)| category.name().to_string())
            .collect();
        let attached = self.registry.attached_categories();

        if attached.is_empty() && !failed.is_empty() {
            warn!(
                "Listening for ANT+ messages with no sensor attached; failed: {}",
                failed.join(", ")
            );
        } else {
            info!("Listening for ANT+ messages");
        }
        self.events.send(DiscoveryEvent::Listening {
            attached: attached.clone(),
        });
        DiscoveryOutcome::Listening {
            model,
            attached,
            failed,
        }
    }

    /// Scan one category and, once attached, wire its telemetry.
    ///
    /// Wiring happens in the same continuation as the scan resolving, so no
    /// frame emitted after attach can be missed.
    async fn attach(
        &self,
        scanner: &SensorScanner,
        category: &SensorCategory,
        transport: &SharedTransport,
    ) -> Result<()> {
        self.events.send(DiscoveryEvent::ScanStarted {
            category: category.name().to_string(),
        });

        match scanner.scan(category, transport).await {
            Ok(instance) => {
                self.publisher.wire(&instance, category.event_names());
                self.registry.attach(instance);
                self.events.send(DiscoveryEvent::SensorAttached {
                    category: category.name().to_string(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Skipping {} sensor: {}", category.name(), e);
                self.events.send(DiscoveryEvent::ScanFailed {
                    category: category.name().to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
