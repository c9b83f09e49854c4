//! WebSocket pub/sub bridge for ANT+ sensors.
//!
//! This crate provides a service that:
//! - Finds the ANT+ USB stick and attaches every supported sensor
//! - Publishes each telemetry frame on the sensor's channel (`/hr`, ...)
//! - Serves a Bayeux-style pub/sub endpoint over WebSocket at `/`
//! - Optionally serves over TLS with a self-signed certificate
//!
//! # Endpoints
//!
//! - `WS /` - pub/sub endpoint (see [`protocol`])
//! - `GET /api/health` - service health check
//! - `GET /api/status` - uptime, clients and discovery progress
//! - `GET /api/channels` - published sensor channels
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/antws/server.toml`:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! secure = false
//!
//! [discovery]
//! scan_timeout_secs = 0
//! policy = "sequential"
//! categories = ["hr", "bike_power"]
//! ```
//!
//! Command-line flags override the file.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;
pub mod config;
pub mod hardware;
pub mod hub;
pub mod net;
pub mod pipeline;
pub mod protocol;
pub mod state;
pub mod tls;
pub mod ws;

pub use cli::Args;
pub use config::{Config, ConfigError, DiscoveryConfig, ServerConfig};
pub use hub::{Delivery, Hub};
pub use state::{AppState, DiscoveryPhase, DiscoveryStatus};

/// Build the HTTP application: pub/sub endpoint plus REST API.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::router())
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
