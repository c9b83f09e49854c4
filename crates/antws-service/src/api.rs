//! REST API endpoints for the antws service.
//!
//! These are read-only views of the bridge for dashboards and health checks;
//! telemetry itself only travels over the WebSocket.
//!
//! - `GET /api/health` - liveness
//! - `GET /api/status` - uptime, connected clients and discovery progress
//! - `GET /api/channels` - the sensor channels this bridge publishes
//! - `GET /api/channels/{category}` - one channel
//!
//! All endpoints return structured JSON errors via [`AppError`].

use std::sync::Arc;

use antws_types::{SensorProfile, profile, topic_for};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::state::{AppState, DiscoveryStatus};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/channels", get(list_channels))
        .route("/api/channels/{category}", get(get_channel))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    /// Host name, as used in the advertised URLs.
    pub host: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub uptime_seconds: u64,
    /// Whether the endpoint is served over TLS.
    pub secure: bool,
    /// Connected WebSocket clients.
    pub clients: usize,
    /// Messages published since startup.
    pub published: u64,
    pub discovery: DiscoveryStatus,
}

/// Get service status.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = OffsetDateTime::now_utc();
    let discovery = state.discovery.read().await.clone();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        host: hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned()),
        timestamp: now,
        started_at: state.started_at,
        uptime_seconds: (now - state.started_at).whole_seconds().max(0) as u64,
        secure: state.config.server.secure,
        clients: state.hub.clients(),
        published: state.hub.published(),
        discovery,
    })
}

/// One published sensor channel.
#[derive(Debug, Serialize)]
pub struct ChannelInfo {
    pub category: &'static str,
    pub channel: String,
    pub description: &'static str,
    pub event_names: &'static [&'static str],
    /// Whether a sensor of this category is attached.
    pub attached: bool,
}

impl ChannelInfo {
    fn new(profile: &SensorProfile, status: &DiscoveryStatus) -> Self {
        Self {
            category: profile.name,
            channel: topic_for(profile.name),
            description: profile.description,
            event_names: profile.event_names,
            attached: status.attached.iter().any(|c| c == profile.name),
        }
    }
}

/// Whether the configuration enables `category`.
fn is_enabled(state: &AppState, category: &str) -> bool {
    let categories = &state.config.discovery.categories;
    categories.is_empty() || categories.iter().any(|c| c == category)
}

/// List the channels this bridge publishes on.
async fn list_channels(State(state): State<Arc<AppState>>) -> Json<Vec<ChannelInfo>> {
    let status = state.discovery.read().await;
    let channels = profile::ANT_PLUS_PROFILES
        .iter()
        .filter(|p| is_enabled(&state, p.name))
        .map(|p| ChannelInfo::new(p, &status))
        .collect();
    Json(channels)
}

/// Get one channel by category name.
async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<ChannelInfo>, AppError> {
    let profile = profile::find(&category)
        .filter(|p| is_enabled(&state, p.name))
        .ok_or_else(|| AppError::NotFound(format!("Channel /{} not found", category)))?;
    let status = state.discovery.read().await;
    Ok(Json(ChannelInfo::new(&profile, &status)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antws_core::{DiscoveryEvent, PubSubBridge};
    use antws_types::Message;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;

    fn create_test_state() -> Arc<AppState> {
        AppState::new(Config::default())
    }

    async fn response_body(response: axum::response::Response) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response_body(response).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = get_json(create_test_state(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = create_test_state();
        state
            .hub
            .publish(
                "/hr",
                Message {
                    text: "{}".to_string(),
                },
            )
            .unwrap();
        let _client = state.hub.client_connected();
        state
            .discovery
            .write()
            .await
            .apply(&DiscoveryEvent::StickFound {
                model: "GarminStick3".into(),
            });

        let (status, json) = get_json(Arc::clone(&state), "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["published"], 1);
        assert_eq!(json["clients"], 1);
        assert_eq!(json["secure"], false);
        assert_eq!(json["discovery"]["phase"], "starting");
        assert_eq!(json["discovery"]["stick"], "GarminStick3");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_list_channels() {
        let state = create_test_state();
        state
            .discovery
            .write()
            .await
            .apply(&DiscoveryEvent::SensorAttached {
                category: "hr".into(),
            });

        let (status, json) = get_json(state, "/api/channels").await;

        assert_eq!(status, StatusCode::OK);
        let channels = json.as_array().unwrap();
        assert_eq!(channels.len(), 5);
        assert_eq!(channels[0]["category"], "hr");
        assert_eq!(channels[0]["channel"], "/hr");
        assert_eq!(channels[0]["attached"], true);
        assert_eq!(channels[1]["attached"], false);
    }

    #[tokio::test]
    async fn test_channels_follow_configured_categories() {
        let mut config = Config::default();
        config.discovery.categories = vec!["bike_power".to_string()];
        let state = AppState::new(config);

        let (_, json) = get_json(Arc::clone(&state), "/api/channels").await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["channel"], "/bike_power");

        let (status, _) = get_json(state, "/api/channels/hr").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_channel() {
        let (status, json) = get_json(create_test_state(), "/api/channels/speed_cadence").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["channel"], "/speed_cadence");
        assert!(json["event_names"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn test_unknown_channel_error_format() {
        let (status, json) = get_json(create_test_state(), "/api/channels/radar").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }
}
