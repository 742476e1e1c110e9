//! Operational and producer endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use flare_core::Message;
use serde::Deserialize;
use tracing::debug;

use crate::health::{self, HealthResponse};
use crate::server::AppState;

/// Body of `POST /publish`.
///
/// ```json
/// { "channel": "/news", "id": "42", "event": "update", "data": "line1\nline2" }
/// ```
///
/// An empty or missing `channel` broadcasts to every channel.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// Target channel.
    #[serde(default)]
    pub channel: String,
    /// Event to deliver.
    #[serde(flatten)]
    pub message: Message,
}

/// Body of `POST /channels/close`.
#[derive(Debug, Deserialize)]
pub struct CloseChannelRequest {
    /// Channel to close.
    pub channel: String,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let clients = state.dispatch.client_count().await;
    let channels = state.dispatch.channels().await.len();
    Json(health::health_check(state.start_time, clients, channels))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /publish
pub async fn publish_handler(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> StatusCode {
    debug!(channel = %req.channel, id = %req.message.id, "publish request");
    state.dispatch.broadcast(req.channel, req.message);
    StatusCode::ACCEPTED
}

/// POST /channels/close
pub async fn close_channel_handler(
    State(state): State<AppState>,
    Json(req): Json<CloseChannelRequest>,
) -> StatusCode {
    state.dispatch.close_channel(req.channel);
    StatusCode::ACCEPTED
}
