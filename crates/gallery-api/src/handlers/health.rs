//! Health probes.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use gallery_worker::MediaQueueSource;
use std::sync::Arc;

use crate::hub::PushChannel;
use crate::state::AppState;

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the media queue answers reads.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.queue.status() {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "environment": state.config.base.environment,
                "media_queue": status,
                "hub_clients": state.channel.client_count(),
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Media queue readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "media_queue": "unavailable",
                })),
            )
        }
    }
}
