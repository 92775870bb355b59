//! Route configuration and setup.

use crate::constants::{MEDIA_QUEUE_PREFIX, OPENAPI_PATH};
use crate::handlers::{health, media_queue};
use crate::hub::socket::media_queue_hub;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use gallery_core::Config;
use gallery_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let app = Router::new()
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .merge(media_queue_routes())
        .route(
            OPENAPI_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn media_queue_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/status", MEDIA_QUEUE_PREFIX),
            get(media_queue::get_queue_status),
        )
        .route(
            &format!("{}/current", MEDIA_QUEUE_PREFIX),
            get(media_queue::get_current_item),
        )
        .route(
            &format!("{}/waiting", MEDIA_QUEUE_PREFIX),
            get(media_queue::list_waiting_items),
        )
        .route(
            &format!("{}/completed", MEDIA_QUEUE_PREFIX),
            get(media_queue::list_completed_items),
        )
        .route(
            &format!("{}/items", MEDIA_QUEUE_PREFIX),
            post(media_queue::enqueue_media),
        )
        .route(
            &format!("{}/items/{{id}}", MEDIA_QUEUE_PREFIX),
            delete(media_queue::delete_queue_item),
        )
        .route(
            &format!("{}/items/{{id}}/cancel", MEDIA_QUEUE_PREFIX),
            post(media_queue::cancel_queue_item),
        )
        .route(&format!("{}/hub", MEDIA_QUEUE_PREFIX), get(media_queue_hub))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.base.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .base
            .cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
