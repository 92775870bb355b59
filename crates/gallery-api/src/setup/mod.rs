//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::catalog::{InMemoryMediaCatalog, MediaCatalog};
use crate::hub::{BroadcastPushChannel, MediaQueueBridge, MediaUrlBuilder};
use crate::services::FfmpegConversionHandler;
use crate::state::AppState;
use anyhow::{Context, Result};
use gallery_core::Config;
use gallery_worker::{MediaConversionQueue, MediaConversionQueueConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Initialize the entire application: telemetry, catalog, queue worker, hub and routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    gallery_infra::init_telemetry(
        "gallery-api",
        &config.base.environment,
        config.is_production(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let catalog = setup_catalog(&config)?;
    let queue = MediaConversionQueue::new(queue_config(&config));
    let channel = Arc::new(BroadcastPushChannel::new(config.hub.channel_capacity));
    let bridge = MediaQueueBridge::global(
        queue.clone(),
        catalog.clone(),
        MediaUrlBuilder::new(&config.hub.public_host_url, &config.hub.app_path),
        channel.clone(),
    );

    let handler = FfmpegConversionHandler::new(
        config.media_queue.ffmpeg_path.clone(),
        config.media_queue.output_dir.as_ref().map(PathBuf::from),
        catalog.clone(),
    )?;
    queue.start(Arc::new(handler))?;

    let state = Arc::new(AppState {
        config: config.clone(),
        queue,
        catalog,
        channel,
        bridge,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// Worker settings derived from the application config.
pub fn queue_config(config: &Config) -> MediaConversionQueueConfig {
    MediaConversionQueueConfig {
        poll_interval_ms: config.media_queue.poll_interval_ms,
        timeout_seconds: config.media_queue.timeout_seconds,
        retention_days: config.media_queue.retention_days,
        reap_interval_secs: config.media_queue.reap_interval_secs,
    }
}

fn setup_catalog(config: &Config) -> Result<Arc<dyn MediaCatalog>> {
    let catalog = match &config.hub.media_catalog_path {
        Some(path) => InMemoryMediaCatalog::from_manifest(path)?,
        None => {
            tracing::warn!("MEDIA_CATALOG_PATH not set, starting with an empty media catalog");
            InMemoryMediaCatalog::new()
        }
    };
    Ok(Arc::new(catalog))
}
