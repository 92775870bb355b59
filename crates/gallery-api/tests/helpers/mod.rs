//! Test helpers: build AppState and router for integration tests.
//!
//! The queue worker is not started; tests drive conversions with
//! [`TestApp::process_next`] so every step is deterministic.

use async_trait::async_trait;
use axum_test::TestServer;
use gallery_api::constants;
use gallery_api::setup::{queue_config, routes};
use gallery_api::{AppState, BroadcastPushChannel, InMemoryMediaCatalog, MediaQueueBridge, MediaUrlBuilder};
use gallery_core::models::{MediaObjectInfo, QueueItem};
use gallery_core::Config;
use gallery_worker::{ConversionContext, ConversionHandler, ConversionOutcome, MediaConversionQueue};
use std::sync::Arc;

/// Media queue path for tests (e.g. `/api/v0/media-queue/status`).
pub fn queue_path(path: &str) -> String {
    format!("{}{}", constants::MEDIA_QUEUE_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub queue: Arc<MediaConversionQueue>,
    pub channel: Arc<BroadcastPushChannel>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Run the next waiting item through `handler`.
    pub async fn process_next(&self, handler: Arc<dyn ConversionHandler>) -> bool {
        self.queue
            .process_next(&handler)
            .await
            .expect("process_next failed")
    }
}

/// Media objects 1..=3 in album 7, titled "Clip N".
pub fn catalog_objects() -> Vec<MediaObjectInfo> {
    (1..=3)
        .map(|id| MediaObjectInfo {
            id,
            album_id: 7,
            title: format!("Clip {}", id),
            original_path: format!("/srv/gallery/album7/clip{}.mov", id),
        })
        .collect()
}

pub fn setup_test_app() -> TestApp {
    let mut config = Config::default();
    config.hub.public_host_url = "https://gallery.example.com".to_string();
    config.hub.app_path = "/gallery".to_string();

    let catalog = Arc::new(InMemoryMediaCatalog::with_objects(catalog_objects()));
    let queue = MediaConversionQueue::new(queue_config(&config));
    let channel = Arc::new(BroadcastPushChannel::new(config.hub.channel_capacity));
    let bridge = MediaQueueBridge::new(
        queue.clone(),
        catalog.clone(),
        MediaUrlBuilder::new(&config.hub.public_host_url, &config.hub.app_path),
        channel.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        queue: queue.clone(),
        catalog,
        channel: channel.clone(),
        bridge,
    });

    let app = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        queue,
        channel,
    }
}

/// Handler that reports progress and succeeds.
pub struct SucceedingHandler;

#[async_trait]
impl ConversionHandler for SucceedingHandler {
    async fn convert(
        &self,
        item: &QueueItem,
        ctx: &ConversionContext,
    ) -> anyhow::Result<ConversionOutcome> {
        ctx.append_status_detail("encoding\n")?;
        let name = item.original_filename.replace(".mov", "_optimized.mp4");
        ctx.set_new_filename(&name)?;
        Ok(ConversionOutcome {
            new_filename: Some(name),
        })
    }
}

/// Handler that always fails.
pub struct FailingHandler;

#[async_trait]
impl ConversionHandler for FailingHandler {
    async fn convert(
        &self,
        _item: &QueueItem,
        _ctx: &ConversionContext,
    ) -> anyhow::Result<ConversionOutcome> {
        Err(anyhow::anyhow!("unsupported codec"))
    }
}
