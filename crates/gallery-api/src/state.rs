//! Shared application state handed to every handler.

use gallery_core::Config;
use gallery_worker::MediaConversionQueue;
use std::sync::Arc;

use crate::catalog::MediaCatalog;
use crate::hub::{BroadcastPushChannel, MediaQueueBridge};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub queue: Arc<MediaConversionQueue>,
    pub catalog: Arc<dyn MediaCatalog>,
    /// Push channel the bridge broadcasts on; sockets subscribe to it.
    pub channel: Arc<BroadcastPushChannel>,
    pub bridge: Arc<MediaQueueBridge>,
}
