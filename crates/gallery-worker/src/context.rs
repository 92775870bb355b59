//! Conversion handler trait
//!
//! The API implements this trait with the actual encoder. The worker calls
//! `convert` for each claimed item and records the outcome on the item.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use gallery_core::models::QueueItem;

use crate::queue::MediaConversionQueue;

/// What a successful conversion produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub new_filename: Option<String>,
}

/// Handle given to a running conversion to report progress on its own item.
#[derive(Clone)]
pub struct ConversionContext {
    queue: Arc<MediaConversionQueue>,
    media_queue_id: i32,
}

impl ConversionContext {
    pub(crate) fn new(queue: Arc<MediaConversionQueue>, media_queue_id: i32) -> Self {
        Self {
            queue,
            media_queue_id,
        }
    }

    pub fn media_queue_id(&self) -> i32 {
        self.media_queue_id
    }

    /// Append a fragment to the item's status log and notify observers.
    pub fn append_status_detail(&self, detail: &str) -> Result<()> {
        self.queue
            .append_status_detail(self.media_queue_id, detail)
            .map_err(anyhow::Error::from)
    }

    /// Record the output file name while the item is still active.
    pub fn set_new_filename(&self, filename: &str) -> Result<()> {
        self.queue
            .set_new_filename(self.media_queue_id, filename)
            .map_err(anyhow::Error::from)
    }
}

/// Performs the conversion for one queue item.
#[async_trait]
pub trait ConversionHandler: Send + Sync {
    async fn convert(&self, item: &QueueItem, ctx: &ConversionContext) -> Result<ConversionOutcome>;
}
