//! Read and subscription surface of the media queue.
//!
//! Consumers that only observe the queue (the live-status hub) depend on these
//! traits rather than on [`MediaConversionQueue`](crate::MediaConversionQueue).

use std::sync::Arc;

use gallery_core::models::{MediaQueueStatus, QueueItem};

/// Receives queue events. Every method defaults to a no-op so observers only
/// implement what they care about.
///
/// Methods are called synchronously on the task that changed the queue, one
/// event at a time and in the order the changes happened. The state lock is
/// released first, so implementations may query the queue; they must not
/// modify it.
pub trait MediaQueueObserver: Send + Sync {
    fn on_status_changed(&self, _status: MediaQueueStatus) {}

    fn on_item_added(&self, _item: &QueueItem) {}

    fn on_item_started(&self, _item: &QueueItem) {}

    fn on_active_item_updated(&self, _item: &QueueItem) {}

    /// `detail` is the appended fragment; `item.status_detail` already contains it.
    fn on_status_detail_appended(&self, _item: &QueueItem, _detail: &str) {}

    fn on_item_completed(&self, _item: &QueueItem) {}

    fn on_item_deleted(&self, _media_queue_id: i32) {}
}

/// Aggregate status and items read together.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub status: MediaQueueStatus,
    pub items: Vec<QueueItem>,
}

/// Snapshot queries plus event subscription.
pub trait MediaQueueSource: Send + Sync {
    fn status(&self) -> anyhow::Result<MediaQueueStatus>;

    /// Status and items as of one instant.
    fn snapshot(&self) -> anyhow::Result<QueueSnapshot>;

    /// The item currently converting, if any.
    fn current_item(&self) -> anyhow::Result<Option<QueueItem>>;

    /// Every item the queue still holds, in no particular order.
    fn items(&self) -> anyhow::Result<Vec<QueueItem>>;

    /// Register an observer for the lifetime of the queue. There is no unsubscribe.
    fn subscribe(&self, observer: Arc<dyn MediaQueueObserver>);
}
