//! Media queue bridge
//!
//! Subscribes to the conversion queue once, for the life of the process, and
//! forwards every queue event to connected clients as a [`HubMessage`]. Also
//! answers the four pull queries clients use to rehydrate after (re)connecting.
//!
//! Event handlers run synchronously on the task that raised the event. Each
//! notification is mapped and broadcast on its own: a mapping failure is
//! logged and drops that one notification only. Query failures are logged and
//! returned to the caller; retrying is up to the client.

use chrono::Utc;
use gallery_core::models::{
    MediaQueueItemStatus, MediaQueueStatus, QueueItem, QueueItemDto, QueueStatusDto,
    StatusDetailAppendedDto,
};
use gallery_core::AppError;
use gallery_worker::{MediaQueueObserver, MediaQueueSource};
use std::cmp::Reverse;
use std::sync::{Arc, OnceLock};

use super::channel::{HubMessage, PushChannel};
use super::mapper::{
    to_queue_item_dto, to_queue_item_dto_opt, to_queue_status_dto, MediaUrlBuilder,
};
use crate::catalog::MediaCatalog;

static GLOBAL_BRIDGE: OnceLock<Arc<MediaQueueBridge>> = OnceLock::new();

pub struct MediaQueueBridge {
    source: Arc<dyn MediaQueueSource>,
    catalog: Arc<dyn MediaCatalog>,
    urls: MediaUrlBuilder,
    channel: Arc<dyn PushChannel>,
}

impl MediaQueueBridge {
    /// Build a bridge and subscribe it to `source`. The subscription is never removed.
    pub fn new(
        source: Arc<dyn MediaQueueSource>,
        catalog: Arc<dyn MediaCatalog>,
        urls: MediaUrlBuilder,
        channel: Arc<dyn PushChannel>,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            source: source.clone(),
            catalog,
            urls,
            channel,
        });
        source.subscribe(bridge.clone());
        tracing::debug!("Media queue bridge subscribed to queue events");
        bridge
    }

    /// The process-wide bridge. The first call builds it; later calls return
    /// the same instance and ignore their arguments.
    pub fn global(
        source: Arc<dyn MediaQueueSource>,
        catalog: Arc<dyn MediaCatalog>,
        urls: MediaUrlBuilder,
        channel: Arc<dyn PushChannel>,
    ) -> Arc<Self> {
        GLOBAL_BRIDGE
            .get_or_init(|| Self::new(source, catalog, urls, channel))
            .clone()
    }

    /// Aggregate queue status, read in one pass so status and current item agree.
    pub fn queue_snapshot(&self) -> Result<QueueStatusDto, AppError> {
        let snapshot = self
            .source
            .snapshot()
            .map_err(|e| query_failed("getQueueSnapshot", e))?;
        Ok(to_queue_status_dto(snapshot.status, &snapshot.items))
    }

    /// The item being converted, `None` when the queue is idle.
    pub fn current_item(&self) -> Result<Option<QueueItemDto>, AppError> {
        let item = self
            .source
            .current_item()
            .map_err(|e| query_failed("getCurrentItem", e))?;
        to_queue_item_dto_opt(item.as_ref(), Utc::now(), self.catalog.as_ref(), &self.urls)
            .map_err(|e| mapping_failed("getCurrentItem", e))
    }

    /// Waiting items, oldest first.
    pub fn waiting_items(&self) -> Result<Vec<QueueItemDto>, AppError> {
        let mut items: Vec<QueueItem> = self
            .read_items("getWaitingItems")?
            .into_iter()
            .filter(|item| item.status == MediaQueueItemStatus::Waiting)
            .collect();
        items.sort_by_key(|item| (item.date_added, item.media_queue_id));
        self.map_items("getWaitingItems", &items)
    }

    /// Finished items (complete, error or canceled), most recently completed first.
    pub fn completed_items(&self) -> Result<Vec<QueueItemDto>, AppError> {
        let mut items: Vec<QueueItem> = self
            .read_items("getCompletedItems")?
            .into_iter()
            .filter(|item| {
                !matches!(
                    item.status,
                    MediaQueueItemStatus::Waiting | MediaQueueItemStatus::Processing
                )
            })
            .collect();
        items.sort_by_key(|item| {
            Reverse((item.date_conversion_completed, item.media_queue_id))
        });
        self.map_items("getCompletedItems", &items)
    }

    fn read_items(&self, operation: &'static str) -> Result<Vec<QueueItem>, AppError> {
        self.source
            .items()
            .map_err(|e| query_failed(operation, e))
    }

    fn map_items(
        &self,
        operation: &'static str,
        items: &[QueueItem],
    ) -> Result<Vec<QueueItemDto>, AppError> {
        let now = Utc::now();
        items
            .iter()
            .map(|item| to_queue_item_dto(item, now, self.catalog.as_ref(), &self.urls))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| mapping_failed(operation, e))
    }

    fn item_dto(&self, item: &QueueItem) -> Result<QueueItemDto, AppError> {
        to_queue_item_dto(item, Utc::now(), self.catalog.as_ref(), &self.urls)
    }

    /// Build and broadcast one notification. Failures stop here.
    fn push(&self, event: &'static str, build: impl FnOnce() -> Result<HubMessage, AppError>) {
        match build() {
            Ok(message) => self.channel.broadcast(message),
            Err(e) => {
                tracing::warn!(event, error = %e, "Dropping media queue notification");
            }
        }
    }
}

fn query_failed(operation: &'static str, err: anyhow::Error) -> AppError {
    tracing::error!(operation, error = %err, "Media queue query failed");
    AppError::MediaQueue(err)
}

/// Callers of a pull query only learn that the queue could not be read.
fn mapping_failed(operation: &'static str, err: AppError) -> AppError {
    tracing::error!(operation, error = %err, "Failed to map media queue items");
    match err {
        AppError::MediaQueue(_) => err,
        other => AppError::MediaQueue(anyhow::Error::new(other)),
    }
}

impl MediaQueueObserver for MediaQueueBridge {
    fn on_status_changed(&self, status: MediaQueueStatus) {
        self.push("MediaQueueStatusChanged", || {
            let items = self.source.items().map_err(AppError::MediaQueue)?;
            Ok(HubMessage::MediaQueueStatusChanged(to_queue_status_dto(
                status, &items,
            )))
        });
    }

    fn on_item_added(&self, item: &QueueItem) {
        self.push("MediaQueueItemAdded", || {
            Ok(HubMessage::MediaQueueItemAdded(self.item_dto(item)?))
        });
    }

    fn on_item_started(&self, item: &QueueItem) {
        self.push("MediaQueueItemStarted", || {
            Ok(HubMessage::MediaQueueItemStarted(self.item_dto(item)?))
        });
    }

    fn on_active_item_updated(&self, item: &QueueItem) {
        self.push("ActiveMediaQueueItemUpdated", || {
            Ok(HubMessage::ActiveMediaQueueItemUpdated(self.item_dto(item)?))
        });
    }

    fn on_status_detail_appended(&self, item: &QueueItem, detail: &str) {
        self.push("MediaQueueItemStatusDetailAppended", || {
            Ok(HubMessage::MediaQueueItemStatusDetailAppended(
                StatusDetailAppendedDto {
                    item: self.item_dto(item)?,
                    detail: detail.to_string(),
                },
            ))
        });
    }

    fn on_item_completed(&self, item: &QueueItem) {
        self.push("MediaQueueItemCompleted", || {
            Ok(HubMessage::MediaQueueItemCompleted(self.item_dto(item)?))
        });
    }

    fn on_item_deleted(&self, media_queue_id: i32) {
        self.push("MediaQueueItemDeleted", || {
            Ok(HubMessage::MediaQueueItemDeleted(media_queue_id))
        });
    }
}
