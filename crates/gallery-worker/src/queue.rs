//! Media conversion queue: item store, event fan-out, worker loop and retention reaper.
//!
//! Items are converted one at a time. The worker wakes on enqueue and otherwise
//! polls every `poll_interval_ms`. Shutdown: [`MediaConversionQueue::shutdown`]
//! signals the loop to stop; a conversion already running is not interrupted.
//!
//! Events are raised while the `events` lock is held, from the state change
//! until every observer has returned. HTTP tasks and the worker therefore
//! deliver events in the order the state changed. The lock is never held
//! across an `.await`.

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use gallery_core::models::{
    MediaConversionType, MediaQueueItemStatus, MediaQueueStatus, MediaRotation, QueueItem,
};
use gallery_core::AppError;

use crate::context::{ConversionContext, ConversionHandler};
use crate::source::{MediaQueueObserver, MediaQueueSource, QueueSnapshot};

#[derive(Clone, Debug)]
pub struct MediaConversionQueueConfig {
    pub poll_interval_ms: u64,
    pub timeout_seconds: u64,
    /// Finished items older than this many days are purged. 0 = disabled.
    pub retention_days: i64,
    pub reap_interval_secs: u64,
}

impl Default for MediaConversionQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_seconds: 3600,
            retention_days: 7,
            reap_interval_secs: 3600,
        }
    }
}

#[derive(Default)]
struct QueueState {
    items: BTreeMap<i32, QueueItem>,
    next_id: i32,
    status: MediaQueueStatus,
    current: Option<i32>,
}

impl QueueState {
    /// Oldest waiting item; ids break ties between items added in the same instant.
    fn next_waiting_id(&self) -> Option<i32> {
        self.items
            .values()
            .filter(|item| item.status == MediaQueueItemStatus::Waiting)
            .min_by_key(|item| (item.date_added, item.media_queue_id))
            .map(|item| item.media_queue_id)
    }

    fn has_waiting(&self) -> bool {
        self.items
            .values()
            .any(|item| item.status == MediaQueueItemStatus::Waiting)
    }

    /// Drop back to Idle when nothing is running or waiting. Returns true on change.
    fn settle_idle(&mut self) -> bool {
        if self.status == MediaQueueStatus::Processing
            && self.current.is_none()
            && !self.has_waiting()
        {
            self.status = MediaQueueStatus::Idle;
            return true;
        }
        false
    }
}

/// `now - retention_days`, or `None` when the window does not fit the calendar.
fn retention_cutoff(retention_days: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(retention_days).and_then(|retention| now.checked_sub_signed(retention))
}

pub struct MediaConversionQueue {
    state: Mutex<QueueState>,
    /// Serializes state change + notification. Lock order: `events`, then `state`.
    events: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn MediaQueueObserver>>>,
    config: MediaConversionQueueConfig,
    wake: Notify,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl MediaConversionQueue {
    pub fn new(config: MediaConversionQueueConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                next_id: 1,
                ..QueueState::default()
            }),
            events: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
            config,
            wake: Notify::new(),
            shutdown_tx: Mutex::new(None),
        })
    }

    fn lock_state(&self) -> anyhow::Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("media queue state lock poisoned"))
    }

    fn lock_events(&self) -> MutexGuard<'_, ()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Call `f` for every observer. Runs on the caller's task with no queue lock held.
    fn notify(&self, f: impl Fn(&dyn MediaQueueObserver)) {
        let observers: Vec<Arc<dyn MediaQueueObserver>> = match self.observers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    /// Add a waiting item for `media_object_id`.
    #[tracing::instrument(skip(self, original_filename))]
    pub fn enqueue(
        &self,
        media_object_id: i32,
        conversion_type: MediaConversionType,
        rotation: MediaRotation,
        original_filename: &str,
    ) -> Result<QueueItem, AppError> {
        let _events = self.lock_events();
        let item = {
            let mut state = self.lock_state().map_err(AppError::MediaQueue)?;
            let id = state.next_id;
            state.next_id += 1;
            let item = QueueItem::new(
                id,
                media_object_id,
                conversion_type,
                rotation,
                original_filename,
                Utc::now(),
            );
            state.items.insert(id, item.clone());
            item
        };

        tracing::info!(
            media_queue_id = item.media_queue_id,
            media_object_id,
            conversion_type = %conversion_type,
            "Media queue item added"
        );

        self.notify(|o| o.on_item_added(&item));
        self.wake.notify_one();
        Ok(item)
    }

    /// Remove a waiting or finished item. The active item cannot be deleted.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, media_queue_id: i32) -> Result<QueueItem, AppError> {
        let _events = self.lock_events();
        let (removed, became_idle) = {
            let mut state = self.lock_state().map_err(AppError::MediaQueue)?;
            if state.current == Some(media_queue_id) {
                return Err(AppError::Conflict(format!(
                    "Media queue item {} is being processed and cannot be deleted",
                    media_queue_id
                )));
            }
            let removed = state.items.remove(&media_queue_id).ok_or_else(|| {
                AppError::NotFound(format!("Media queue item {} not found", media_queue_id))
            })?;
            (removed, state.settle_idle())
        };

        tracing::info!(media_queue_id, status = %removed.status, "Media queue item deleted");
        self.notify(|o| o.on_item_deleted(media_queue_id));
        if became_idle {
            self.notify(|o| o.on_status_changed(MediaQueueStatus::Idle));
        }
        Ok(removed)
    }

    /// Cancel a waiting item. It stays in the queue as Canceled and is
    /// reported as completed.
    #[tracing::instrument(skip(self))]
    pub fn cancel(&self, media_queue_id: i32) -> Result<QueueItem, AppError> {
        let _events = self.lock_events();
        let (canceled, became_idle) = {
            let mut state = self.lock_state().map_err(AppError::MediaQueue)?;
            let item = state.items.get_mut(&media_queue_id).ok_or_else(|| {
                AppError::NotFound(format!("Media queue item {} not found", media_queue_id))
            })?;
            if item.status != MediaQueueItemStatus::Waiting {
                return Err(AppError::Conflict(format!(
                    "Media queue item {} is {} and cannot be canceled",
                    media_queue_id, item.status
                )));
            }
            item.finish(MediaQueueItemStatus::Canceled, Utc::now())?;
            let canceled = item.clone();
            (canceled, state.settle_idle())
        };

        tracing::info!(media_queue_id, "Media queue item canceled");
        self.notify(|o| o.on_item_completed(&canceled));
        if became_idle {
            self.notify(|o| o.on_status_changed(MediaQueueStatus::Idle));
        }
        Ok(canceled)
    }

    /// Append a fragment to an item's status log.
    pub fn append_status_detail(&self, media_queue_id: i32, detail: &str) -> Result<(), AppError> {
        let _events = self.lock_events();
        let item = {
            let mut state = self.lock_state().map_err(AppError::MediaQueue)?;
            let item = state.items.get_mut(&media_queue_id).ok_or_else(|| {
                AppError::NotFound(format!("Media queue item {} not found", media_queue_id))
            })?;
            item.append_status_detail(detail);
            item.clone()
        };

        tracing::trace!(media_queue_id, detail, "Status detail appended");
        self.notify(|o| o.on_status_detail_appended(&item, detail));
        Ok(())
    }

    /// Record the output file name of the active item.
    pub fn set_new_filename(&self, media_queue_id: i32, filename: &str) -> Result<(), AppError> {
        let _events = self.lock_events();
        let item = {
            let mut state = self.lock_state().map_err(AppError::MediaQueue)?;
            if state.current != Some(media_queue_id) {
                return Err(AppError::Conflict(format!(
                    "Media queue item {} is not the active item",
                    media_queue_id
                )));
            }
            let item = state.items.get_mut(&media_queue_id).ok_or_else(|| {
                AppError::NotFound(format!("Media queue item {} not found", media_queue_id))
            })?;
            item.new_filename = Some(filename.to_string());
            item.clone()
        };

        self.notify(|o| o.on_active_item_updated(&item));
        Ok(())
    }

    /// Delete finished items completed before `cutoff`. Returns how many were removed.
    pub fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let _events = self.lock_events();
        let removed: Vec<i32> = {
            let mut state = self.lock_state()?;
            let expired: Vec<i32> = state
                .items
                .values()
                .filter(|item| {
                    item.is_finished()
                        && item
                            .date_conversion_completed
                            .map(|completed| completed < cutoff)
                            .unwrap_or(false)
                })
                .map(|item| item.media_queue_id)
                .collect();
            for id in &expired {
                state.items.remove(id);
            }
            expired
        };

        for id in &removed {
            self.notify(|o| o.on_item_deleted(*id));
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), cutoff = %cutoff, "Purged finished media queue items");
        }
        Ok(removed.len())
    }

    /// Claim the oldest waiting item and run it through `handler`.
    ///
    /// Returns `Ok(false)` when there was nothing to do.
    pub async fn process_next(
        self: &Arc<Self>,
        handler: &Arc<dyn ConversionHandler>,
    ) -> anyhow::Result<bool> {
        let item = {
            let _events = self.lock_events();
            let (item, became_busy) = {
                let mut state = self.lock_state()?;
                if state.current.is_some() {
                    return Ok(false);
                }
                let Some(id) = state.next_waiting_id() else {
                    return Ok(false);
                };
                let became_busy = state.status != MediaQueueStatus::Processing;
                state.status = MediaQueueStatus::Processing;
                state.current = Some(id);
                let item = state
                    .items
                    .get_mut(&id)
                    .context("claimed media queue item vanished")?;
                item.start(Utc::now())?;
                (item.clone(), became_busy)
            };

            if became_busy {
                self.notify(|o| o.on_status_changed(MediaQueueStatus::Processing));
            }
            self.notify(|o| o.on_item_started(&item));
            item
        };
        tracing::info!(
            media_queue_id = item.media_queue_id,
            media_object_id = item.media_object_id,
            conversion_type = %item.conversion_type,
            "Media conversion started"
        );

        let ctx = ConversionContext::new(self.clone(), item.media_queue_id);
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let result = tokio::time::timeout(timeout, handler.convert(&item, &ctx)).await;

        let (final_status, new_filename) = match result {
            Ok(Ok(outcome)) => (MediaQueueItemStatus::Complete, outcome.new_filename),
            Ok(Err(e)) => {
                tracing::error!(
                    media_queue_id = item.media_queue_id,
                    error = %e,
                    "Media conversion failed"
                );
                self.append_failure_detail(item.media_queue_id, &format!("{:#}", e));
                (MediaQueueItemStatus::Error, None)
            }
            Err(_) => {
                tracing::error!(
                    media_queue_id = item.media_queue_id,
                    timeout_seconds = self.config.timeout_seconds,
                    "Media conversion timed out"
                );
                self.append_failure_detail(
                    item.media_queue_id,
                    &format!(
                        "Conversion timed out after {} seconds",
                        self.config.timeout_seconds
                    ),
                );
                (MediaQueueItemStatus::Error, None)
            }
        };

        let _events = self.lock_events();
        let (finished, became_idle) = {
            let mut state = self.lock_state()?;
            state.current = None;
            let became_idle = state.settle_idle();
            let item = state
                .items
                .get_mut(&item.media_queue_id)
                .context("active media queue item vanished")?;
            if new_filename.is_some() {
                item.new_filename = new_filename;
            }
            item.finish(final_status, Utc::now())?;
            (item.clone(), became_idle)
        };

        tracing::info!(
            media_queue_id = finished.media_queue_id,
            status = %finished.status,
            duration_ms = finished.duration().num_milliseconds(),
            "Media conversion finished"
        );
        self.notify(|o| o.on_item_completed(&finished));
        if became_idle {
            self.notify(|o| o.on_status_changed(MediaQueueStatus::Idle));
        }
        Ok(true)
    }

    fn append_failure_detail(&self, media_queue_id: i32, message: &str) {
        let detail = format!("\n{}\n", message);
        if let Err(e) = self.append_status_detail(media_queue_id, &detail) {
            tracing::warn!(media_queue_id, error = %e, "Failed to record conversion failure");
        }
    }

    /// Spawn the worker loop and, when retention is enabled, the reaper.
    pub fn start(self: &Arc<Self>, handler: Arc<dyn ConversionHandler>) -> anyhow::Result<()> {
        let mut shutdown_rx = {
            let mut slot = self
                .shutdown_tx
                .lock()
                .map_err(|_| anyhow::anyhow!("media queue shutdown lock poisoned"))?;
            if slot.is_some() {
                anyhow::bail!("media conversion queue worker already started");
            }
            let (tx, rx) = mpsc::channel(1);
            *slot = Some(tx);
            rx
        };

        let queue = self.clone();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let retention_days = self.config.retention_days;
        let mut reap_enabled = retention_days > 0 && self.config.reap_interval_secs > 0;
        if reap_enabled && retention_cutoff(retention_days, Utc::now()).is_none() {
            tracing::warn!(retention_days, "Retention window out of range, reaper disabled");
            reap_enabled = false;
        }
        let reap_interval = Duration::from_secs(self.config.reap_interval_secs.max(1));

        tracing::info!(
            poll_interval_ms = self.config.poll_interval_ms,
            timeout_seconds = self.config.timeout_seconds,
            retention_days = self.config.retention_days,
            "Media conversion worker started"
        );

        tokio::spawn(async move {
            let mut reaper = tokio::time::interval(reap_interval);
            reaper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Media conversion worker shutting down");
                        break;
                    }
                    _ = reaper.tick(), if reap_enabled => {
                        let Some(cutoff) = retention_cutoff(retention_days, Utc::now()) else {
                            tracing::warn!(retention_days, "Retention window out of range, skipping purge");
                            continue;
                        };
                        if let Err(e) = queue.purge_finished_before(cutoff) {
                            tracing::error!(error = %e, "Media queue retention reaper failed");
                        }
                    }
                    _ = queue.wake.notified() => queue.drain(&handler).await,
                    _ = tokio::time::sleep(poll_interval) => queue.drain(&handler).await,
                }
            }

            tracing::info!("Media conversion worker stopped");
        });

        Ok(())
    }

    /// Process waiting items until none are left.
    async fn drain(self: &Arc<Self>, handler: &Arc<dyn ConversionHandler>) {
        loop {
            match self.process_next(handler).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to process media queue item");
                    break;
                }
            }
        }
    }

    /// Signals the worker loop to stop. Does not wait for a running conversion.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating media conversion worker shutdown");
        let tx = self.shutdown_tx.lock().ok().and_then(|slot| slot.clone());
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }
}

impl MediaQueueSource for MediaConversionQueue {
    fn status(&self) -> anyhow::Result<MediaQueueStatus> {
        Ok(self.lock_state()?.status)
    }

    fn snapshot(&self) -> anyhow::Result<QueueSnapshot> {
        let state = self.lock_state()?;
        Ok(QueueSnapshot {
            status: state.status,
            items: state.items.values().cloned().collect(),
        })
    }

    fn current_item(&self) -> anyhow::Result<Option<QueueItem>> {
        let state = self.lock_state()?;
        Ok(state.current.and_then(|id| state.items.get(&id).cloned()))
    }

    fn items(&self) -> anyhow::Result<Vec<QueueItem>> {
        Ok(self.lock_state()?.items.values().cloned().collect())
    }

    fn subscribe(&self, observer: Arc<dyn MediaQueueObserver>) {
        match self.observers.write() {
            Ok(mut guard) => guard.push(observer),
            Err(poisoned) => poisoned.into_inner().push(observer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversionOutcome;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl MediaQueueObserver for RecordingObserver {
        fn on_status_changed(&self, status: MediaQueueStatus) {
            self.push(format!("status:{}", status));
        }
        fn on_item_added(&self, item: &QueueItem) {
            self.push(format!("added:{}", item.media_queue_id));
        }
        fn on_item_started(&self, item: &QueueItem) {
            self.push(format!("started:{}", item.media_queue_id));
        }
        fn on_active_item_updated(&self, item: &QueueItem) {
            self.push(format!("updated:{}", item.media_queue_id));
        }
        fn on_status_detail_appended(&self, item: &QueueItem, _detail: &str) {
            self.push(format!("detail:{}", item.media_queue_id));
        }
        fn on_item_completed(&self, item: &QueueItem) {
            self.push(format!("completed:{}:{}", item.media_queue_id, item.status));
        }
        fn on_item_deleted(&self, media_queue_id: i32) {
            self.push(format!("deleted:{}", media_queue_id));
        }
    }

    struct SucceedingHandler;

    #[async_trait]
    impl ConversionHandler for SucceedingHandler {
        async fn convert(
            &self,
            item: &QueueItem,
            ctx: &ConversionContext,
        ) -> anyhow::Result<ConversionOutcome> {
            assert_eq!(ctx.media_queue_id(), item.media_queue_id);
            ctx.append_status_detail("encoding\n")?;
            let name = format!("{}.mp4", item.original_filename);
            ctx.set_new_filename(&name)?;
            Ok(ConversionOutcome {
                new_filename: Some(name),
            })
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ConversionHandler for FailingHandler {
        async fn convert(
            &self,
            _item: &QueueItem,
            _ctx: &ConversionContext,
        ) -> anyhow::Result<ConversionOutcome> {
            Err(anyhow::anyhow!("codec not supported"))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl ConversionHandler for SlowHandler {
        async fn convert(
            &self,
            _item: &QueueItem,
            _ctx: &ConversionContext,
        ) -> anyhow::Result<ConversionOutcome> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ConversionOutcome::default())
        }
    }

    fn queue_with_observer() -> (Arc<MediaConversionQueue>, Arc<RecordingObserver>) {
        let queue = MediaConversionQueue::new(MediaConversionQueueConfig::default());
        let observer = Arc::new(RecordingObserver::default());
        queue.subscribe(observer.clone());
        (queue, observer)
    }

    fn enqueue(queue: &MediaConversionQueue, media_object_id: i32) -> QueueItem {
        queue
            .enqueue(
                media_object_id,
                MediaConversionType::CreateOptimized,
                MediaRotation::NotSet,
                "clip.mov",
            )
            .unwrap()
    }

    #[test]
    fn test_enqueue_assigns_ids_and_raises_added() {
        let (queue, observer) = queue_with_observer();
        let first = enqueue(&queue, 10);
        let second = enqueue(&queue, 11);
        assert_eq!(first.media_queue_id, 1);
        assert_eq!(second.media_queue_id, 2);
        assert_eq!(observer.events(), vec!["added:1", "added:2"]);
        assert_eq!(queue.status().unwrap(), MediaQueueStatus::Idle);
        assert!(queue.current_item().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_next_success_event_order() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);
        let handler: Arc<dyn ConversionHandler> = Arc::new(SucceedingHandler);

        assert!(queue.process_next(&handler).await.unwrap());

        assert_eq!(
            observer.events(),
            vec![
                "added:1",
                "status:processing",
                "started:1",
                "detail:1",
                "updated:1",
                "completed:1:complete",
                "status:idle",
            ]
        );
        let item = queue.items().unwrap().pop().unwrap();
        assert_eq!(item.status, MediaQueueItemStatus::Complete);
        assert_eq!(item.new_filename.as_deref(), Some("clip.mov.mp4"));
        assert!(item.has_consistent_timestamps());
        assert_eq!(queue.status().unwrap(), MediaQueueStatus::Idle);
        assert!(!queue.process_next(&handler).await.unwrap());
    }

    #[tokio::test]
    async fn test_items_are_claimed_fifo_and_status_stays_processing_between_items() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);
        enqueue(&queue, 11);
        let handler: Arc<dyn ConversionHandler> = Arc::new(FailingHandler);

        queue.process_next(&handler).await.unwrap();
        queue.process_next(&handler).await.unwrap();

        let events = observer.events();
        let started: Vec<&String> = events.iter().filter(|e| e.starts_with("started")).collect();
        assert_eq!(started, vec!["started:1", "started:2"]);
        let status_changes: Vec<&String> =
            events.iter().filter(|e| e.starts_with("status")).collect();
        assert_eq!(status_changes, vec!["status:processing", "status:idle"]);
    }

    #[tokio::test]
    async fn test_failed_conversion_marks_error_and_logs_detail() {
        let (queue, _observer) = queue_with_observer();
        enqueue(&queue, 10);
        let handler: Arc<dyn ConversionHandler> = Arc::new(FailingHandler);

        queue.process_next(&handler).await.unwrap();

        let item = queue.items().unwrap().pop().unwrap();
        assert_eq!(item.status, MediaQueueItemStatus::Error);
        assert!(item.status_detail.contains("codec not supported"));
        assert!(item.has_consistent_timestamps());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_conversion_marks_error() {
        let queue = MediaConversionQueue::new(MediaConversionQueueConfig {
            timeout_seconds: 1,
            ..MediaConversionQueueConfig::default()
        });
        enqueue(&queue, 10);
        let handler: Arc<dyn ConversionHandler> = Arc::new(SlowHandler);

        queue.process_next(&handler).await.unwrap();

        let item = queue.items().unwrap().pop().unwrap();
        assert_eq!(item.status, MediaQueueItemStatus::Error);
        assert!(item.status_detail.contains("timed out"));
    }

    #[test]
    fn test_delete_waiting_item() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);
        let removed = queue.delete(1).unwrap();
        assert_eq!(removed.media_object_id, 10);
        assert!(queue.items().unwrap().is_empty());
        assert_eq!(observer.events(), vec!["added:1", "deleted:1"]);
        assert!(matches!(queue.delete(1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_set_new_filename_requires_active_item() {
        let (queue, _observer) = queue_with_observer();
        enqueue(&queue, 10);
        assert!(matches!(
            queue.set_new_filename(1, "out.mp4"),
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_only_old_finished_items() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);
        enqueue(&queue, 11);
        let handler: Arc<dyn ConversionHandler> = Arc::new(FailingHandler);
        queue.process_next(&handler).await.unwrap();

        assert_eq!(queue.purge_finished_before(Utc::now() - TimeDelta::days(1)).unwrap(), 0);
        assert_eq!(queue.purge_finished_before(Utc::now() + TimeDelta::seconds(1)).unwrap(), 1);

        let remaining = queue.items().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, MediaQueueItemStatus::Waiting);
        assert!(observer.events().contains(&"deleted:1".to_string()));
    }

    #[tokio::test]
    async fn test_worker_loop_drains_queue_and_rejects_second_start() {
        let queue = MediaConversionQueue::new(MediaConversionQueueConfig {
            poll_interval_ms: 10,
            ..MediaConversionQueueConfig::default()
        });
        let handler: Arc<dyn ConversionHandler> = Arc::new(SucceedingHandler);
        queue.start(handler.clone()).unwrap();
        assert!(queue.start(handler).is_err());

        enqueue(&queue, 10);
        for _ in 0..100 {
            if queue.items().unwrap()[0].is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.items().unwrap()[0].status, MediaQueueItemStatus::Complete);
        queue.shutdown().await;
    }

    /// Holds up `on_item_added` the way a slow subscriber would.
    #[derive(Default)]
    struct SlowAddObserver {
        inner: RecordingObserver,
    }

    impl MediaQueueObserver for SlowAddObserver {
        fn on_item_added(&self, item: &QueueItem) {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.on_item_added(item);
        }
        fn on_item_started(&self, item: &QueueItem) {
            self.inner.on_item_started(item);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_events_from_concurrent_callers_follow_state_order() {
        let queue = MediaConversionQueue::new(MediaConversionQueueConfig::default());
        let observer = Arc::new(SlowAddObserver::default());
        queue.subscribe(observer.clone());

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                enqueue(&queue, 10);
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let handler: Arc<dyn ConversionHandler> = Arc::new(FailingHandler);
        while !queue.process_next(&handler).await.unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        producer.join().unwrap();

        assert_eq!(observer.inner.events(), vec!["added:1", "started:1"]);
    }

    #[test]
    fn test_retention_cutoff_rejects_out_of_range_windows() {
        let now = Utc::now();
        assert_eq!(retention_cutoff(7, now), Some(now - TimeDelta::days(7)));
        assert!(retention_cutoff(100_000_000, now).is_none());
        assert!(retention_cutoff(i64::MAX, now).is_none());
    }

    #[tokio::test]
    async fn test_worker_starts_with_out_of_range_retention() {
        for retention_days in [100_000_000, i64::MAX] {
            let queue = MediaConversionQueue::new(MediaConversionQueueConfig {
                poll_interval_ms: 10,
                retention_days,
                reap_interval_secs: 1,
                ..MediaConversionQueueConfig::default()
            });
            queue.start(Arc::new(SucceedingHandler)).unwrap();

            enqueue(&queue, 10);
            for _ in 0..100 {
                if queue.items().unwrap()[0].is_finished() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert_eq!(queue.items().unwrap()[0].status, MediaQueueItemStatus::Complete);
            queue.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_cancel_waiting_item() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);

        let canceled = queue.cancel(1).unwrap();
        assert_eq!(canceled.status, MediaQueueItemStatus::Canceled);
        assert_eq!(canceled.date_conversion_started, canceled.date_conversion_completed);
        assert!(canceled.has_consistent_timestamps());
        assert_eq!(observer.events(), vec!["added:1", "completed:1:canceled"]);

        assert!(matches!(queue.cancel(1), Err(AppError::Conflict(_))));
        assert!(matches!(queue.cancel(99), Err(AppError::NotFound(_))));

        let handler: Arc<dyn ConversionHandler> = Arc::new(SucceedingHandler);
        assert!(!queue.process_next(&handler).await.unwrap());
        assert_eq!(queue.items().unwrap()[0].status, MediaQueueItemStatus::Canceled);
    }

    #[tokio::test]
    async fn test_removing_last_waiting_item_between_conversions_goes_idle() {
        let (queue, observer) = queue_with_observer();
        enqueue(&queue, 10);
        enqueue(&queue, 11);
        let handler: Arc<dyn ConversionHandler> = Arc::new(FailingHandler);
        queue.process_next(&handler).await.unwrap();
        assert_eq!(queue.status().unwrap(), MediaQueueStatus::Processing);

        queue.delete(2).unwrap();

        assert_eq!(queue.status().unwrap(), MediaQueueStatus::Idle);
        let events = observer.events();
        assert_eq!(&events[events.len() - 2..], ["deleted:2", "status:idle"]);
    }

    /// Reads a snapshot while its own item is converting.
    struct SnapshotHandler {
        queue: Arc<MediaConversionQueue>,
        seen: Mutex<Option<QueueSnapshot>>,
    }

    #[async_trait]
    impl ConversionHandler for SnapshotHandler {
        async fn convert(
            &self,
            _item: &QueueItem,
            _ctx: &ConversionContext,
        ) -> anyhow::Result<ConversionOutcome> {
            *self.seen.lock().unwrap() = Some(self.queue.snapshot()?);
            Ok(ConversionOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_snapshot_reads_status_and_items_together() {
        let (queue, _observer) = queue_with_observer();
        enqueue(&queue, 10);
        let snapshot_handler = Arc::new(SnapshotHandler {
            queue: queue.clone(),
            seen: Mutex::new(None),
        });
        let handler: Arc<dyn ConversionHandler> = snapshot_handler.clone();

        queue.process_next(&handler).await.unwrap();

        let during = snapshot_handler.seen.lock().unwrap().take().unwrap();
        assert_eq!(during.status, MediaQueueStatus::Processing);
        assert_eq!(during.items.len(), 1);
        assert_eq!(during.items[0].status, MediaQueueItemStatus::Processing);

        let after = queue.snapshot().unwrap();
        assert_eq!(after.status, MediaQueueStatus::Idle);
        assert_eq!(after.items[0].status, MediaQueueItemStatus::Complete);
    }
}
