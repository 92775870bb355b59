//! Queue item to DTO mapping
//!
//! Pure conversions from [`QueueItem`] to the client-facing DTOs. Every URL a
//! DTO carries is host-relative: one process may serve clients that reach it
//! through different host names, so no host is ever baked into a payload.

use chrono::{DateTime, Utc};
use gallery_core::models::{
    MediaQueueItemStatus, MediaQueueStatus, QueueItem, QueueItemDto, QueueStatusDto,
};
use gallery_core::AppError;
use url::Url;

use crate::catalog::MediaCatalog;

/// Builds absolute media URLs from the configured public host and app path.
#[derive(Clone, Debug)]
pub struct MediaUrlBuilder {
    public_host_url: String,
    app_path: String,
}

impl MediaUrlBuilder {
    pub fn new(public_host_url: impl Into<String>, app_path: impl Into<String>) -> Self {
        Self {
            public_host_url: public_host_url.into().trim_end_matches('/').to_string(),
            app_path: app_path.into(),
        }
    }

    /// Absolute thumbnail URL of a media object, as rendered in gallery pages.
    pub fn thumbnail_url(&self, media_object_id: i32) -> String {
        format!(
            "{}{}/handler/getmedia?moid={}&dt=thumbnail",
            self.public_host_url, self.app_path, media_object_id
        )
    }
}

/// Remove scheme and authority from `url`, keeping path, query and fragment.
///
/// Input that is already relative is returned unchanged.
pub fn strip_host(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed,
        _ => return url.to_string(),
    };

    let mut relative = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    relative
}

/// Map a queue item, resolving album and title through the catalog.
///
/// `now` is the reference time for the duration of a running item.
pub fn to_queue_item_dto(
    item: &QueueItem,
    now: DateTime<Utc>,
    catalog: &dyn MediaCatalog,
    urls: &MediaUrlBuilder,
) -> Result<QueueItemDto, AppError> {
    let media_object = catalog
        .media_object(item.media_object_id)
        .map_err(AppError::MediaQueue)?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Media object {} of queue item {} not found",
                item.media_object_id, item.media_queue_id
            ))
        })?;

    Ok(QueueItemDto {
        media_queue_id: item.media_queue_id,
        media_object_id: item.media_object_id,
        album_id: media_object.album_id,
        title: media_object.title,
        status: item.status,
        status_detail: item.status_detail.clone(),
        conversion_type: item.conversion_type,
        rotation: item.rotation,
        original_filename: item.original_filename.clone(),
        new_filename: item.new_filename.clone(),
        date_added: item.date_added,
        date_conversion_started: item.date_conversion_started,
        date_conversion_completed: item.date_conversion_completed,
        duration_ms: item.duration_at(now).num_milliseconds(),
        thumbnail_url: strip_host(&urls.thumbnail_url(item.media_object_id)),
    })
}

/// `None` maps to `None`; there is no "empty" item DTO.
pub fn to_queue_item_dto_opt(
    item: Option<&QueueItem>,
    now: DateTime<Utc>,
    catalog: &dyn MediaCatalog,
    urls: &MediaUrlBuilder,
) -> Result<Option<QueueItemDto>, AppError> {
    item.map(|item| to_queue_item_dto(item, now, catalog, urls))
        .transpose()
}

pub fn to_queue_status_dto(status: MediaQueueStatus, items: &[QueueItem]) -> QueueStatusDto {
    QueueStatusDto {
        status,
        waiting_count: items
            .iter()
            .filter(|item| item.status == MediaQueueItemStatus::Waiting)
            .count(),
        current_item_id: items
            .iter()
            .find(|item| item.status == MediaQueueItemStatus::Processing)
            .map(|item| item.media_queue_id),
    }
}
