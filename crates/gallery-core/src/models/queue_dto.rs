//! Client-facing projections of the media queue.
//!
//! These are what the hub pushes and what the pull queries return. Optional
//! timestamps stay optional on the wire: clients test `dateConversionStarted`
//! for `null` to tell a waiting item from a running one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MediaConversionType, MediaQueueItemStatus, MediaQueueStatus, MediaRotation};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemDto {
    pub media_queue_id: i32,
    pub media_object_id: i32,
    pub album_id: i32,
    pub title: String,
    pub status: MediaQueueItemStatus,
    pub status_detail: String,
    pub conversion_type: MediaConversionType,
    pub rotation: MediaRotation,
    pub original_filename: String,
    pub new_filename: Option<String>,
    pub date_added: DateTime<Utc>,
    pub date_conversion_started: Option<DateTime<Utc>>,
    pub date_conversion_completed: Option<DateTime<Utc>>,
    /// Conversion time in milliseconds, computed when the DTO was built.
    pub duration_ms: i64,
    /// Host-relative thumbnail URL; clients prepend their own origin.
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusDto {
    pub status: MediaQueueStatus,
    pub waiting_count: usize,
    pub current_item_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetailAppendedDto {
    pub item: QueueItemDto,
    /// The fragment that was appended, not the whole log.
    pub detail: String,
}

/// Request body for adding an item to the queue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueMediaRequest {
    pub media_object_id: i32,
    pub conversion_type: MediaConversionType,
    #[serde(default)]
    pub rotation: MediaRotation,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueMediaResponse {
    pub media_queue_id: i32,
}
