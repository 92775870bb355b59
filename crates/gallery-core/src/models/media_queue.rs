use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle status of a single queue item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaQueueItemStatus {
    Waiting,
    Processing,
    Complete,
    Error,
    Canceled,
}

impl MediaQueueItemStatus {
    /// Complete, Error and Canceled are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MediaQueueItemStatus::Complete
                | MediaQueueItemStatus::Error
                | MediaQueueItemStatus::Canceled
        )
    }
}

impl Display for MediaQueueItemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaQueueItemStatus::Waiting => write!(f, "waiting"),
            MediaQueueItemStatus::Processing => write!(f, "processing"),
            MediaQueueItemStatus::Complete => write!(f, "complete"),
            MediaQueueItemStatus::Error => write!(f, "error"),
            MediaQueueItemStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for MediaQueueItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(MediaQueueItemStatus::Waiting),
            "processing" => Ok(MediaQueueItemStatus::Processing),
            "complete" => Ok(MediaQueueItemStatus::Complete),
            "error" => Ok(MediaQueueItemStatus::Error),
            "canceled" => Ok(MediaQueueItemStatus::Canceled),
            _ => Err(anyhow::anyhow!("Invalid media queue item status: {}", s)),
        }
    }
}

/// Aggregate status of the whole queue.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaQueueStatus {
    #[default]
    Idle,
    Processing,
}

impl Display for MediaQueueStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaQueueStatus::Idle => write!(f, "idle"),
            MediaQueueStatus::Processing => write!(f, "processing"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaConversionType {
    /// Encode a web-friendly copy of the original file.
    CreateOptimized,
    RotateImage,
    RotateVideo,
}

impl Display for MediaConversionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaConversionType::CreateOptimized => write!(f, "create_optimized"),
            MediaConversionType::RotateImage => write!(f, "rotate_image"),
            MediaConversionType::RotateVideo => write!(f, "rotate_video"),
        }
    }
}

impl FromStr for MediaConversionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_optimized" => Ok(MediaConversionType::CreateOptimized),
            "rotate_image" => Ok(MediaConversionType::RotateImage),
            "rotate_video" => Ok(MediaConversionType::RotateVideo),
            _ => Err(anyhow::anyhow!("Invalid media conversion type: {}", s)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaRotation {
    #[default]
    NotSet,
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl MediaRotation {
    /// Clockwise rotation in degrees, `None` when not set.
    pub fn degrees(&self) -> Option<u16> {
        match self {
            MediaRotation::NotSet => None,
            MediaRotation::Rotate0 => Some(0),
            MediaRotation::Rotate90 => Some(90),
            MediaRotation::Rotate180 => Some(180),
            MediaRotation::Rotate270 => Some(270),
        }
    }
}

/// One entry of the media conversion queue.
///
/// Status transitions go through [`QueueItem::start`] and [`QueueItem::finish`] so that
/// `date_conversion_started` is set iff the item is processing or terminal, and
/// `date_conversion_completed` is set iff it is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub media_queue_id: i32,
    pub media_object_id: i32,
    pub status: MediaQueueItemStatus,
    pub status_detail: String,
    pub conversion_type: MediaConversionType,
    pub rotation: MediaRotation,
    pub original_filename: String,
    pub new_filename: Option<String>,
    pub date_added: DateTime<Utc>,
    pub date_conversion_started: Option<DateTime<Utc>>,
    pub date_conversion_completed: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(
        media_queue_id: i32,
        media_object_id: i32,
        conversion_type: MediaConversionType,
        rotation: MediaRotation,
        original_filename: impl Into<String>,
        date_added: DateTime<Utc>,
    ) -> Self {
        Self {
            media_queue_id,
            media_object_id,
            status: MediaQueueItemStatus::Waiting,
            status_detail: String::new(),
            conversion_type,
            rotation,
            original_filename: original_filename.into(),
            new_filename: None,
            date_added,
            date_conversion_started: None,
            date_conversion_completed: None,
        }
    }

    /// Move a waiting item to Processing.
    pub fn start(&mut self, at: DateTime<Utc>) -> anyhow::Result<()> {
        if self.status != MediaQueueItemStatus::Waiting {
            anyhow::bail!(
                "Media queue item {} cannot start from status {}",
                self.media_queue_id,
                self.status
            );
        }
        self.status = MediaQueueItemStatus::Processing;
        self.date_conversion_started = Some(at);
        Ok(())
    }

    /// Move the item to a terminal status.
    ///
    /// An item canceled before it ever ran gets `started == completed` so the
    /// timestamp invariant holds for every terminal item.
    pub fn finish(&mut self, status: MediaQueueItemStatus, at: DateTime<Utc>) -> anyhow::Result<()> {
        if !status.is_terminal() {
            anyhow::bail!("{} is not a terminal media queue status", status);
        }
        if self.status.is_terminal() {
            anyhow::bail!(
                "Media queue item {} already finished with status {}",
                self.media_queue_id,
                self.status
            );
        }
        if self.date_conversion_started.is_none() {
            self.date_conversion_started = Some(at);
        }
        self.status = status;
        self.date_conversion_completed = Some(at);
        Ok(())
    }

    pub fn append_status_detail(&mut self, detail: &str) {
        self.status_detail.push_str(detail);
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Conversion time as seen at `now`: completed - started, now - started while
    /// running, zero before the item starts.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        match (self.date_conversion_started, self.date_conversion_completed) {
            (Some(started), Some(completed)) => completed - started,
            (Some(started), None) => now - started,
            _ => Duration::zero(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration_at(Utc::now())
    }

    /// Whether the timestamps agree with the status.
    pub fn has_consistent_timestamps(&self) -> bool {
        let started_expected = self.status != MediaQueueItemStatus::Waiting;
        let completed_expected = self.status.is_terminal();
        self.date_conversion_started.is_some() == started_expected
            && self.date_conversion_completed.is_some() == completed_expected
    }
}
