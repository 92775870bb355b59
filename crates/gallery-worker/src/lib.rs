//! Gallery Worker – media conversion queue and worker loop.
//!
//! The queue owns [`QueueItem`](gallery_core::models::QueueItem) records, runs one
//! conversion at a time through a [`ConversionHandler`], and raises typed events to
//! every subscribed [`MediaQueueObserver`]. Observers run synchronously on the task
//! that raised the event, in the order the events happen.

mod context;
mod queue;
mod source;

pub use context::{ConversionContext, ConversionHandler, ConversionOutcome};
pub use queue::{MediaConversionQueue, MediaConversionQueueConfig};
pub use source::{MediaQueueObserver, MediaQueueSource, QueueSnapshot};
