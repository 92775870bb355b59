//! Data models for the media queue
//!
//! `media_queue` holds the records owned by the conversion queue, `media_object`
//! the catalog view the hub needs for rendering, and `queue_dto` the
//! client-facing projections sent over the hub.

mod media_object;
mod media_queue;
mod queue_dto;

pub use media_object::*;
pub use media_queue::*;
pub use queue_dto::*;
