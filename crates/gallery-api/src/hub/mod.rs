//! Live-status hub for the media conversion queue.
//!
//! - [`bridge`]: process-wide subscriber that turns queue events into pushes
//!   and answers pull queries
//! - [`mapper`]: queue item to DTO conversion with host-relative URLs
//! - [`channel`]: push channel abstraction and its broadcast implementation
//! - [`protocol`] / [`socket`]: the WebSocket endpoint

pub mod bridge;
pub mod channel;
pub mod mapper;
pub mod protocol;
pub mod socket;

pub use bridge::MediaQueueBridge;
pub use channel::{BroadcastPushChannel, HubMessage, PushChannel};
pub use mapper::{strip_host, MediaUrlBuilder};
pub use protocol::handle_hub_request;
