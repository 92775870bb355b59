//! Gallery API Library
//!
//! HTTP handlers, the media queue hub (WebSocket push plus pull queries) and
//! application setup.

mod api_doc;
pub mod catalog;
pub mod constants;
pub mod error;
mod handlers;
pub mod hub;
pub mod services;
pub mod setup;
pub mod state;

pub use catalog::{InMemoryMediaCatalog, MediaCatalog};
pub use error::{ErrorResponse, HttpAppError};
pub use hub::{BroadcastPushChannel, HubMessage, MediaQueueBridge, MediaUrlBuilder, PushChannel};
pub use state::AppState;
