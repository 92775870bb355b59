//! Push channel to connected hub clients.

use gallery_core::models::{QueueItemDto, QueueStatusDto, StatusDetailAppendedDto};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A server-to-client notification. Serialized as `{"message": .., "payload": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "message", content = "payload", rename_all = "camelCase")]
pub enum HubMessage {
    MediaQueueStatusChanged(QueueStatusDto),
    MediaQueueItemAdded(QueueItemDto),
    MediaQueueItemStarted(QueueItemDto),
    ActiveMediaQueueItemUpdated(QueueItemDto),
    MediaQueueItemStatusDetailAppended(StatusDetailAppendedDto),
    MediaQueueItemCompleted(QueueItemDto),
    /// Payload is the id of the removed queue item.
    MediaQueueItemDeleted(i32),
}

impl HubMessage {
    pub fn name(&self) -> &'static str {
        match self {
            HubMessage::MediaQueueStatusChanged(_) => "mediaQueueStatusChanged",
            HubMessage::MediaQueueItemAdded(_) => "mediaQueueItemAdded",
            HubMessage::MediaQueueItemStarted(_) => "mediaQueueItemStarted",
            HubMessage::ActiveMediaQueueItemUpdated(_) => "activeMediaQueueItemUpdated",
            HubMessage::MediaQueueItemStatusDetailAppended(_) => {
                "mediaQueueItemStatusDetailAppended"
            }
            HubMessage::MediaQueueItemCompleted(_) => "mediaQueueItemCompleted",
            HubMessage::MediaQueueItemDeleted(_) => "mediaQueueItemDeleted",
        }
    }
}

/// Fan-out to every connected client. Delivery is fire-and-forget.
pub trait PushChannel: Send + Sync {
    fn broadcast(&self, message: HubMessage);

    fn client_count(&self) -> usize;
}

/// [`PushChannel`] on a tokio broadcast channel. Each WebSocket connection
/// holds one receiver; frames are serialized once and shared.
pub struct BroadcastPushChannel {
    sender: broadcast::Sender<Arc<str>>,
}

impl BroadcastPushChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }
}

impl PushChannel for BroadcastPushChannel {
    fn broadcast(&self, message: HubMessage) {
        // No clients, nothing to do.
        if self.sender.receiver_count() == 0 {
            return;
        }

        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(hub_message = message.name(), error = %e, "Failed to serialize hub message");
                return;
            }
        };

        tracing::debug!(
            hub_message = message.name(),
            clients = self.sender.receiver_count(),
            "Broadcasting hub message"
        );
        let _ = self.sender.send(Arc::from(frame));
    }

    fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
