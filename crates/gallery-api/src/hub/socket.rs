//! WebSocket endpoint of the media queue hub.
//!
//! Each connection gets every broadcast frame and may send pull requests
//! (see [`protocol`](super::protocol)). A client that falls behind the
//! broadcast buffer skips the missed frames and should re-query.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::channel::PushChannel;
use super::protocol::handle_hub_request;
use crate::state::AppState;

/// Upgrade to the hub socket.
#[utoipa::path(
    get,
    path = "/api/v0/media-queue/hub",
    tag = "media-queue",
    responses(
        (status = 101, description = "Switching to the WebSocket hub protocol")
    )
)]
pub async fn media_queue_hub(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut frames = state.channel.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(32);

    tracing::debug!(clients = state.channel.client_count(), "Hub client connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                frame = frames.recv() => match frame {
                    Ok(frame) => frame.to_string(),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Hub client lagging, frames dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            if ws_sender.send(Message::Text(outgoing.into())).await.is_err() {
                break;
            }
        }
    });

    let bridge = state.bridge.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = handle_hub_request(&bridge, text.as_str());
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Hub socket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!("Hub client disconnected");
}
