//! Client-to-server frames on the hub socket.
//!
//! A client sends `{"id": 1, "method": "getWaitingItems"}` and gets back
//! `{"id": 1, "result": [...]}` or `{"id": 1, "error": "..."}`.

use gallery_core::ErrorMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bridge::MediaQueueBridge;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HubMethod {
    GetQueueSnapshot,
    GetCurrentItem,
    GetWaitingItems,
    GetCompletedItems,
}

#[derive(Debug, Deserialize)]
pub struct HubRequest {
    pub id: u64,
    pub method: HubMethod,
}

#[derive(Debug, Serialize)]
pub struct HubResponse {
    /// `None` when the request could not be parsed far enough to read its id.
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HubResponse {
    fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<u64>, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

fn call(bridge: &MediaQueueBridge, method: HubMethod) -> Result<Value, String> {
    let result = match method {
        HubMethod::GetQueueSnapshot => bridge.queue_snapshot().map(serde_json::to_value),
        HubMethod::GetCurrentItem => bridge.current_item().map(serde_json::to_value),
        HubMethod::GetWaitingItems => bridge.waiting_items().map(serde_json::to_value),
        HubMethod::GetCompletedItems => {
            bridge.completed_items().map(serde_json::to_value)
        }
    };

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(?method, error = %e, "Failed to serialize hub response");
            Err("Internal server error".to_string())
        }
        Err(e) => Err(e.client_message()),
    }
}

/// Answer one text frame. Always produces a reply frame.
pub fn handle_hub_request(bridge: &MediaQueueBridge, text: &str) -> String {
    let response = match serde_json::from_str::<HubRequest>(text) {
        Ok(request) => {
            tracing::debug!(id = request.id, method = ?request.method, "Hub request");
            match call(bridge, request.method) {
                Ok(result) => HubResponse::ok(request.id, result),
                Err(error) => HubResponse::error(Some(request.id), error),
            }
        }
        Err(e) => {
            let id = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| value.get("id").and_then(Value::as_u64));
            tracing::debug!(error = %e, "Invalid hub request");
            HubResponse::error(id, format!("Invalid hub request: {}", e))
        }
    };

    serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode hub response");
        r#"{"id":null,"error":"Internal server error"}"#.to_string()
    })
}
