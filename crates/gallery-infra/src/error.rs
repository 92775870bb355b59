//! HTTP error response body
//!
//! `IntoResponse` for `gallery_core::AppError` lives in the API crate because of
//! the orphan rule; this crate only owns the serialized shape.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response format for HTTP APIs
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Try again in a few seconds")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}
