//! API path constants.

/// Prefix of the versioned media queue routes.
pub const MEDIA_QUEUE_PREFIX: &str = "/api/v0/media-queue";

/// Where the OpenAPI document is served.
pub const OPENAPI_PATH: &str = "/api/openapi.json";
