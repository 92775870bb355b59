//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use crate::hub;
use gallery_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gallery Media Queue API",
        version = "0.1.0",
        description = "Live status of the gallery's media conversion queue. Clients subscribe to pushes on the /api/v0/media-queue/hub WebSocket and rehydrate through the pull routes."
    ),
    paths(
        handlers::media_queue::get_queue_status,
        handlers::media_queue::get_current_item,
        handlers::media_queue::list_waiting_items,
        handlers::media_queue::list_completed_items,
        handlers::media_queue::enqueue_media,
        handlers::media_queue::delete_queue_item,
        handlers::media_queue::cancel_queue_item,
        hub::socket::media_queue_hub,
    ),
    components(schemas(
        models::QueueItemDto,
        models::QueueStatusDto,
        models::StatusDetailAppendedDto,
        models::EnqueueMediaRequest,
        models::EnqueueMediaResponse,
        models::MediaQueueItemStatus,
        models::MediaQueueStatus,
        models::MediaConversionType,
        models::MediaRotation,
        ErrorResponse,
    )),
    tags(
        (name = "media-queue", description = "Media conversion queue status and control")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_media_queue_paths() {
        let spec = get_openapi_spec();
        for path in [
            "/api/v0/media-queue/status",
            "/api/v0/media-queue/current",
            "/api/v0/media-queue/waiting",
            "/api/v0/media-queue/completed",
            "/api/v0/media-queue/items",
            "/api/v0/media-queue/items/{id}",
            "/api/v0/media-queue/items/{id}/cancel",
            "/api/v0/media-queue/hub",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
