//! Media queue HTTP handlers
//!
//! The four GET routes mirror the hub's pull queries for clients that do not
//! keep a socket open. Enqueue and delete act on the queue directly; the
//! resulting events reach socket clients through the bridge.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use gallery_core::models::{
    EnqueueMediaRequest, EnqueueMediaResponse, MediaConversionType, MediaRotation,
    QueueItemDto, QueueStatusDto,
};
use gallery_core::AppError;
use gallery_infra::RequestId;
use std::sync::Arc;

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Aggregate queue status
#[utoipa::path(
    get,
    path = "/api/v0/media-queue/status",
    tag = "media-queue",
    responses(
        (status = 200, description = "Queue status", body = QueueStatusDto),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_queue_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStatusDto>, HttpAppError> {
    Ok(Json(state.bridge.queue_snapshot()?))
}

/// Item currently being converted (`null` when idle)
#[utoipa::path(
    get,
    path = "/api/v0/media-queue/current",
    tag = "media-queue",
    responses(
        (status = 200, description = "Current item or null", body = Option<QueueItemDto>),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_current_item(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<QueueItemDto>>, HttpAppError> {
    Ok(Json(state.bridge.current_item()?))
}

/// Waiting items, oldest first
#[utoipa::path(
    get,
    path = "/api/v0/media-queue/waiting",
    tag = "media-queue",
    responses(
        (status = 200, description = "Waiting items", body = Vec<QueueItemDto>),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_waiting_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QueueItemDto>>, HttpAppError> {
    Ok(Json(state.bridge.waiting_items()?))
}

/// Finished items, most recently completed first
#[utoipa::path(
    get,
    path = "/api/v0/media-queue/completed",
    tag = "media-queue",
    responses(
        (status = 200, description = "Completed, failed and canceled items", body = Vec<QueueItemDto>),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_completed_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QueueItemDto>>, HttpAppError> {
    Ok(Json(state.bridge.completed_items()?))
}

/// Queue a media object for conversion
#[utoipa::path(
    post,
    path = "/api/v0/media-queue/items",
    tag = "media-queue",
    request_body = EnqueueMediaRequest,
    responses(
        (status = 201, description = "Item queued", body = EnqueueMediaResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Media object not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn enqueue_media(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    ValidatedJson(request): ValidatedJson<EnqueueMediaRequest>,
) -> Result<(StatusCode, Json<EnqueueMediaResponse>), HttpAppError> {
    let rotates = matches!(
        request.conversion_type,
        MediaConversionType::RotateImage | MediaConversionType::RotateVideo
    );
    if rotates && matches!(request.rotation, MediaRotation::NotSet | MediaRotation::Rotate0) {
        return Err(AppError::InvalidInput(
            "rotation must be rotate90, rotate180 or rotate270 for rotate conversions".to_string(),
        )
        .into());
    }

    let media_object = state
        .catalog
        .media_object(request.media_object_id)
        .map_err(AppError::MediaQueue)?
        .ok_or_else(|| {
            AppError::NotFound(format!("Media object {} not found", request.media_object_id))
        })?;

    let original_filename = std::path::Path::new(&media_object.original_path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| media_object.original_path.clone());

    let item = state.queue.enqueue(
        media_object.id,
        request.conversion_type,
        request.rotation,
        &original_filename,
    )?;

    tracing::debug!(
        request_id = request_id.as_ref().map(|Extension(id)| id.0.as_str()),
        media_queue_id = item.media_queue_id,
        "Enqueue request accepted"
    );

    Ok((
        StatusCode::CREATED,
        Json(EnqueueMediaResponse {
            media_queue_id: item.media_queue_id,
        }),
    ))
}

/// Remove a waiting or finished item
#[utoipa::path(
    delete,
    path = "/api/v0/media-queue/items/{id}",
    tag = "media-queue",
    params(
        ("id" = i32, Path, description = "Media queue item ID")
    ),
    responses(
        (status = 204, description = "Item removed"),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 409, description = "Item is being converted", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn delete_queue_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, HttpAppError> {
    state.queue.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cancel a waiting item; it moves to the completed list as canceled.
#[utoipa::path(
    post,
    path = "/api/v0/media-queue/items/{id}/cancel",
    tag = "media-queue",
    params(
        ("id" = i32, Path, description = "Media queue item ID")
    ),
    responses(
        (status = 204, description = "Item canceled"),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 409, description = "Item is not waiting", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn cancel_queue_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, HttpAppError> {
    state.queue.cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}
