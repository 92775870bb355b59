mod helpers;

use axum::http::StatusCode;
use gallery_api::HubMessage;
use gallery_core::models::{QueueItemDto, QueueStatusDto};
use helpers::{queue_path, setup_test_app, FailingHandler, SucceedingHandler};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_empty_queue_status() {
    let app = setup_test_app();

    let response = app.client().get(&queue_path("/status")).await;
    response.assert_status_ok();
    let status: QueueStatusDto = response.json();
    assert_eq!(status.waiting_count, 0);
    assert_eq!(status.current_item_id, None);

    let response = app.client().get(&queue_path("/current")).await;
    response.assert_status_ok();
    let current: Value = response.json();
    assert!(current.is_null());
}

#[tokio::test]
async fn test_enqueue_lists_waiting_items_in_order() {
    let app = setup_test_app();

    for media_object_id in [2, 1, 3] {
        let response = app
            .client()
            .post(&queue_path("/items"))
            .json(&json!({
                "mediaObjectId": media_object_id,
                "conversionType": "create_optimized"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let response = app.client().get(&queue_path("/waiting")).await;
    response.assert_status_ok();
    let waiting: Vec<QueueItemDto> = response.json();
    let objects: Vec<i32> = waiting.iter().map(|dto| dto.media_object_id).collect();
    assert_eq!(objects, vec![2, 1, 3]);

    let first = &waiting[0];
    assert_eq!(first.title, "Clip 2");
    assert_eq!(first.album_id, 7);
    assert_eq!(first.original_filename, "clip2.mov");
    assert_eq!(first.thumbnail_url, "/gallery/handler/getmedia?moid=2&dt=thumbnail");
    assert!(first.date_conversion_started.is_none());
}

#[tokio::test]
async fn test_enqueue_unknown_media_object_is_not_found() {
    let app = setup_test_app();

    let response = app
        .client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": 404, "conversionType": "create_optimized" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_enqueue_validation_errors() {
    let app = setup_test_app();

    let response = app
        .client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": 1, "conversionType": "rotate_video" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let response = app
        .client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": "one", "conversionType": "create_optimized" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_processed_items_move_to_completed() {
    let app = setup_test_app();

    for media_object_id in [1, 2] {
        app.client()
            .post(&queue_path("/items"))
            .json(&json!({ "mediaObjectId": media_object_id, "conversionType": "create_optimized" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    assert!(app.process_next(Arc::new(SucceedingHandler)).await);
    assert!(app.process_next(Arc::new(FailingHandler)).await);
    assert!(!app.process_next(Arc::new(SucceedingHandler)).await);

    let completed: Vec<QueueItemDto> = app.client().get(&queue_path("/completed")).await.json();
    assert_eq!(completed.len(), 2);

    // Latest completion first: the failed second item.
    assert_eq!(completed[0].media_object_id, 2);
    assert_eq!(completed[0].status.to_string(), "error");
    assert!(completed[0].status_detail.contains("unsupported codec"));

    assert_eq!(completed[1].status.to_string(), "complete");
    assert_eq!(completed[1].new_filename.as_deref(), Some("clip1_optimized.mp4"));
    assert!(completed[1].duration_ms >= 0);

    let waiting: Vec<QueueItemDto> = app.client().get(&queue_path("/waiting")).await.json();
    assert!(waiting.is_empty());

    let status: QueueStatusDto = app.client().get(&queue_path("/status")).await.json();
    assert_eq!(status.status.to_string(), "idle");
}

#[tokio::test]
async fn test_delete_item() {
    let app = setup_test_app();

    app.client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": 3, "conversionType": "create_optimized" }))
        .await
        .assert_status(StatusCode::CREATED);

    app.client()
        .delete(&queue_path("/items/1"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = app.client().delete(&queue_path("/items/1")).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let waiting: Vec<QueueItemDto> = app.client().get(&queue_path("/waiting")).await.json();
    assert!(waiting.is_empty());
}

#[tokio::test]
async fn test_cancel_waiting_item() {
    let app = setup_test_app();

    for media_object_id in [1, 2] {
        app.client()
            .post(&queue_path("/items"))
            .json(&json!({ "mediaObjectId": media_object_id, "conversionType": "create_optimized" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    app.client()
        .post(&queue_path("/items/2/cancel"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = app.client().post(&queue_path("/items/2/cancel")).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "CONFLICT");

    app.client()
        .post(&queue_path("/items/9/cancel"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let waiting: Vec<QueueItemDto> = app.client().get(&queue_path("/waiting")).await.json();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].media_queue_id, 1);

    let completed: Vec<QueueItemDto> = app.client().get(&queue_path("/completed")).await.json();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status.to_string(), "canceled");
    assert_eq!(completed[0].duration_ms, 0);
    assert_eq!(
        completed[0].date_conversion_started,
        completed[0].date_conversion_completed
    );
}

#[tokio::test]
async fn test_http_changes_are_pushed_to_hub_clients() {
    let app = setup_test_app();
    let mut frames = app.channel.subscribe();

    app.client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": 1, "conversionType": "create_optimized" }))
        .await
        .assert_status(StatusCode::CREATED);
    app.client()
        .delete(&queue_path("/items/1"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let added: HubMessage = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    match added {
        HubMessage::MediaQueueItemAdded(dto) => {
            assert_eq!(dto.media_queue_id, 1);
            assert_eq!(dto.thumbnail_url, "/gallery/handler/getmedia?moid=1&dt=thumbnail");
        }
        other => panic!("unexpected frame {:?}", other),
    }

    let deleted: HubMessage = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(deleted, HubMessage::MediaQueueItemDeleted(1));
}

#[tokio::test]
async fn test_conversion_pushes_lifecycle_frames() {
    let app = setup_test_app();
    app.client()
        .post(&queue_path("/items"))
        .json(&json!({ "mediaObjectId": 2, "conversionType": "create_optimized" }))
        .await
        .assert_status(StatusCode::CREATED);

    let mut frames = app.channel.subscribe();
    app.process_next(Arc::new(SucceedingHandler)).await;

    let mut names = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        let value: Value = serde_json::from_str(&frame).unwrap();
        names.push(value["message"].as_str().unwrap().to_string());
    }
    assert_eq!(
        names,
        vec![
            "mediaQueueStatusChanged",
            "mediaQueueItemStarted",
            "mediaQueueItemStatusDetailAppended",
            "activeMediaQueueItemUpdated",
            "mediaQueueItemCompleted",
            "mediaQueueStatusChanged",
        ]
    );
}

#[tokio::test]
async fn test_health_and_docs() {
    let app = setup_test_app();

    let response = app.client().get("/live").await;
    response.assert_status_ok();
    assert!(response.headers().get("X-Request-ID").is_some());

    let response = app.client().get("/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["media_queue"], "idle");

    let response = app.client().get("/api/openapi.json").await;
    response.assert_status_ok();
    let spec: Value = response.json();
    assert!(spec["paths"]["/api/v0/media-queue/waiting"].is_object());
}
