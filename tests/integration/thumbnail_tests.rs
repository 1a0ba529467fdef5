//! Thumbnail endpoint tests.
//!
//! Tests verify:
//! - Fit, fill and crop geometry as seen through HTTP
//! - Entity tags derived from the thumbnail key
//! - Memory and disk caching of rendered thumbnails
//! - Conditional requests answered before any record lookup

use axum::http::StatusCode;

use media_streamer::server::NOT_FOUND_MESSAGE;
use media_streamer::MediaStore;

use super::test_utils::{
    get, get_with, image_dimensions, is_valid_jpeg, is_valid_png, jpeg_bytes, png_bytes,
    TestServer,
};

// =============================================================================
// Geometry
// =============================================================================

#[tokio::test]
async fn test_cropped_thumbnail_has_exact_size_and_etag() {
    let server = TestServer::new().await;
    let record = server.add(jpeg_bytes(400, 300), None).await;
    let router = server.router();

    let response = get(&router, &format!("/thumbnail/{}/123x100/cropped", record.id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/jpeg"));
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-123-100--true", record.id).as_str())
    );
    assert_eq!(
        response.header("cache-control"),
        Some("public, max-age=31536000")
    );
    assert_eq!(
        response.header("content-length"),
        Some(response.body.len().to_string().as_str())
    );
    assert!(is_valid_jpeg(&response.body));
    assert_eq!(image_dimensions(&response.body), (123, 100));
}

#[tokio::test]
async fn test_fit_thumbnail_keeps_aspect_ratio() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(400, 200), None).await;
    let router = server.router();

    let response = get(&router, &format!("/thumbnail/{}/100x100", record.id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-100-100--false", record.id).as_str())
    );
    assert!(is_valid_png(&response.body));
    assert_eq!(image_dimensions(&response.body), (100, 50));
}

#[tokio::test]
async fn test_fill_thumbnail_pads_to_box() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(400, 200), None).await;
    let router = server.router();

    let response = get(&router, &format!("/thumbnail/{}/80x80xff0000", record.id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-80-80-FF0000-false", record.id).as_str())
    );
    assert_eq!(image_dimensions(&response.body), (80, 80));
}

#[tokio::test]
async fn test_default_size_when_unspecified() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(300, 300), None).await;
    let router = server.router();

    let response = get(&router, &format!("/thumbnail/{}", record.id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(image_dimensions(&response.body), (100, 100));

    let response = get(&router, &format!("/thumbnail/{}/cropped", record.id)).await;
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-100-100--true", record.id).as_str())
    );

    // An unparseable size falls back to the default box and is not consumed,
    // so a following `cropped` is not seen either
    let response = get(&router, &format!("/thumbnail/{}/huge/cropped", record.id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-100-100--false", record.id).as_str())
    );
}

#[tokio::test]
async fn test_small_source_is_not_upscaled() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(40, 30), None).await;
    let router = server.router();

    let response = get(&router, &format!("/thumbnail/{}/200x200", record.id)).await;
    assert_eq!(image_dimensions(&response.body), (40, 30));
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_thumbnail_is_rendered_once() {
    let server = TestServer::new().await;
    let record = server.add(jpeg_bytes(320, 240), None).await;
    let router = server.router();
    let uri = format!("/thumbnail/{}/64x64", record.id);

    let first = get(&router, &uri).await;
    assert_eq!(first.header("x-thumbnail-cache-hit"), Some("false"));

    let second = get(&router, &uri).await;
    assert_eq!(second.header("x-thumbnail-cache-hit"), Some("true"));
    assert_eq!(first.body, second.body);
    assert_eq!(first.header("etag"), second.header("etag"));

    let path = server.store.thumbnail_path(&record, "64x64");
    assert!(path.exists(), "thumbnail should be persisted at {:?}", path);
}

#[tokio::test]
async fn test_persisted_thumbnail_survives_restart() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(200, 100), None).await;
    let uri = format!("/thumbnail/{}/50x50", record.id);

    let first = get(&server.router(), &uri).await;

    // A fresh state starts with an empty memory cache
    let second = get(&server.router(), &uri).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("x-thumbnail-cache-hit"), Some("true"));
    assert_eq!(first.body, second.body);
}

#[tokio::test]
async fn test_concurrent_requests_share_result() {
    let server = TestServer::new().await;
    let record = server.add(jpeg_bytes(640, 480), None).await;
    let router = server.router();
    let uri = format!("/thumbnail/{}/120x90/cropped", record.id);

    let requests = (0..8).map(|_| get(&router, &uri));
    let responses = futures::future::join_all(requests).await;

    let first = &responses[0];
    for response in &responses {
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, first.body);
    }
}

// =============================================================================
// Conditional Requests and Errors
// =============================================================================

#[tokio::test]
async fn test_conditional_thumbnail_skips_lookup() {
    let server = TestServer::new().await;
    let router = server.router();
    let before = server.store.lookup_count();

    // The record does not even exist
    let response = get_with(
        &router,
        "/thumbnail/12345/100x100",
        &[("if-modified-since", "Wed, 21 Oct 2015 07:28:00 GMT")],
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert!(response.body.is_empty());
    assert!(response.header("cache-control").is_some());
    assert_eq!(server.store.lookup_count(), before);
}

#[tokio::test]
async fn test_thumbnail_of_missing_media() {
    let server = TestServer::new().await;
    let router = server.router();

    let response = get(&router, "/thumbnail/777/100x100").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["message"], NOT_FOUND_MESSAGE);
}

#[tokio::test]
async fn test_generation_failure_reported_as_not_found() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(100, 100), None).await;
    let router = server.router();

    // Corrupt the original behind the record
    let original = server.store.filesystem_path(&record, "original");
    std::fs::write(&original, b"not an image any more").unwrap();

    let response = get(&router, &format!("/thumbnail/{}/10x10", record.id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let json = response.json();
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["message"], NOT_FOUND_MESSAGE);
}
