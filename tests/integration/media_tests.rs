//! Streaming, download and record endpoint tests.
//!
//! Tests verify:
//! - Full and ranged delivery of stored originals
//! - 416 handling with the true extent announced
//! - Conditional requests answered with 304
//! - Download, info, caption and browse actions

use axum::http::StatusCode;

use media_streamer::server::NOT_FOUND_MESSAGE;
use media_streamer::{ContextRef, MediaStore};

use super::test_utils::{get, get_with, png_bytes, post_form, TestServer};

// =============================================================================
// Full Delivery
// =============================================================================

#[tokio::test]
async fn test_open_streams_original() {
    let server = TestServer::new().await;
    let data = png_bytes(64, 48);
    let record = server.add(data.clone(), Some("Sunset")).await;
    let router = server.router();

    let response = get(&router, &format!("/open/{}", record.id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(
        response.header("content-length"),
        Some(data.len().to_string().as_str())
    );
    assert_eq!(
        response.header("cache-control"),
        Some("public, max-age=31536000")
    );
    assert_eq!(response.header("pragma"), Some("public"));
    assert!(response.header("expires").unwrap().ends_with("GMT"));
    assert_eq!(
        response.header("etag"),
        Some(format!("media-{}-original", record.id).as_str())
    );
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 0-{}/{}", data.len() - 1, data.len()).as_str())
    );
    assert_eq!(response.body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_bare_id_route_streams_original() {
    let server = TestServer::new().await;
    let data = png_bytes(8, 8);
    let record = server.add(data.clone(), None).await;
    let router = server.router();

    let response = get(&router, &format!("/{}", record.id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), data.as_slice());

    let response = get(&router, &format!("/{}/original", record.id)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_open_json_returns_record() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(8, 8), Some("Meta")).await;
    let router = server.router();

    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("accept", "application/json, text/plain")],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["id"], record.id);
    assert_eq!(json["data"]["caption"], "Meta");
    assert_eq!(json["data"]["mime_type"], "image/png");
}

#[tokio::test]
async fn test_browser_accept_gets_bytes() {
    let server = TestServer::new().await;
    let data = png_bytes(8, 8);
    let record = server.add(data.clone(), None).await;
    let router = server.router();

    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("accept", "text/html,application/json;q=0.1")],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(response.body.as_ref(), data.as_slice());
}

// =============================================================================
// Range Requests
// =============================================================================

#[tokio::test]
async fn test_range_explicit_window() {
    let server = TestServer::new().await;
    let data = png_bytes(64, 64);
    let record = server.add(data.clone(), None).await;
    let router = server.router();
    let len = data.len();

    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("range", "bytes=0-99")],
    )
    .await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 0-99/{}", len).as_str())
    );
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.body.as_ref(), &data[0..100]);
}

#[tokio::test]
async fn test_range_open_ended_and_suffix() {
    let server = TestServer::new().await;
    let data = png_bytes(64, 64);
    let record = server.add(data.clone(), None).await;
    let router = server.router();
    let len = data.len();
    let uri = format!("/open/{}", record.id);

    let response = get_with(&router, &uri, &[("range", "bytes=10-")]).await;
    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 10-{}/{}", len - 1, len).as_str())
    );
    assert_eq!(response.body.as_ref(), &data[10..]);

    let response = get_with(&router, &uri, &[("range", "bytes=-10")]).await;
    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes {}-{}/{}", len - 10, len - 1, len).as_str())
    );
    assert_eq!(response.body.as_ref(), &data[len - 10..]);
}

#[tokio::test]
async fn test_range_end_is_clamped() {
    let server = TestServer::new().await;
    let data = png_bytes(16, 16);
    let record = server.add(data.clone(), None).await;
    let router = server.router();
    let len = data.len();

    let range = format!("bytes=5-{}", len * 10);
    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("range", range.as_str())],
    )
    .await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 5-{}/{}", len - 1, len).as_str())
    );
    assert_eq!(response.body.len(), len - 5);
}

#[tokio::test]
async fn test_range_out_of_bounds_is_416() {
    let server = TestServer::new().await;
    let data = png_bytes(16, 16);
    let record = server.add(data.clone(), None).await;
    let router = server.router();
    let len = data.len();

    let range = format!("bytes={}-", len + 5);
    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("range", range.as_str())],
    )
    .await;

    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.header("content-range"),
        Some(format!("bytes 0-{}/{}", len - 1, len).as_str())
    );
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_multiple_ranges_rejected() {
    let server = TestServer::new().await;
    let data = png_bytes(16, 16);
    let record = server.add(data.clone(), None).await;
    let router = server.router();

    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("range", "bytes=0-1,4-5")],
    )
    .await;

    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_malformed_range_rejected() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(16, 16), None).await;
    let router = server.router();
    let uri = format!("/open/{}", record.id);

    for range in ["bytes=abc-def", "items=0-5", "bytes=9-3", "bytes=-0"] {
        let response = get_with(&router, &uri, &[("range", range)]).await;
        assert_eq!(
            response.status,
            StatusCode::RANGE_NOT_SATISFIABLE,
            "range {:?}",
            range
        );
    }
}

// =============================================================================
// Conditional Requests
// =============================================================================

#[tokio::test]
async fn test_conditional_request_is_304() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(16, 16), None).await;
    let router = server.router();

    for validator in [
        ("if-none-match", "\"anything\""),
        ("if-modified-since", "Wed, 21 Oct 2015 07:28:00 GMT"),
    ] {
        let response = get_with(&router, &format!("/open/{}", record.id), &[validator]).await;

        assert_eq!(response.status, StatusCode::NOT_MODIFIED);
        assert_eq!(
            response.header("cache-control"),
            Some("public, max-age=31536000")
        );
        assert!(response.header("expires").is_some());
        assert!(response.body.is_empty());
    }
}

#[tokio::test]
async fn test_conditional_wins_over_range() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(16, 16), None).await;
    let router = server.router();

    let response = get_with(
        &router,
        &format!("/open/{}", record.id),
        &[("if-none-match", "x"), ("range", "bytes=999999-")],
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
}

// =============================================================================
// Missing Media
// =============================================================================

#[tokio::test]
async fn test_missing_media_is_404() {
    let server = TestServer::new().await;
    let router = server.router();

    for uri in ["/open/999", "/open/abc", "/999", "/info/999", "/download/999"] {
        let response = get(&router, uri).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "uri {}", uri);

        let json = response.json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], NOT_FOUND_MESSAGE);
    }
}

#[tokio::test]
async fn test_missing_variant_is_404() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(16, 16), None).await;
    let router = server.router();

    let response = get(&router, &format!("/open/{}/webm", record.id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["message"], NOT_FOUND_MESSAGE);
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_uses_caption() {
    let server = TestServer::new().await;
    let data = png_bytes(16, 16);
    let record = server.add(data.clone(), Some("Holiday \"Best\"")).await;
    let router = server.router();

    let response = get(&router, &format!("/download/{}", record.id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"Holiday Best.png\"")
    );
    assert_eq!(
        response.header("content-length"),
        Some(data.len().to_string().as_str())
    );
    assert_eq!(response.body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_download_named() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(16, 16), Some("ignored")).await;
    let router = server.router();

    let response = get(&router, &format!("/download/{}/report", record.id)).await;
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"report.png\"")
    );

    let response = get(&router, &format!("/download/{}/scan.image", record.id)).await;
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"scan.image\"")
    );
}

// =============================================================================
// Info and Caption
// =============================================================================

#[tokio::test]
async fn test_info_returns_record() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(20, 10), Some("Info")).await;
    let router = server.router();

    let response = get(&router, &format!("/info/{}", record.id)).await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["width"], 20);
    assert_eq!(json["data"]["height"], 10);
    assert_eq!(json["data"]["caption"], "Info");
}

#[tokio::test]
async fn test_caption_read_and_update() {
    let server = TestServer::new().await;
    let record = server.add(png_bytes(8, 8), Some("Before")).await;
    let router = server.router();
    let uri = format!("/caption/{}", record.id);

    let response = get(&router, &uri).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["data"]["caption"], "Before");

    let response = post_form(&router, &uri, "Caption=After+edit").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["success"], true);
    assert_eq!(response.json()["data"]["caption"], "After edit");

    let stored = server.store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.caption.as_deref(), Some("After edit"));
}

#[tokio::test]
async fn test_caption_missing_record() {
    let server = TestServer::new().await;
    let router = server.router();

    let response = post_form(&router, "/caption/42", "Caption=x").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Browse and Health
// =============================================================================

#[tokio::test]
async fn test_browse_lists_newest_first() {
    let server = TestServer::new().await;
    let first = server.add(png_bytes(8, 8), Some("first")).await;
    let second = server.add(png_bytes(8, 8), Some("second")).await;
    let router = server.router();

    for uri in ["/browse", "/"] {
        let response = get(&router, uri).await;
        assert_eq!(response.status, StatusCode::OK);

        let json = response.json();
        assert_eq!(json["success"], true);
        assert_eq!(json["total"], 2);
        assert_eq!(json["data"][0]["id"], second.id);
        assert_eq!(json["data"][1]["id"], first.id);
    }

    let json = get(&router, "/browse?limit=1").await.json();
    assert_eq!(json["total"], 1);
}

#[tokio::test]
async fn test_browse_filters_by_context() {
    let server = TestServer::new().await;
    let router = server.router();

    let mut attached = server.add(png_bytes(8, 8), None).await;
    attached.context = Some(ContextRef {
        class: "Person".to_string(),
        id: 7,
    });
    server.store.save(&attached).await.unwrap();
    server.add(png_bytes(8, 8), None).await;

    let json = get(&router, "/browse?ContextClass=Person&ContextID=7").await.json();
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"][0]["id"], attached.id);

    // A non-numeric id is ignored rather than matching nothing
    let json = get(&router, "/browse?ContextClass=Person&ContextID=abc").await.json();
    assert_eq!(json["total"], 1);

    let json = get(&router, "/browse?ContextClass=Event").await.json();
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::new().await;
    let response = get(&server.router(), "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "healthy");
}
