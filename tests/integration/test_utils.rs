//! Test utilities for integration tests.
//!
//! This module provides a store wrapper that tracks lookups, image builders
//! and helpers for driving the router.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tempfile::TempDir;
use tower::ServiceExt;

use media_streamer::{
    create_router, AppState, BrowseFilter, LocalMediaStore, MediaId, MediaRecord, MediaSettings,
    MediaStore, NewMedia, RouterConfig, StoreError,
};

// =============================================================================
// Tracking Store
// =============================================================================

/// A filesystem store that counts record lookups.
///
/// This is useful for verifying that a response was produced without
/// touching storage.
pub struct TrackingStore {
    inner: LocalMediaStore,
    lookups: AtomicUsize,
}

impl TrackingStore {
    pub async fn open(root: &Path) -> Self {
        Self {
            inner: LocalMediaStore::open(root).await.unwrap(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub async fn record_count(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl MediaStore for TrackingStore {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }

    async fn is_variant_available(&self, record: &MediaRecord, variant: &str) -> bool {
        self.inner.is_variant_available(record, variant).await
    }

    fn filesystem_path(&self, record: &MediaRecord, variant: &str) -> PathBuf {
        self.inner.filesystem_path(record, variant)
    }

    fn mime_type(&self, record: &MediaRecord, variant: &str) -> String {
        self.inner.mime_type(record, variant)
    }

    fn thumbnail_path(&self, record: &MediaRecord, key_name: &str) -> PathBuf {
        self.inner.thumbnail_path(record, key_name)
    }

    async fn create_from_upload(
        &self,
        data: Bytes,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError> {
        self.inner.create_from_upload(data, meta).await
    }

    async fn create_from_file(
        &self,
        path: &Path,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError> {
        self.inner.create_from_file(path, meta).await
    }

    async fn save(&self, record: &MediaRecord) -> Result<(), StoreError> {
        self.inner.save(record).await
    }

    async fn delete(&self, record: &MediaRecord) -> Result<bool, StoreError> {
        self.inner.delete(record).await
    }

    async fn browse(&self, filter: &BrowseFilter) -> Result<Vec<MediaRecord>, StoreError> {
        self.inner.browse(filter).await
    }
}

// =============================================================================
// Test Server
// =============================================================================

/// A store in a temporary directory plus the state built over it.
pub struct TestServer {
    // Held so the directory outlives the test
    _dir: TempDir,
    pub store: Arc<TrackingStore>,
    pub settings: MediaSettings,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_settings(MediaSettings {
            context_classes: vec!["Person".to_string()],
            ..MediaSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: MediaSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TrackingStore::open(dir.path()).await);
        Self {
            _dir: dir,
            store,
            settings,
        }
    }

    pub fn state(&self) -> AppState<TrackingStore> {
        AppState::new(Arc::clone(&self.store), self.settings.clone())
    }

    /// Router with open access.
    pub fn router(&self) -> Router {
        router_for(self.state())
    }

    /// Add a record directly through the store.
    pub async fn add(&self, data: Vec<u8>, caption: Option<&str>) -> MediaRecord {
        self.store
            .create_from_upload(
                Bytes::from(data),
                NewMedia {
                    caption: caption.map(str::to_string),
                    original_filename: None,
                },
            )
            .await
            .unwrap()
    }
}

pub fn router_for(state: AppState<TrackingStore>) -> Router {
    create_router(state, RouterConfig::new().with_tracing(false))
}

// =============================================================================
// Requests
// =============================================================================

/// A response with its body collected.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_with(router: &Router, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
    let mut builder = Request::get(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(router, builder.body(Body::empty()).unwrap()).await
}

/// POST an urlencoded form.
pub async fn post_form(router: &Router, uri: &str, body: &str) -> TestResponse {
    send(
        router,
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

// =============================================================================
// Multipart
// =============================================================================

pub const BOUNDARY: &str = "media-streamer-test-boundary";

/// Builder for `multipart/form-data` bodies.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

// =============================================================================
// Images
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..2] == [0xFF, 0xD8] && data[data.len() - 2..] == [0xFF, 0xD9]
}

pub fn is_valid_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
