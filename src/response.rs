//! Response values produced by the request components.
//!
//! Components never write to a transport. They return a [`MediaResponse`]
//! (status, headers, body) and the HTTP layer turns it into an axum response.
//! This keeps the range and caching logic testable without a server.

use std::io;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use chrono::{Duration, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::warn;

/// One year, in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 60 * 60 * 24 * 365;

/// Body of a [`MediaResponse`].
pub enum MediaBody {
    Empty,
    Full(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl MediaBody {
    /// Drain the body into memory.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            MediaBody::Empty => Ok(Bytes::new()),
            MediaBody::Full(bytes) => Ok(bytes),
            MediaBody::Stream(stream) => {
                let buf = stream
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }
}

impl std::fmt::Debug for MediaBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaBody::Empty => write!(f, "Empty"),
            MediaBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            MediaBody::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// A fully described response awaiting transmission.
#[derive(Debug)]
pub struct MediaResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: MediaBody,
}

impl MediaResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: MediaBody::Empty,
        }
    }

    /// Set a header, skipping values that are not valid header text.
    pub fn set_header(&mut self, name: HeaderName, value: impl AsRef<str>) {
        set_header(&mut self.headers, name, value.as_ref());
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn with_body(mut self, body: MediaBody) -> Self {
        self.body = body;
        self
    }
}

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            MediaBody::Empty => Body::empty(),
            MediaBody::Full(bytes) => Body::from(bytes),
            MediaBody::Stream(stream) => Body::from_stream(stream),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

pub(crate) fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Dropping header with invalid value"),
    }
}

// =============================================================================
// Caching
// =============================================================================

/// Long-lived caching for immutable URLs.
///
/// Every media and thumbnail URL maps to bytes that never change, so clients
/// may cache them for the full lifetime and any revalidation attempt can be
/// answered with 304 without looking at the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: u32,
}

impl CachePolicy {
    pub fn new(max_age: u32) -> Self {
        Self { max_age }
    }

    /// Write `Cache-Control`, `Expires` and `Pragma`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        set_header(
            headers,
            header::CACHE_CONTROL,
            &format!("public, max-age={}", self.max_age),
        );
        let expires = Utc::now() + Duration::seconds(i64::from(self.max_age));
        set_header(
            headers,
            header::EXPIRES,
            &expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        set_header(headers, header::PRAGMA, "public");
    }

    /// A bodiless 304 carrying the cache headers.
    pub fn not_modified(&self) -> MediaResponse {
        let mut response = MediaResponse::new(StatusCode::NOT_MODIFIED);
        self.apply(&mut response.headers);
        response
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_AGE)
    }
}

/// Whether the request carries a cache validator.
///
/// The value is irrelevant: the resource behind a URL never changes.
pub fn is_conditional(headers: &HeaderMap) -> bool {
    [header::IF_NONE_MATCH, header::IF_MODIFIED_SINCE]
        .iter()
        .any(|name| headers.get(name).is_some_and(|v| !v.is_empty()))
}
