//! Range-aware delivery of stored media bytes.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::MediaError;
use crate::media::{MediaRecord, MediaStore, ORIGINAL_VARIANT};
use crate::response::{is_conditional, CachePolicy, MediaBody, MediaResponse};

use super::range::{resolve_range, ByteRange, RangeError};

/// Size of each chunk handed to the transport.
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// The parts of a request the streamer looks at.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    /// Requested variant; empty means the original
    pub variant: String,

    /// Raw `Range` header value
    pub range: Option<String>,

    /// The request carried `If-None-Match` or `If-Modified-Since`
    pub conditional: bool,
}

impl StreamRequest {
    pub fn from_headers(variant: Option<&str>, headers: &HeaderMap) -> Self {
        Self {
            variant: variant.unwrap_or_default().to_string(),
            range: headers
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            conditional: is_conditional(headers),
        }
    }

    fn variant(&self) -> &str {
        if self.variant.is_empty() {
            ORIGINAL_VARIANT
        } else {
            &self.variant
        }
    }
}

/// Entity tag for a stored variant.
pub fn variant_etag(record: &MediaRecord, variant: &str) -> String {
    format!("media-{}-{}", record.id, variant)
}

/// Serves stored variants with single-range support.
///
/// Bytes are read from the store's filesystem path in fixed-size chunks; the
/// whole resource is never buffered.
pub struct RangeStreamer<S> {
    store: Arc<S>,
    cache: CachePolicy,
}

impl<S: MediaStore> RangeStreamer<S> {
    pub fn new(store: Arc<S>, cache: CachePolicy) -> Self {
        Self { store, cache }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    /// Stream a variant of `record`, honouring `Range` and cache validators.
    pub async fn stream(
        &self,
        record: &MediaRecord,
        request: &StreamRequest,
    ) -> Result<MediaResponse, MediaError> {
        if request.conditional {
            return Ok(self.cache.not_modified());
        }

        let variant = request.variant();
        if !self.store.is_variant_available(record, variant).await {
            return Err(MediaError::not_found(format!(
                "variant {} of media {}",
                variant, record.id
            )));
        }

        let path = self.store.filesystem_path(record, variant);
        let mut file = File::open(&path)
            .await
            .map_err(|e| MediaError::not_found(format!("{}: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| MediaError::not_found(format!("{}: {}", path.display(), e)))?
            .len();

        let (status, window) = match request.range.as_deref() {
            Some(range) => match resolve_range(range, size) {
                Ok(window) => (StatusCode::PARTIAL_CONTENT, Some(window)),
                Err(RangeError::MultipleRanges) => {
                    debug!(media_id = record.id, range, "Multi-range request rejected");
                    return Err(MediaError::RangeNotSatisfiable { size });
                }
                Err(RangeError::Unsatisfiable) => {
                    debug!(media_id = record.id, range, size, "Unsatisfiable range");
                    return Err(MediaError::RangeNotSatisfiable { size });
                }
            },
            None => (StatusCode::OK, ByteRange::full(size)),
        };

        let mut response = MediaResponse::new(status);
        response.set_header(
            header::CONTENT_TYPE,
            self.store.mime_type(record, variant),
        );
        response.set_header(header::ETAG, variant_etag(record, variant));
        response.set_header(header::ACCEPT_RANGES, "bytes");
        self.cache.apply(&mut response.headers);

        let Some(window) = window else {
            // Empty file: nothing to send
            response.set_header(header::CONTENT_LENGTH, "0");
            return Ok(response);
        };

        // Full responses announce the whole extent as well
        response.set_header(header::CONTENT_RANGE, window.content_range(size));
        response.set_header(header::CONTENT_LENGTH, window.len().to_string());

        debug!(
            media_id = record.id,
            variant,
            start = window.start,
            end = window.end,
            size,
            "Streaming media"
        );

        if window.start > 0 {
            file.seek(SeekFrom::Start(window.start))
                .await
                .map_err(|e| MediaError::not_found(format!("{}: {}", path.display(), e)))?;
        }
        let body = ReaderStream::with_capacity(file.take(window.len()), STREAM_CHUNK_SIZE);

        Ok(response.with_body(MediaBody::Stream(Box::pin(body))))
    }

    /// Deliver the original as an attachment.
    pub async fn download(
        &self,
        record: &MediaRecord,
        filename: Option<&str>,
    ) -> Result<MediaResponse, MediaError> {
        let path = self.store.filesystem_path(record, ORIGINAL_VARIANT);
        let file = File::open(&path)
            .await
            .map_err(|e| MediaError::not_found(format!("{}: {}", path.display(), e)))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| MediaError::not_found(format!("{}: {}", path.display(), e)))?
            .len();

        let mut response = MediaResponse::new(StatusCode::OK);
        response.set_header(header::CONTENT_TYPE, &record.mime_type);
        response.set_header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                record.download_filename(filename)
            ),
        );
        response.set_header(header::CONTENT_LENGTH, size.to_string());

        let body = ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE);
        Ok(response.with_body(MediaBody::Stream(Box::pin(body))))
    }
}
