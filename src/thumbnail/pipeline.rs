//! Thumbnail pipeline: lookup, single-flight generation and delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      ThumbnailPipeline                         │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │                  get_thumbnail()                        │  │
//! │  │  1. Memory cache        3. Single-flight generation     │  │
//! │  │  2. Persisted file      4. Persist, cache & return      │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │         │                    │                    │            │
//! │         ▼                    ▼                    ▼            │
//! │  ┌──────────────┐    ┌──────────────┐    ┌─────────────────┐  │
//! │  │ThumbnailCache│    │  MediaStore  │    │ThumbnailRenderer│  │
//! │  └──────────────┘    └──────────────┘    └─────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Concurrent requests for the same key share one generation. Because the
//! persisted file is written atomically, a reader never observes a partial
//! thumbnail.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::{header, HeaderName, StatusCode};
use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::media::{MediaId, MediaRecord, MediaStore, ORIGINAL_VARIANT};
use crate::response::{CachePolicy, MediaBody, MediaResponse};

use super::cache::ThumbnailCache;
use super::render::ThumbnailRenderer;
use super::spec::{ThumbnailKey, ThumbnailSpec};

/// Header reporting whether the thumbnail came from the in-memory cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-thumbnail-cache-hit");

/// Result of a thumbnail lookup.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub key: ThumbnailKey,
    pub data: Bytes,

    /// Served without generating
    pub cache_hit: bool,
}

/// State for an in-flight generation.
struct InFlightState {
    notify: Notify,
    result: Mutex<Option<Result<Bytes, MediaError>>>,
}

enum Role {
    Leader(Arc<InFlightState>),
    Waiter(Arc<InFlightState>),
}

type InFlightMap = Mutex<HashMap<ThumbnailKey, Arc<InFlightState>>>;

/// Removes the in-flight entry and wakes waiters when the leader finishes or
/// is cancelled.
struct LeaderGuard<'a> {
    in_flight: &'a InFlightMap,
    key: &'a ThumbnailKey,
    state: Arc<InFlightState>,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(self.key);
        self.state.notify.notify_waiters();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Produces, persists and serves thumbnails for stored media.
pub struct ThumbnailPipeline<S> {
    store: Arc<S>,
    cache: ThumbnailCache,
    renderer: ThumbnailRenderer,
    in_flight: InFlightMap,
    cache_policy: CachePolicy,
}

impl<S: MediaStore + 'static> ThumbnailPipeline<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_parts(
            store,
            ThumbnailCache::new(),
            ThumbnailRenderer::new(),
            CachePolicy::default(),
        )
    }

    pub fn with_parts(
        store: Arc<S>,
        cache: ThumbnailCache,
        renderer: ThumbnailRenderer,
        cache_policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            renderer,
            in_flight: Mutex::new(HashMap::new()),
            cache_policy,
        }
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Serve a thumbnail as a response.
    ///
    /// A conditional request is answered with 304 before any file work.
    pub async fn serve(
        &self,
        record: &MediaRecord,
        spec: ThumbnailSpec,
        conditional: bool,
    ) -> Result<MediaResponse, MediaError> {
        if conditional {
            return Ok(self.cache_policy.not_modified());
        }

        let thumbnail = self.get_thumbnail(record, spec).await?;

        let mut response = MediaResponse::new(StatusCode::OK);
        self.cache_policy.apply(&mut response.headers);
        response.set_header(header::ETAG, thumbnail.key.etag());
        response.set_header(header::CONTENT_TYPE, &record.thumbnail_mime_type);
        response.set_header(header::CONTENT_LENGTH, thumbnail.data.len().to_string());
        response.set_header(
            CACHE_HIT_HEADER,
            if thumbnail.cache_hit { "true" } else { "false" },
        );

        Ok(response.with_body(MediaBody::Full(thumbnail.data)))
    }

    /// Get a thumbnail, generating it on first request.
    pub async fn get_thumbnail(
        &self,
        record: &MediaRecord,
        spec: ThumbnailSpec,
    ) -> Result<Thumbnail, MediaError> {
        let key = ThumbnailKey::new(record.id, spec);

        if let Some(data) = self.cache.get(&key).await {
            return Ok(Thumbnail {
                key,
                data,
                cache_hit: true,
            });
        }

        let path = self.store.thumbnail_path(record, &key.spec.key_name());
        if let Ok(data) = tokio::fs::read(&path).await {
            let data = Bytes::from(data);
            self.cache.put(key.clone(), data.clone()).await;
            return Ok(Thumbnail {
                key,
                data,
                cache_hit: true,
            });
        }

        let data = self.generate_once(record, &key).await?;
        Ok(Thumbnail {
            key,
            data,
            cache_hit: false,
        })
    }

    /// Generate `key`, sharing the work with concurrent requests.
    async fn generate_once(
        &self,
        record: &MediaRecord,
        key: &ThumbnailKey,
    ) -> Result<Bytes, MediaError> {
        loop {
            let role = {
                let mut in_flight = lock(&self.in_flight);
                if let Some(state) = in_flight.get(key) {
                    Role::Waiter(state.clone())
                } else {
                    let state = Arc::new(InFlightState {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key.clone(), state.clone());
                    Role::Leader(state)
                }
            };

            let state = match role {
                Role::Leader(state) => {
                    let guard = LeaderGuard {
                        in_flight: &self.in_flight,
                        key,
                        state: state.clone(),
                    };
                    // A previous leader may have finished since our lookup.
                    let result = match self.cache.get(key).await {
                        Some(data) => Ok(data),
                        None => self.generate(record, key).await,
                    };
                    *lock(&state.result) = Some(result.clone());
                    drop(guard);
                    return result;
                }
                Role::Waiter(state) => state,
            };

            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = lock(&state.result).clone() {
                return result;
            }
            let still_running = lock(&self.in_flight)
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &state));
            if still_running {
                notified.await;
                if let Some(result) = lock(&state.result).clone() {
                    return result;
                }
            }
            // Leader was cancelled; retry and possibly lead.
        }
    }

    async fn generate(
        &self,
        record: &MediaRecord,
        key: &ThumbnailKey,
    ) -> Result<Bytes, MediaError> {
        let source_path = self.store.filesystem_path(record, ORIGINAL_VARIANT);
        let source = tokio::fs::read(&source_path).await.map_err(|e| {
            MediaError::Generation(format!("{}: {}", source_path.display(), e))
        })?;

        let renderer = self.renderer.clone();
        let spec = key.spec.clone();
        let mime_type = record.thumbnail_mime_type.clone();
        let media_id = record.id;

        let data = tokio::task::spawn_blocking(move || renderer.render(&source, &spec, &mime_type))
            .await
            .map_err(|e| MediaError::Generation(e.to_string()))??;

        debug!(
            media_id,
            thumbnail = %key.spec.key_name(),
            bytes = data.len(),
            "Generated thumbnail"
        );

        // The record may have been deleted while rendering; nothing derived
        // from it may outlive the delete.
        self.ensure_exists(media_id).await?;

        let target = self.store.thumbnail_path(record, &key.spec.key_name());
        let payload = data.clone();
        let persisted = tokio::task::spawn_blocking(move || persist_atomically(&target, &payload))
            .await
            .map_err(|e| MediaError::Generation(e.to_string()))?;
        if let Err(e) = persisted {
            warn!(media_id, error = %e, "Failed to persist thumbnail");
        }

        self.ensure_exists(media_id).await?;
        self.cache.put(key.clone(), data.clone()).await;
        Ok(data)
    }

    async fn ensure_exists(&self, media_id: MediaId) -> Result<(), MediaError> {
        match self.store.get(media_id).await? {
            Some(_) => Ok(()),
            None => {
                debug!(media_id, "Media deleted during thumbnail generation");
                self.cache.remove_media(media_id).await;
                Err(MediaError::not_found(format!("media {}", media_id)))
            }
        }
    }
}

/// Write `data` next to `path` and rename it into place.
fn persist_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::other("thumbnail path has no parent"))?;

    // Only the thumbnail directory is created; a missing record directory
    // means the record is gone.
    match std::fs::create_dir(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
