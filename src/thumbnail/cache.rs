//! In-memory cache for encoded thumbnails.
//!
//! Sits in front of the persisted thumbnail files so hot thumbnails are served
//! without touching the filesystem. Entries are evicted least-recently-used
//! once the total size of cached bytes exceeds capacity.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use super::spec::ThumbnailKey;

/// Default cache capacity: 64MB
pub const DEFAULT_THUMBNAIL_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// LRU cache for encoded thumbnails with size-based capacity.
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
pub struct ThumbnailCache {
    cache: RwLock<LruCache<ThumbnailKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_THUMBNAIL_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded both in bytes and in entry count.
    ///
    /// An entry bound of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN),
            )),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a thumbnail, marking it as recently used.
    pub async fn get(&self, key: &ThumbnailKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a thumbnail without updating LRU order.
    pub async fn contains(&self, key: &ThumbnailKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a thumbnail, evicting until the cache is within capacity.
    ///
    /// A thumbnail larger than the whole capacity is not cached.
    pub async fn put(&self, key: ThumbnailKey, data: Bytes) {
        let data_size = data.len();
        if data_size > self.max_size {
            return;
        }

        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old_data) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old_data.len());
        }

        // Entry-count eviction happens inside `push`; account for it too.
        if let Some((evicted_key, evicted)) = cache.push(key.clone(), data) {
            if evicted_key != key {
                *current_size = current_size.saturating_sub(evicted.len());
            }
        }
        *current_size += data_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    /// Remove a thumbnail, returning it if it was cached.
    pub async fn remove(&self, key: &ThumbnailKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let data = cache.pop(key)?;
        *current_size = current_size.saturating_sub(data.len());
        Some(data)
    }

    /// Drop every cached thumbnail of a media record.
    pub async fn remove_media(&self, media_id: u64) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let keys: Vec<ThumbnailKey> = cache
            .iter()
            .filter(|(k, _)| k.media_id == media_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            if let Some(data) = cache.pop(&key) {
                *current_size = current_size.saturating_sub(data.len());
            }
        }
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached thumbnails in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new()
    }
}
