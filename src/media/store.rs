//! The storage contract the request components consume.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

use super::record::{BrowseFilter, MediaId, MediaRecord, NewMedia};

/// Trait for the persistence layer behind media records.
///
/// The request components never touch record metadata directly; they look
/// records up, resolve filesystem paths for variants and hand new content to
/// the store. How bytes and metadata are laid out is entirely up to the
/// implementation.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Look up a record by identifier.
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>, StoreError>;

    /// Whether the named variant exists for this record.
    async fn is_variant_available(&self, record: &MediaRecord, variant: &str) -> bool;

    /// Filesystem path of the bytes for a variant.
    fn filesystem_path(&self, record: &MediaRecord, variant: &str) -> PathBuf;

    /// MIME type of the bytes for a variant.
    fn mime_type(&self, record: &MediaRecord, variant: &str) -> String;

    /// Filesystem path where a derived thumbnail is persisted.
    ///
    /// `key_name` is a filesystem-safe rendering of the thumbnail key.
    fn thumbnail_path(&self, record: &MediaRecord, key_name: &str) -> PathBuf;

    /// Create a record from a buffered upload.
    ///
    /// Returns `StoreError::Unsupported` when the content is not an accepted format.
    async fn create_from_upload(
        &self,
        data: Bytes,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError>;

    /// Create a record from content already written to a local file.
    async fn create_from_file(
        &self,
        path: &Path,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError>;

    /// Persist changes to mutable fields (caption, context).
    async fn save(&self, record: &MediaRecord) -> Result<(), StoreError>;

    /// Delete a record and everything derived from it.
    ///
    /// Returns `false` when nothing was deleted.
    async fn delete(&self, record: &MediaRecord) -> Result<bool, StoreError>;

    /// List records, newest first.
    async fn browse(&self, filter: &BrowseFilter) -> Result<Vec<MediaRecord>, StoreError>;
}
