//! Filesystem-backed media store.
//!
//! Each record lives in its own directory under the media root:
//!
//! ```text
//! {root}/{id}/record.json
//! {root}/{id}/original.{ext}
//! {root}/{id}/{variant}.{ext}
//! {root}/{id}/thumbnails/{key}.{ext}
//! ```
//!
//! Record metadata is loaded into memory when the store is opened and written
//! back on every change.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::StoreError;

use super::record::{
    parse_media_id, BrowseFilter, MediaId, MediaRecord, NewMedia, ORIGINAL_VARIANT,
};
use super::store::MediaStore;

const RECORD_FILE: &str = "record.json";
const THUMBNAIL_DIR: &str = "thumbnails";

/// High-water mark of allocated identifiers, kept under the root.
const NEXT_ID_FILE: &str = "next_id";

/// Bytes needed to sniff the container format.
const SNIFF_LEN: usize = 64;

/// Media store keeping files and JSON metadata in a directory tree.
pub struct LocalMediaStore {
    root: PathBuf,
    records: RwLock<BTreeMap<MediaId, MediaRecord>>,
    /// Next identifier to hand out; never decreases, even across deletes
    next_id: Mutex<MediaId>,
}

impl LocalMediaStore {
    /// Open (or create) a store rooted at `root`, loading existing records.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let mut records = BTreeMap::new();
        let mut highest: MediaId = 0;
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(parse_media_id) else {
                continue;
            };
            highest = highest.max(id);

            match load_record(&entry.path().join(RECORD_FILE), id).await {
                Ok(record) => {
                    records.insert(id, record);
                }
                Err(e) => warn!(media_id = id, error = %e, "Skipping unreadable media record"),
            }
        }

        let stored = match tokio::fs::read_to_string(root.join(NEXT_ID_FILE)).await {
            Ok(raw) => parse_media_id(raw.trim()).unwrap_or_else(|| {
                warn!(value = raw.trim(), "Ignoring malformed identifier high-water mark");
                0
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let next_id = stored.max(highest.saturating_add(1)).max(1);
        info!(root = %root.display(), records = records.len(), "Opened media store");

        Ok(Self {
            root,
            records: RwLock::new(records),
            next_id: Mutex::new(next_id),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn record_dir(&self, id: MediaId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Reserve an id and create its directory.
    ///
    /// The high-water mark is persisted before the directory exists, so an
    /// identifier is never handed out twice, not even after the newest record
    /// is deleted and the store reopened. Directories already on disk are
    /// skipped rather than reused.
    async fn allocate(&self) -> Result<(MediaId, PathBuf), StoreError> {
        let mut next_id = self.next_id.lock().await;
        loop {
            let id = *next_id;
            *next_id = id.saturating_add(1);
            tokio::fs::write(self.root.join(NEXT_ID_FILE), (*next_id).to_string()).await?;

            let dir = self.record_dir(id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    warn!(media_id = id, "Skipping identifier with a leftover directory");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn write_record(&self, record: &MediaRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Corrupt {
            id: record.id,
            message: e.to_string(),
        })?;
        tokio::fs::write(self.record_dir(record.id).join(RECORD_FILE), json).await?;
        Ok(())
    }

    async fn index(&self, record: MediaRecord) -> Result<MediaRecord, StoreError> {
        self.write_record(&record).await?;
        self.records.write().await.insert(record.id, record.clone());
        debug!(media_id = record.id, mime = %record.mime_type, "Created media record");
        Ok(record)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn is_variant_available(&self, record: &MediaRecord, variant: &str) -> bool {
        if variant == ORIGINAL_VARIANT {
            return true;
        }
        if !is_safe_name(variant) {
            return false;
        }
        tokio::fs::try_exists(self.filesystem_path(record, variant))
            .await
            .unwrap_or(false)
    }

    fn filesystem_path(&self, record: &MediaRecord, variant: &str) -> PathBuf {
        let variant = if is_safe_name(variant) {
            variant
        } else {
            ".invalid"
        };
        self.record_dir(record.id)
            .join(format!("{}.{}", variant, record.extension))
    }

    fn mime_type(&self, record: &MediaRecord, _variant: &str) -> String {
        record.mime_type.clone()
    }

    fn thumbnail_path(&self, record: &MediaRecord, key_name: &str) -> PathBuf {
        self.record_dir(record.id).join(THUMBNAIL_DIR).join(format!(
            "{}.{}",
            key_name,
            extension_for_mime(&record.thumbnail_mime_type)
        ))
    }

    async fn create_from_upload(
        &self,
        data: Bytes,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError> {
        let format = detect_format(&data)?;
        let dimensions = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| StoreError::Unsupported(e.to_string()))?
            .into_dimensions()
            .map_err(|e| StoreError::Unsupported(e.to_string()))?;

        let (id, dir) = self.allocate().await?;
        let record = build_record(id, format, data.len() as u64, dimensions, meta);
        tokio::fs::write(dir.join(format!("{}.{}", ORIGINAL_VARIANT, record.extension)), &data)
            .await?;

        self.index(record).await
    }

    async fn create_from_file(
        &self,
        path: &Path,
        meta: NewMedia,
    ) -> Result<MediaRecord, StoreError> {
        let mut sniff = Vec::with_capacity(SNIFF_LEN);
        tokio::fs::File::open(path)
            .await?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut sniff)
            .await?;
        let format = detect_format(&sniff)?;

        let source = path.to_path_buf();
        // Spooled uploads carry no extension, so the format is sniffed from content
        let dimensions = tokio::task::spawn_blocking(move || {
            ImageReader::open(&source)?
                .with_guessed_format()?
                .into_dimensions()
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(|e| StoreError::Unsupported(e.to_string()))?;

        let (id, dir) = self.allocate().await?;
        let size = tokio::fs::metadata(path).await?.len();
        let record = build_record(id, format, size, dimensions, meta);
        tokio::fs::copy(
            path,
            dir.join(format!("{}.{}", ORIGINAL_VARIANT, record.extension)),
        )
        .await?;

        self.index(record).await
    }

    async fn save(&self, record: &MediaRecord) -> Result<(), StoreError> {
        if !self.records.read().await.contains_key(&record.id) {
            return Err(StoreError::NotFound(format!("media {}", record.id)));
        }
        self.write_record(record).await?;
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, record: &MediaRecord) -> Result<bool, StoreError> {
        let removed = self.records.write().await.remove(&record.id).is_some();
        if !removed {
            return Ok(false);
        }

        match tokio::fs::remove_dir_all(self.record_dir(record.id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(media_id = record.id, "Deleted media record");
        Ok(true)
    }

    async fn browse(&self, filter: &BrowseFilter) -> Result<Vec<MediaRecord>, StoreError> {
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };

        let records = self.records.read().await;
        Ok(records
            .values()
            .rev()
            .filter(|r| match &filter.context_class {
                Some(class) => r.context.as_ref().is_some_and(|c| &c.class == class),
                None => true,
            })
            .filter(|r| match filter.context_id {
                Some(id) => r.context.as_ref().is_some_and(|c| c.id == id),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

async fn load_record(path: &Path, id: MediaId) -> Result<MediaRecord, StoreError> {
    let data = tokio::fs::read(path).await?;
    let record: MediaRecord = serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
        id,
        message: e.to_string(),
    })?;
    if record.id != id {
        return Err(StoreError::Corrupt {
            id,
            message: format!("directory holds record {}", record.id),
        });
    }
    Ok(record)
}

/// Identify an accepted image container from its leading bytes.
fn detect_format(data: &[u8]) -> Result<ImageFormat, StoreError> {
    let format =
        image::guess_format(data).map_err(|e| StoreError::Unsupported(e.to_string()))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP => Ok(format),
        other => Err(StoreError::Unsupported(format!("{:?}", other))),
    }
}

fn build_record(
    id: MediaId,
    format: ImageFormat,
    size: u64,
    (width, height): (u32, u32),
    meta: NewMedia,
) -> MediaRecord {
    // JPEG sources have no alpha, everything else keeps it through PNG.
    let thumbnail_mime_type = match format {
        ImageFormat::Jpeg => "image/jpeg",
        _ => "image/png",
    };

    MediaRecord {
        id,
        caption: meta.caption,
        extension: format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
            .to_string(),
        mime_type: format.to_mime_type().to_string(),
        thumbnail_mime_type: thumbnail_mime_type.to_string(),
        context: None,
        size,
        width: Some(width),
        height: Some(height),
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Variant and key names must stay inside the record directory.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
