//! Upload validation and record creation.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{messages, MediaError};
use crate::media::{parse_media_id, ContextRef, ContextResolver, MediaRecord, MediaStore, NewMedia};

/// Default multipart field carrying the file.
pub const DEFAULT_UPLOAD_FIELD: &str = "mediaFile";

/// How the transport reported the transfer of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    /// The field was present but carried no file
    NoFile,
    SizeExceeded,
    Partial,
    /// Any other transport failure
    Failed,
}

impl TransferStatus {
    /// User-facing message for an unsuccessful transfer.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            TransferStatus::Complete => None,
            TransferStatus::NoFile => Some(messages::NO_FILE),
            TransferStatus::SizeExceeded => Some(messages::SIZE_EXCEEDED),
            TransferStatus::Partial => Some(messages::PARTIAL),
            TransferStatus::Failed => Some(messages::UNKNOWN_UPLOAD),
        }
    }
}

/// Where the received bytes live.
#[derive(Debug)]
pub enum UploadBody {
    /// Held in memory (multipart form uploads)
    Buffered(Bytes),
    /// Spooled to a temporary file (raw PUT uploads)
    Spooled(NamedTempFile),
}

/// One file as received by the transport.
#[derive(Debug)]
pub struct ReceivedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub body: Option<UploadBody>,
    pub status: TransferStatus,
}

impl ReceivedFile {
    pub fn complete(field_name: impl Into<String>, file_name: Option<String>, body: UploadBody) -> Self {
        Self {
            field_name: field_name.into(),
            file_name,
            body: Some(body),
            status: TransferStatus::Complete,
        }
    }

    pub fn failed(field_name: impl Into<String>, status: TransferStatus) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: None,
            body: None,
            status,
        }
    }
}

/// Non-file request values the ingestor reads.
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub caption: Option<String>,
    pub context_class: Option<String>,
    pub context_id: Option<String>,
}

/// Successful upload payload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub data: MediaRecord,
}

/// Validates uploads and turns them into media records.
pub struct UploadIngestor<S> {
    store: Arc<S>,
    contexts: Arc<dyn ContextResolver>,
    field_name: String,
}

impl<S: MediaStore> UploadIngestor<S> {
    pub fn new(store: Arc<S>, contexts: Arc<dyn ContextResolver>) -> Self {
        Self {
            store,
            contexts,
            field_name: DEFAULT_UPLOAD_FIELD.to_string(),
        }
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Ingest the upload among `files`.
    ///
    /// The record is created before the context is checked, so a rejected
    /// context leaves the new record behind without one.
    pub async fn ingest(
        &self,
        files: Vec<ReceivedFile>,
        fields: &UploadFields,
    ) -> Result<UploadOutcome, MediaError> {
        let file = files
            .into_iter()
            .find(|f| f.field_name == self.field_name)
            .ok_or_else(|| MediaError::validation(messages::NO_FILE))?;

        if let Some(message) = file.status.message() {
            debug!(status = ?file.status, "Upload transfer failed");
            return Err(MediaError::validation(message));
        }
        let body = file
            .body
            .ok_or_else(|| MediaError::validation(messages::NO_FILE))?;

        let meta = NewMedia {
            caption: non_empty(fields.caption.as_deref())
                .map(str::to_string)
                .or_else(|| file.file_name.as_deref().map(strip_extension)),
            original_filename: file.file_name,
        };

        let created = match body {
            UploadBody::Buffered(data) => self.store.create_from_upload(data, meta).await,
            // The temporary file is removed when `spooled` drops.
            UploadBody::Spooled(spooled) => {
                self.store.create_from_file(spooled.path(), meta).await
            }
        };
        let mut record = created.map_err(|e| {
            debug!(error = %e, "Upload rejected by store");
            MediaError::validation(messages::UNSUPPORTED_FORMAT)
        })?;

        info!(media_id = record.id, mime = %record.mime_type, size = record.size, "Media uploaded");

        if let (Some(class), Some(id)) = (
            non_empty(fields.context_class.as_deref()),
            non_empty(fields.context_id.as_deref()),
        ) {
            record.context = Some(self.resolve_context(class, id).await?);
            self.store.save(&record).await?;
        }

        Ok(UploadOutcome {
            success: true,
            data: record,
        })
    }

    async fn resolve_context(&self, class: &str, raw_id: &str) -> Result<ContextRef, MediaError> {
        let id = match parse_media_id(raw_id) {
            Some(id) if self.contexts.is_allowed(class) => id,
            _ => return Err(MediaError::ContextInvalid(messages::CONTEXT_INVALID.to_string())),
        };

        match self.contexts.exists(class, id).await {
            Ok(true) => Ok(ContextRef {
                class: class.to_string(),
                id,
            }),
            Ok(false) | Err(_) => Err(MediaError::ContextInvalid(
                messages::CONTEXT_NOT_FOUND.to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Drop a trailing `.ext` from a filename.
pub fn strip_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() => file_name[..dot].to_string(),
        _ => file_name.to_string(),
    }
}
