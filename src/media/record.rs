//! Media record types.

use serde::{Deserialize, Serialize};

/// Identifier of a media record. Assigned once by the store.
pub type MediaId = u64;

/// Name of the variant holding the uploaded bytes.
pub const ORIGINAL_VARIANT: &str = "original";

/// Metadata for one stored media object.
///
/// The original bytes behind a record never change after creation, which is
/// what allows every URL derived from it to be cached for a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,

    /// Mutable human-readable caption
    pub caption: Option<String>,

    /// File extension of the original, without the dot
    pub extension: String,

    /// MIME type of the original
    pub mime_type: String,

    /// MIME type used when encoding thumbnails
    pub thumbnail_mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextRef>,

    /// Size of the original in bytes
    #[serde(default)]
    pub size: u64,

    /// Pixel dimensions of the original, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MediaRecord {
    /// Attachment filename used when a download names none.
    ///
    /// Falls back to `{ContextClass}_{ContextID}` when the record has no
    /// caption, and appends the record's extension when the name has none.
    pub fn download_filename(&self, requested: Option<&str>) -> String {
        let mut name = match requested.filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => match self.caption.as_deref().filter(|c| !c.is_empty()) {
                Some(caption) => caption.to_string(),
                None => match &self.context {
                    Some(ctx) => format!("{}_{}", ctx.class, ctx.id),
                    None => "_0".to_string(),
                },
            },
        };

        if !name.contains('.') {
            name.push('.');
            name.push_str(&self.extension);
        }

        name.replace('"', "")
    }
}

/// Weak reference to an externally owned entity the media is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub class: String,
    pub id: u64,
}

/// Values supplied when creating a record.
#[derive(Debug, Clone, Default)]
pub struct NewMedia {
    pub caption: Option<String>,

    /// Filename as sent by the client, if any
    pub original_filename: Option<String>,
}

/// Filters for listing records.
#[derive(Debug, Clone, Default)]
pub struct BrowseFilter {
    pub context_class: Option<String>,
    pub context_id: Option<u64>,
    pub limit: usize,
}

/// Parse a media identifier, accepting only ASCII digits.
pub fn parse_media_id(raw: &str) -> Option<MediaId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
