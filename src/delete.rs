//! Single and batch deletion of media records.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::MediaError;
use crate::media::{parse_media_id, MediaRecord, MediaStore};

/// Records removed by a delete request.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub data: Vec<MediaRecord>,
}

/// Deletes records one after another.
///
/// The batch is not atomic: when a later identifier is missing the request
/// fails, but records deleted before it stay deleted.
pub struct DeleteBatcher<S> {
    store: Arc<S>,
}

impl<S: MediaStore> DeleteBatcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Delete every numeric identifier in `candidates`, in order.
    ///
    /// Non-numeric candidates are skipped.
    pub async fn delete<I, T>(&self, candidates: I) -> Result<DeleteOutcome, MediaError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.delete_all(candidates).await.into_result()
    }

    /// Like [`delete`](Self::delete), but keeps the records removed before a
    /// failure so callers can clean up after them.
    pub async fn delete_all<I, T>(&self, candidates: I) -> DeleteReport
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut report = DeleteReport::default();

        for candidate in candidates {
            let Some(id) = parse_media_id(candidate.as_ref()) else {
                debug!(candidate = candidate.as_ref(), "Skipping non-numeric media id");
                continue;
            };

            let record = match self.store.get(id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    report.failure = Some(MediaError::not_found(format!("media {}", id)));
                    break;
                }
                Err(e) => {
                    report.failure = Some(e.into());
                    break;
                }
            };

            match self.store.delete(&record).await {
                Ok(true) => {
                    info!(media_id = id, "Media deleted");
                    report.deleted.push(record);
                }
                Ok(false) => {}
                Err(e) => {
                    report.failure = Some(e.into());
                    break;
                }
            }
        }

        report
    }
}

/// Progress of a delete batch, including the records removed before a
/// failure stopped it.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<MediaRecord>,
    pub failure: Option<MediaError>,
}

impl DeleteReport {
    pub fn into_result(self) -> Result<DeleteOutcome, MediaError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(DeleteOutcome {
                success: true,
                data: self.deleted,
            }),
        }
    }
}

/// Pick the identifiers a delete request targets.
///
/// A path identifier wins over a `mediaID` value, which wins over a `media`
/// list.
pub fn delete_targets(
    path_id: Option<&str>,
    media_id: Option<&str>,
    media_list: Option<Vec<String>>,
) -> Vec<String> {
    if let Some(id) = path_id.filter(|s| !s.is_empty()) {
        return vec![id.to_string()];
    }
    if let Some(id) = media_id.filter(|s| !s.is_empty()) {
        return vec![id.to_string()];
    }
    media_list.unwrap_or_default()
}
