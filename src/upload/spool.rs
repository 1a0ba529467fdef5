//! Size-limited receiving of upload bodies.

use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::ingest::TransferStatus;

/// Write a body stream to a temporary file, stopping at `max_size` bytes.
pub async fn spool_to_temp<S, E>(
    mut body: S,
    max_size: usize,
) -> Result<NamedTempFile, TransferStatus>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let spooled = NamedTempFile::new().map_err(|e| {
        warn!(error = %e, "Failed to create upload spool file");
        TransferStatus::Failed
    })?;
    let handle = spooled.reopen().map_err(|_| TransferStatus::Failed)?;
    let mut file = tokio::fs::File::from_std(handle);

    let mut received = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            let text = e.to_string();
            warn!(error = %text, received, "Upload body interrupted");
            classify_transport_error(None, &text)
        })?;
        received += chunk.len();
        if received > max_size {
            return Err(TransferStatus::SizeExceeded);
        }
        file.write_all(&chunk)
            .await
            .map_err(|_| TransferStatus::Failed)?;
    }

    if received == 0 {
        return Err(TransferStatus::NoFile);
    }
    file.flush().await.map_err(|_| TransferStatus::Failed)?;
    Ok(spooled)
}

/// Map a transport failure onto the status reported to the client.
pub fn classify_transport_error(status: Option<StatusCode>, text: &str) -> TransferStatus {
    let text = text.to_ascii_lowercase();
    if status == Some(StatusCode::PAYLOAD_TOO_LARGE) || text.contains("length limit") {
        TransferStatus::SizeExceeded
    } else if text.contains("incomplete") || text.contains("connection") {
        TransferStatus::Partial
    } else {
        TransferStatus::Failed
    }
}
