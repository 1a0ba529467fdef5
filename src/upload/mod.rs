//! Upload ingestion.
//!
//! Two transports feed the same [`UploadIngestor`]: multipart form posts,
//! buffered in memory, and raw `PUT` bodies, spooled to a temporary file.
//! Both are size-limited while being received.

pub mod ingest;
pub mod spool;

pub use ingest::{
    strip_extension, ReceivedFile, TransferStatus, UploadBody, UploadFields, UploadIngestor,
    UploadOutcome, DEFAULT_UPLOAD_FIELD,
};
pub use spool::{classify_transport_error, spool_to_temp};
