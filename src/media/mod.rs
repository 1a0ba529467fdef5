//! Media records and the collaborators the request components depend on.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │   RangeStreamer · ThumbnailPipeline · UploadIngestor ·   │
//! │                     DeleteBatcher                        │
//! └───────────┬───────────────────┬──────────────────┬───────┘
//!             │                   │                  │
//!             ▼                   ▼                  ▼
//!    ┌────────────────┐  ┌────────────────┐  ┌────────────────┐
//!    │   MediaStore   │  │ AccessControl  │  │ContextResolver │
//!    │ (records/files)│  │ (read/write/   │  │ (owner lookup) │
//!    │                │  │  upload gates) │  │                │
//!    └───────┬────────┘  └────────────────┘  └────────────────┘
//!            │
//!            ▼
//!    ┌────────────────┐
//!    │LocalMediaStore │
//!    └────────────────┘
//! ```

mod access;
mod context;
mod local;
mod record;
mod store;

pub use access::{AccessControl, Identity, OpenAccess, StaffTokenAccess};
pub use context::{AllowListContexts, ContextResolver, KnownContexts};
pub use local::LocalMediaStore;
pub use record::{
    parse_media_id, BrowseFilter, ContextRef, MediaId, MediaRecord, NewMedia, ORIGINAL_VARIANT,
};
pub use store::MediaStore;
