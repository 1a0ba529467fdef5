//! # Media Streamer
//!
//! A media server that stores uploaded images and files and serves them back
//! over HTTP.
//!
//! ## Features
//!
//! - **Range-based streaming**: Single byte ranges with `206`/`416` semantics
//! - **Conditional caching**: Stored URLs never change meaning, so any cache
//!   validator is answered with `304` and every response is cacheable for a year
//! - **Thumbnails**: Fit, fill or crop to a size named in the URL, rendered
//!   once and cached in memory and on disk
//! - **Uploads**: Multipart or raw-body uploads with a fixed error vocabulary
//! - **Batch deletion**: Delete one record or many in a single request
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`media`] - Media records, the storage contract and access policies
//! - [`stream`] - Range resolution and the [`RangeStreamer`]
//! - [`thumbnail`] - The [`ThumbnailPipeline`] with its renderer and cache
//! - [`upload`] - The [`UploadIngestor`] and size-limited body receiving
//! - [`delete`] - The [`DeleteBatcher`]
//! - [`response`] - Transport-independent response values and cache headers
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use media_streamer::{create_router, AppState, LocalMediaStore, MediaSettings, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(LocalMediaStore::open("./media").await.unwrap());
//!     let state = AppState::new(store, MediaSettings::default());
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod delete;
pub mod error;
pub mod media;
pub mod response;
pub mod server;
pub mod stream;
pub mod thumbnail;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, MediaSettings};
pub use delete::{delete_targets, DeleteBatcher, DeleteOutcome, DeleteReport};
pub use error::{messages, MediaError, StoreError};
pub use media::{
    parse_media_id, AccessControl, AllowListContexts, BrowseFilter, ContextRef, ContextResolver,
    Identity, KnownContexts, LocalMediaStore, MediaId, MediaRecord, MediaStore, NewMedia,
    OpenAccess, StaffTokenAccess, ORIGINAL_VARIANT,
};
pub use response::{is_conditional, CachePolicy, MediaBody, MediaResponse, DEFAULT_CACHE_MAX_AGE};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use stream::{resolve_range, ByteRange, RangeError, RangeStreamer, StreamRequest};
pub use thumbnail::{
    FillColor, ThumbnailCache, ThumbnailKey, ThumbnailPipeline, ThumbnailRenderer, ThumbnailSpec,
};
pub use upload::{
    ReceivedFile, TransferStatus, UploadBody, UploadFields, UploadIngestor, UploadOutcome,
};
