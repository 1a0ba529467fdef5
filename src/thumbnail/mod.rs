//! Thumbnail derivation, caching and delivery.
//!
//! - [`spec`]: path grammar, [`ThumbnailSpec`] and [`ThumbnailKey`]
//! - [`render`]: resizing and encoding
//! - [`cache`]: in-memory LRU in front of persisted thumbnails
//! - [`pipeline`]: the [`ThumbnailPipeline`] tying them together

pub mod cache;
pub mod pipeline;
pub mod render;
pub mod spec;

pub use cache::{ThumbnailCache, DEFAULT_THUMBNAIL_CACHE_CAPACITY};
pub use pipeline::{Thumbnail, ThumbnailPipeline, CACHE_HIT_HEADER};
pub use render::{clamp_quality, ThumbnailRenderer, DEFAULT_JPEG_QUALITY};
pub use spec::{
    FillColor, ThumbnailKey, ThumbnailSpec, DEFAULT_THUMBNAIL_SIZE, MAX_THUMBNAIL_DIMENSION,
};
