//! Byte-range streaming of stored media.
//!
//! - [`range`]: `Range` header resolution
//! - [`streamer`]: the [`RangeStreamer`] that turns a record into a response

pub mod range;
pub mod streamer;

pub use range::{resolve_range, unsatisfiable_content_range, ByteRange, RangeError};
pub use streamer::{variant_etag, RangeStreamer, StreamRequest, STREAM_CHUNK_SIZE};
