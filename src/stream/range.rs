//! Byte-range resolution for single-range requests.
//!
//! Three forms of the `Range` header are understood:
//!
//! | Form          | Window                       |
//! |---------------|------------------------------|
//! | `bytes=a-b`   | `a..=min(b, L-1)`            |
//! | `bytes=a-`    | `a..=L-1`                    |
//! | `bytes=-n`    | `L-n..=L-1` (the last n)     |
//!
//! Multi-range requests are not supported and are reported separately so the
//! caller can tell them apart from malformed input in logs. Both end in 416.

/// An inclusive byte window inside a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    /// The window covering an entire resource of `size` bytes.
    ///
    /// Returns `None` for an empty resource.
    pub fn full(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for this window.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Why a `Range` header could not be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// The header lists more than one range
    MultipleRanges,
    /// The header is malformed or falls outside the resource
    Unsatisfiable,
}

/// `Content-Range` value sent with a 416: the whole resource.
pub fn unsatisfiable_content_range(size: u64) -> String {
    format!("bytes 0-{}/{}", size.saturating_sub(1), size)
}

/// Resolve a `Range` header against a resource of `size` bytes.
pub fn resolve_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let (unit, spec) = header
        .split_once('=')
        .ok_or(RangeError::Unsatisfiable)?;

    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Unsatisfiable);
    }
    if spec.contains(',') {
        return Err(RangeError::MultipleRanges);
    }

    let last = size.checked_sub(1).ok_or(RangeError::Unsatisfiable)?;
    let (first, second) = spec
        .trim()
        .split_once('-')
        .ok_or(RangeError::Unsatisfiable)?;
    let (first, second) = (first.trim(), second.trim());

    let (start, end) = if first.is_empty() {
        // Suffix form: the last n bytes
        let n = parse_offset(second)?;
        if n == 0 || n > size {
            return Err(RangeError::Unsatisfiable);
        }
        (size - n, last)
    } else {
        let start = parse_offset(first)?;
        let end = if second.is_empty() {
            last
        } else {
            parse_offset(second)?.min(last)
        };
        (start, end)
    };

    if start > end || start > last {
        return Err(RangeError::Unsatisfiable);
    }

    Ok(ByteRange { start, end })
}

fn parse_offset(raw: &str) -> Result<u64, RangeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Unsatisfiable);
    }
    raw.parse().map_err(|_| RangeError::Unsatisfiable)
}
