//! Thumbnail request parameters and their path grammar.
//!
//! A thumbnail URL tail looks like:
//!
//! ```text
//! /thumbnail/{id}[/{W}x{H}[x[{RRGGBB}]]][/cropped]
//! ```
//!
//! A first segment that is not a dimension falls back to the configured
//! default size and is itself checked for `cropped`, so `/cropped` alone
//! crops the default box while `/huge/cropped` does not.

use std::fmt;

use crate::media::MediaId;

/// Largest accepted value for either thumbnail dimension.
///
/// Larger requests fall back to the default size like any other unmatched
/// dimension segment.
pub const MAX_THUMBNAIL_DIMENSION: u32 = 4096;

/// Default thumbnail size when the URL names none.
pub const DEFAULT_THUMBNAIL_SIZE: (u32, u32) = (100, 100);

/// Six uppercase hexadecimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FillColor(String);

impl FillColor {
    /// Parse `RRGGBB`, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> [u8; 3] {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        [channel(0), channel(2), channel(4)]
    }
}

impl fmt::Display for FillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a thumbnail is derived from its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailSpec {
    pub max_width: u32,
    pub max_height: u32,

    /// Pad onto an exact `max_width × max_height` canvas of this colour
    pub fill: Option<FillColor>,

    /// Scale and crop to exactly `max_width × max_height`
    pub cropped: bool,
}

impl ThumbnailSpec {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            fill: None,
            cropped: false,
        }
    }

    pub fn with_fill(mut self, fill: FillColor) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn cropped(mut self) -> Self {
        self.cropped = true;
        self
    }

    /// Parse the path segments that follow the media id.
    pub fn from_path(path: &str, default: (u32, u32)) -> Self {
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        let mut next = segments.next();
        let mut spec = match next.and_then(parse_dimensions) {
            Some(spec) => {
                next = segments.next();
                spec
            }
            None => Self::new(default.0, default.1),
        };

        if next == Some("cropped") {
            spec.cropped = true;
        }
        spec
    }

    /// Filesystem-safe name identifying this spec, e.g. `123x100xFF0000-cropped`.
    pub fn key_name(&self) -> String {
        let mut name = format!("{}x{}", self.max_width, self.max_height);
        if let Some(fill) = &self.fill {
            name.push('x');
            name.push_str(fill.as_str());
        }
        if self.cropped {
            name.push_str("-cropped");
        }
        name
    }
}

/// Identity of one derived thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub media_id: MediaId,
    pub spec: ThumbnailSpec,
}

impl ThumbnailKey {
    pub fn new(media_id: MediaId, spec: ThumbnailSpec) -> Self {
        Self { media_id, spec }
    }

    /// Entity tag: `media-{id}-{W}-{H}-{fill}-{cropped}`.
    pub fn etag(&self) -> String {
        format!(
            "media-{}-{}-{}-{}-{}",
            self.media_id,
            self.spec.max_width,
            self.spec.max_height,
            self.spec.fill.as_ref().map(FillColor::as_str).unwrap_or(""),
            self.spec.cropped
        )
    }
}

/// Match `{W}x{H}`, `{W}x{H}x` or `{W}x{H}x{RRGGBB}`.
fn parse_dimensions(segment: &str) -> Option<ThumbnailSpec> {
    let mut parts = segment.split(['x', 'X']);
    let width = parse_dimension(parts.next()?)?;
    let height = parse_dimension(parts.next()?)?;
    let fill = match parts.next() {
        None | Some("") => None,
        Some(raw) => Some(FillColor::parse(raw)?),
    };
    if parts.next().is_some() {
        return None;
    }

    let mut spec = ThumbnailSpec::new(width, height);
    spec.fill = fill;
    Some(spec)
}

fn parse_dimension(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse()
        .ok()
        .filter(|v| (1..=MAX_THUMBNAIL_DIMENSION).contains(v))
}
