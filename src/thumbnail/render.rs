//! Thumbnail derivation.
//!
//! Decodes a source image, resizes it according to a [`ThumbnailSpec`] and
//! encodes the result in the record's thumbnail format.
//!
//! # Sizing
//!
//! - **Fit** (default): scale down to fit inside the box, keeping the aspect
//!   ratio. Images already inside the box are not enlarged.
//! - **Fill**: like fit, then centred on an exact box-sized canvas of the fill
//!   colour.
//! - **Cropped**: scale to cover the box and crop the overflow, producing
//!   exactly the box size.
//!
//! Rendering is CPU-bound and synchronous; callers run it on a blocking
//! thread.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};

use crate::error::MediaError;

use super::spec::ThumbnailSpec;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Stateless thumbnail renderer.
#[derive(Debug, Clone)]
pub struct ThumbnailRenderer {
    quality: u8,
    filter: FilterType,
}

impl ThumbnailRenderer {
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
            filter: FilterType::CatmullRom,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Derive a thumbnail from encoded source bytes.
    ///
    /// `mime_type` selects the output encoding: `image/jpeg` produces JPEG,
    /// anything else PNG.
    pub fn render(
        &self,
        source: &[u8],
        spec: &ThumbnailSpec,
        mime_type: &str,
    ) -> Result<Bytes, MediaError> {
        let image = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| MediaError::Generation(e.to_string()))?
            .decode()
            .map_err(|e| MediaError::Generation(e.to_string()))?;

        let derived = self.resize(image, spec);
        self.encode(&derived, mime_type)
    }

    fn resize(&self, image: DynamicImage, spec: &ThumbnailSpec) -> DynamicImage {
        let (width, height) = (spec.max_width, spec.max_height);

        if spec.cropped {
            return image.resize_to_fill(width, height, self.filter);
        }

        let fitted = if image.width() <= width && image.height() <= height {
            image
        } else {
            image.resize(width, height, self.filter)
        };

        match &spec.fill {
            Some(fill) => {
                let [r, g, b] = fill.rgb();
                let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
                let x = (i64::from(width) - i64::from(fitted.width())) / 2;
                let y = (i64::from(height) - i64::from(fitted.height())) / 2;
                imageops::overlay(&mut canvas, &fitted.to_rgba8(), x, y);
                DynamicImage::ImageRgba8(canvas)
            }
            None => fitted,
        }
    }

    fn encode(&self, image: &DynamicImage, mime_type: &str) -> Result<Bytes, MediaError> {
        let mut output = Vec::new();

        if mime_type == "image/jpeg" {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            JpegEncoder::new_with_quality(&mut output, self.quality)
                .encode_image(&rgb)
                .map_err(|e| MediaError::Generation(e.to_string()))?;
        } else {
            image
                .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
                .map_err(|e| MediaError::Generation(e.to_string()))?;
        }

        Ok(Bytes::from(output))
    }
}

impl Default for ThumbnailRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
