//! Raster re-encoding of rendered formulas.
//!
//! TeX toolchains emit PNG. Requests for GIF or JPEG are served by decoding
//! that PNG and encoding it again in the requested format.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};

use super::types::ImageType;

/// Default JPEG quality (1-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum valid JPEG quality
const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum valid JPEG quality
const MAX_JPEG_QUALITY: u8 = 100;

/// Converts PNG output into the requested raster format.
///
/// # Example
///
/// ```
/// use formula_imager::render::{RasterEncoder, ImageType};
///
/// let encoder = RasterEncoder::new();
/// assert_eq!(encoder.jpeg_quality(), 90);
/// assert!(encoder.passes_through(ImageType::Png));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RasterEncoder {
    jpeg_quality: u8,
}

impl RasterEncoder {
    /// Create an encoder with the default JPEG quality.
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Create an encoder with a specific JPEG quality, clamped to 1-100.
    pub fn with_jpeg_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Whether PNG output can be used as-is for `target`.
    pub fn passes_through(&self, target: ImageType) -> bool {
        matches!(target, ImageType::Default | ImageType::Png | ImageType::Svg)
    }

    /// Re-encode PNG bytes as `target`.
    ///
    /// PNG and DEFAULT targets return the source unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not a decodable PNG or encoding fails.
    pub fn encode(&self, png: Bytes, target: ImageType) -> Result<Bytes, image::ImageError> {
        if self.passes_through(target) {
            return Ok(png);
        }

        let reader = ImageReader::with_format(Cursor::new(&png[..]), ImageFormat::Png);
        let img = reader.decode()?;

        let mut output = Vec::new();
        match target {
            ImageType::Jpeg => {
                // JPEG has no alpha channel
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
                encoder.encode_image(&rgb)?;
            }
            _ => {
                img.write_to(&mut Cursor::new(&mut output), ImageFormat::Gif)?;
            }
        }

        Ok(Bytes::from(output))
    }
}

impl Default for RasterEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
