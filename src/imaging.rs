//! Screenshot preparation for vision models
//!
//! Screenshots come off the device as full-resolution PNGs. Before they are
//! sent to a model they are downscaled so the longer side fits
//! `max_dimension`, flattened to RGB and re-encoded as JPEG.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// Errors from [`ScreenCodec::encode`]
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Resizes and compresses screenshots into base64 JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenCodec {
    /// Longest allowed side in pixels
    pub max_dimension: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for ScreenCodec {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            quality: 85,
        }
    }
}

impl ScreenCodec {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality: quality.clamp(1, 100),
        }
    }

    /// Load `path`, shrink it to fit and return the base64 JPEG bytes
    pub fn encode(&self, path: &Path) -> Result<String, CodecError> {
        if !path.exists() {
            return Err(CodecError::NotFound(path.display().to_string()));
        }

        let img = image::open(path).map_err(|e| CodecError::Decode(e.to_string()))?;
        let img = self.fit(img);

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }

        Ok(STANDARD.encode(buffer.into_inner()))
    }

    /// Target size keeping the aspect ratio; unchanged when already small enough
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let longest = width.max(height);
        if longest <= self.max_dimension || longest == 0 {
            return (width, height);
        }
        let scale = self.max_dimension as f64 / longest as f64;
        let scaled = |side: u32| ((side as f64 * scale) as u32).max(1);
        if width >= height {
            (self.max_dimension, scaled(height))
        } else {
            (scaled(width), self.max_dimension)
        }
    }

    fn fit(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = (img.width(), img.height());
        let (new_width, new_height) = self.target_size(width, height);
        if (new_width, new_height) == (width, height) {
            img
        } else {
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
    }
}
