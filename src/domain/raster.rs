//! Raster and mask types exchanged with the editing service
//!
//! Both wrap their pixel buffer in an `Arc` so history snapshots, previews
//! and in-flight requests can share one image without copying it.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageFormat, RgbaImage};
use thiserror::Error;

/// Errors while encoding or decoding image payloads
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid image data: {0}")]
    Image(#[from] image::ImageError),
}

/// Strip an optional `data:<mime>;base64,` prefix
fn strip_data_url(b64: &str) -> &str {
    match b64.split_once(',') {
        Some((_, payload)) => payload,
        None => b64,
    }
}

fn decode_base64(b64: &str) -> Result<Vec<u8>, CodecError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(strip_data_url(b64.trim()))?)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// A full RGBA image snapshot
#[derive(Clone, PartialEq)]
pub struct Raster(Arc<RgbaImage>);

impl Raster {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// Decode any supported encoded image (PNG, JPEG)
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image.into_rgba8()))
    }

    /// Decode a base64 (optionally data-URL) encoded image
    pub fn from_base64(b64: &str) -> Result<Self, CodecError> {
        Self::decode(&decode_base64(b64)?)
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode_png(&DynamicImage::ImageRgba8((*self.0).clone()))
    }

    /// Encode as base64 PNG
    pub fn to_base64(&self) -> Result<String, image::ImageError> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png()?))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.0
    }

    /// Whether two rasters share the same buffer
    pub fn ptr_eq(&self, other: &Raster) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Write the image to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        self.0
            .save(path)
            .with_context(|| format!("Failed to save image: {}", path.display()))
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raster({}x{})", self.width(), self.height())
    }
}

impl From<RgbaImage> for Raster {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

/// Single-channel mask marking the pixels of a region (non-zero = inside)
#[derive(Clone, PartialEq)]
pub struct Mask(Arc<GrayImage>);

impl Mask {
    pub fn new(mask: GrayImage) -> Self {
        Self(Arc::new(mask))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image.into_luma8()))
    }

    pub fn from_base64(b64: &str) -> Result<Self, CodecError> {
        Self::decode(&decode_base64(b64)?)
    }

    pub fn to_base64(&self) -> Result<String, image::ImageError> {
        let png = encode_png(&DynamicImage::ImageLuma8((*self.0).clone()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Number of pixels inside the region
    pub fn covered_pixels(&self) -> usize {
        self.0.pixels().filter(|p| p.0[0] > 0).count()
    }

    /// Fraction of the image covered by the region
    pub fn coverage(&self) -> f64 {
        let total = self.width() as usize * self.height() as usize;
        if total == 0 {
            0.0
        } else {
            self.covered_pixels() as f64 / total as f64
        }
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mask({}x{}, {:.1}%)", self.width(), self.height(), self.coverage() * 100.0)
    }
}
