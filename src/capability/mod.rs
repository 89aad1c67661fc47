//! Remote editing capability
//!
//! Segmentation, regeneration, recoloring and cropping all happen in an
//! external service. The core only sees the `Capability` trait; `http`
//! provides the real transport and tests use a scripted fake.

pub mod http;
pub mod wire;

#[cfg(test)]
pub mod fake;

use std::fmt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CropMode, CropSpec, Granularity, LayerName, Mask, PaletteEntry, PaletteMapping, PixelPoint,
    Raster, RegionPick, Rgb, SegmentationMode, StyleHints,
};
use crate::error::CapabilityResult;

pub use http::HttpCapability;

/// Opaque session token issued by the service on upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session metadata fixed at upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMeta {
    pub width: u32,
    pub height: u32,
    pub segmentation_mode: SegmentationMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub session_id: SessionId,
    pub meta: SessionMeta,
}

/// Layer-extraction tuning sent with an upload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    pub alpha_val: f32,
    pub white_threshold: u8,
    pub layer_count: u8,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            alpha_val: 0.22,
            white_threshold: 245,
            layer_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub session_id: SessionId,
    pub layer: LayerName,
    pub instruction: String,
}

#[derive(Debug, Clone)]
pub struct EditResult {
    pub image: Raster,
    /// Mask of the edited layer on the new image, when the service sends one
    pub updated_mask: Option<Mask>,
    pub applied_params: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct MappingRequest {
    pub image: Raster,
    pub mapping: PaletteMapping,
}

/// One hue-shifted version of an image
#[derive(Debug, Clone, PartialEq)]
pub struct ColorVariant {
    /// Dominant colors of the variant
    pub colors: Vec<Rgb>,
    pub image: Raster,
}

#[derive(Debug, Clone)]
pub struct CropRequest {
    pub image: Raster,
    pub spec: CropSpec,
}

#[derive(Debug, Clone)]
pub struct CropPreview {
    pub image: Raster,
    pub actual_width_px: u32,
    pub actual_height_px: u32,
    pub scale_ratio: f64,
    pub mode_used: CropMode,
}

impl CropPreview {
    pub fn describe(&self) -> String {
        format!(
            "{}x{} px, scale {:.3} ({})",
            self.actual_width_px, self.actual_height_px, self.scale_ratio, self.mode_used
        )
    }
}

/// What a generation starts from besides the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateReference {
    /// Image-to-image: the image is uploaded with the prompt
    Image(Raster),
    /// Multi-turn: refine an earlier result by its URL
    Url(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub count: u32,
    pub size: String,
    /// `None` is plain text-to-image
    pub reference: Option<GenerateReference>,
    pub hints: StyleHints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub urls: Vec<String>,
    pub assistant_confirm: Option<String>,
}

/// Text search, image search, or both combined. At least one of `text`
/// and `image` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub text: Option<String>,
    pub image: Option<Raster>,
    pub top_k: u32,
    pub hints: StyleHints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub path: String,
}

/// Operations the editing core needs from the service.
///
/// Arguments are owned so each returned future is independent of the
/// caller's state and can run as a detached task.
pub trait Capability: Send + Sync + 'static {
    fn upload(&self, image: Raster, options: UploadOptions)
        -> BoxFuture<'_, CapabilityResult<UploadReceipt>>;

    fn pick(&self, session: SessionId, point: PixelPoint)
        -> BoxFuture<'_, CapabilityResult<RegionPick>>;

    fn switch_granularity(
        &self,
        session: SessionId,
        level: Granularity,
    ) -> BoxFuture<'_, CapabilityResult<RegionPick>>;

    fn apply_edit(&self, request: EditRequest) -> BoxFuture<'_, CapabilityResult<EditResult>>;

    fn extract_palette(
        &self,
        image: Raster,
        n_colors: u8,
    ) -> BoxFuture<'_, CapabilityResult<Vec<PaletteEntry>>>;

    fn apply_color_mapping(&self, request: MappingRequest)
        -> BoxFuture<'_, CapabilityResult<Raster>>;

    /// Hue-shifted versions of `image`, each with `n_colors` dominant colors
    fn color_variants(
        &self,
        image: Raster,
        n_colors: u8,
    ) -> BoxFuture<'_, CapabilityResult<Vec<ColorVariant>>>;

    fn crop_to_size(&self, request: CropRequest) -> BoxFuture<'_, CapabilityResult<CropPreview>>;

    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, CapabilityResult<Generation>>;

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>>;

    /// Download an image by URL (absolute or relative to the service)
    fn fetch_image(&self, url: String) -> BoxFuture<'_, CapabilityResult<Raster>>;
}
