//! JSON request/response bodies of the editing service
//!
//! These structs mirror the service contract field for field. Conversion
//! into domain types happens here so `http` only deals with transport.

use serde::{Deserialize, Serialize};

use super::{
    ColorVariant, CropPreview, EditResult, Generation, SearchHit, SessionId, SessionMeta, UploadReceipt,
};
use crate::domain::{
    CropMode, CropSpec, LayerName, Mask, PaletteEntry, PaletteMapping, Raster, RegionPick, Rgb,
    SegmentationMode,
};
use crate::error::{CapabilityError, CapabilityResult};

// ============================================================================
// Interactive session
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub meta: UploadMeta,
}

#[derive(Debug, Deserialize)]
pub struct UploadMeta {
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub seg_mode: SegmentationMode,
}

impl From<UploadResponse> for UploadReceipt {
    fn from(resp: UploadResponse) -> Self {
        UploadReceipt {
            session_id: SessionId::new(resp.session_id),
            meta: SessionMeta {
                width: resp.meta.w,
                height: resp.meta.h,
                segmentation_mode: resp.meta.seg_mode,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PickRequest<'a> {
    pub session_id: &'a str,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Serialize)]
pub struct SwitchMaskRequest<'a> {
    pub session_id: &'a str,
    pub mask_index: u8,
}

#[derive(Debug, Deserialize)]
pub struct PickResponse {
    pub layer: String,
    pub mask_png_base64: String,
}

impl TryFrom<PickResponse> for RegionPick {
    type Error = CapabilityError;

    fn try_from(resp: PickResponse) -> CapabilityResult<Self> {
        let layer = LayerName::from_pick_label(&resp.layer).map_err(CapabilityError::Decode)?;
        let mask = Mask::from_base64(&resp.mask_png_base64)?;
        Ok(RegionPick { layer, mask })
    }
}

#[derive(Debug, Serialize)]
pub struct EditBody<'a> {
    pub session_id: &'a str,
    pub layer: LayerName,
    pub prompt: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct EditResponse {
    pub result_png_base64: String,
    #[serde(default)]
    pub layer_mask_png_base64: Option<String>,
    #[serde(default)]
    pub applied_params: serde_json::Value,
}

impl TryFrom<EditResponse> for EditResult {
    type Error = CapabilityError;

    fn try_from(resp: EditResponse) -> CapabilityResult<Self> {
        let image = Raster::from_base64(&resp.result_png_base64)?;
        let updated_mask = match resp.layer_mask_png_base64.as_deref() {
            Some(b64) if !b64.is_empty() => Some(Mask::from_base64(b64)?),
            _ => None,
        };
        Ok(EditResult {
            image,
            updated_mask,
            applied_params: resp.applied_params,
        })
    }
}

// ============================================================================
// Color remapping
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PaletteResponse {
    pub palette: Vec<PaletteEntry>,
}

#[derive(Debug, Serialize)]
pub struct MappingBody<'a> {
    pub image_base64: String,
    pub source_colors: &'a [Rgb],
    pub target_colors: &'a [Rgb],
    pub tolerance: u8,
    pub preserve_luminance: bool,
}

impl<'a> MappingBody<'a> {
    pub fn new(image: &Raster, mapping: &'a PaletteMapping) -> CapabilityResult<Self> {
        Ok(Self {
            image_base64: encode(image)?,
            source_colors: &mapping.source_colors,
            target_colors: &mapping.target_colors,
            tolerance: mapping.tolerance,
            preserve_luminance: mapping.preserve_luminance,
        })
    }
}

/// Response of the mapping and crop endpoints
#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    pub result_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct VariantsResponse {
    pub variants: Vec<VariantItem>,
}

#[derive(Debug, Deserialize)]
pub struct VariantItem {
    #[serde(default)]
    pub colors: Vec<Rgb>,
    pub image_base64: String,
}

impl TryFrom<VariantItem> for ColorVariant {
    type Error = CapabilityError;

    fn try_from(item: VariantItem) -> CapabilityResult<Self> {
        Ok(ColorVariant {
            colors: item.colors,
            image: Raster::from_base64(&item.image_base64)?,
        })
    }
}

impl TryFrom<VariantsResponse> for Vec<ColorVariant> {
    type Error = CapabilityError;

    fn try_from(resp: VariantsResponse) -> CapabilityResult<Self> {
        resp.variants.into_iter().map(ColorVariant::try_from).collect()
    }
}

// ============================================================================
// Crop to size
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CropBody {
    pub image_base64: String,
    pub target_width_cm: f64,
    pub target_height_cm: f64,
    pub dpi: u32,
    pub mode: CropMode,
    pub border_mask_base64: Option<String>,
}

impl CropBody {
    pub fn new(image: &Raster, spec: &CropSpec) -> CapabilityResult<Self> {
        let border_mask_base64 = spec
            .border_mask
            .as_ref()
            .map(|mask| {
                mask.to_base64()
                    .map_err(|e| CapabilityError::Decode(format!("failed to encode mask: {e}")))
            })
            .transpose()?;
        Ok(Self {
            image_base64: encode(image)?,
            target_width_cm: spec.width_cm,
            target_height_cm: spec.height_cm,
            dpi: spec.dpi.value(),
            mode: spec.mode,
            border_mask_base64,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CropResponse {
    pub result_base64: String,
    pub actual_width_px: u32,
    pub actual_height_px: u32,
    pub scale_ratio: f64,
    pub mode_used: CropMode,
}

impl TryFrom<CropResponse> for CropPreview {
    type Error = CapabilityError;

    fn try_from(resp: CropResponse) -> CapabilityResult<Self> {
        Ok(CropPreview {
            image: Raster::from_base64(&resp.result_base64)?,
            actual_width_px: resp.actual_width_px,
            actual_height_px: resp.actual_height_px,
            scale_ratio: resp.scale_ratio,
            mode_used: resp.mode_used,
        })
    }
}

// ============================================================================
// Generation and search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub results: Vec<String>,
    #[serde(default)]
    pub assistant_confirm: Option<String>,
}

impl From<GenerateResponse> for Generation {
    fn from(resp: GenerateResponse) -> Self {
        Generation {
            urls: resp.results,
            assistant_confirm: resp.assistant_confirm,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub score: f64,
    pub path: String,
}

impl From<SearchItem> for SearchHit {
    fn from(item: SearchItem) -> Self {
        SearchHit {
            id: item.id,
            score: item.score,
            path: item.path,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Pull a human-readable message out of an error body.
///
/// The service answers `{"detail": "..."}`; validation failures carry a
/// structured detail instead, which is rendered as compact JSON.
pub fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn encode(image: &Raster) -> CapabilityResult<String> {
    image
        .to_base64()
        .map_err(|e| CapabilityError::Decode(format!("failed to encode image: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dpi;
    use image::{GrayImage, Luma};

    fn mask_b64() -> String {
        let mut gray = GrayImage::new(3, 3);
        gray.put_pixel(1, 1, Luma([255]));
        Mask::new(gray).to_base64().unwrap()
    }

    #[test]
    fn test_upload_meta_point_prompt() {
        let resp: UploadResponse = serde_json::from_str(
            r#"{"session_id":"abc","meta":{"w":800,"h":600,"seg_mode":"sam","alpha_val":0.22,"filename":"a.png"}}"#,
        )
        .unwrap();
        let receipt = UploadReceipt::from(resp);
        assert_eq!(receipt.session_id.as_str(), "abc");
        assert_eq!(receipt.meta.width, 800);
        assert!(receipt.meta.segmentation_mode.supports_granularity());
    }

    #[test]
    fn test_pick_none_decodes_to_empty_layer() {
        let resp = PickResponse {
            layer: "none".into(),
            mask_png_base64: mask_b64(),
        };
        let pick = RegionPick::try_from(resp).unwrap();
        assert_eq!(pick.layer, None);
        assert_eq!(pick.mask.covered_pixels(), 1);
    }

    #[test]
    fn test_pick_unknown_layer_is_decode_error() {
        let resp = PickResponse {
            layer: "sky".into(),
            mask_png_base64: mask_b64(),
        };
        assert!(matches!(RegionPick::try_from(resp), Err(CapabilityError::Decode(_))));
    }

    #[test]
    fn test_edit_response_without_mask() {
        let image = Raster::new(image::RgbaImage::new(2, 2)).to_base64().unwrap();
        let resp: EditResponse = serde_json::from_str(&format!(
            r#"{{"result_png_base64":"data:image/png;base64,{image}","layer_mask_png_base64":"","applied_params":{{"hue":10}}}}"#
        ))
        .unwrap();
        let result = EditResult::try_from(resp).unwrap();
        assert_eq!(result.image.width(), 2);
        assert!(result.updated_mask.is_none());
        assert_eq!(result.applied_params["hue"], 10);
    }

    #[test]
    fn test_variants_decode_colors_and_images() {
        let image = Raster::new(image::RgbaImage::new(3, 2)).to_base64().unwrap();
        let resp: VariantsResponse = serde_json::from_str(&format!(
            r##"{{"variants":[
                {{"colors":[[200,10,10],[5,5,90]],"palette":[{{"rgb":[200,10,10],"hex":"#c80a0a"}}],"image_base64":"{image}"}},
                {{"colors":[],"image_base64":"data:image/png;base64,{image}"}}
            ]}}"##
        ))
        .unwrap();
        let variants = Vec::<ColorVariant>::try_from(resp).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].colors, vec![Rgb::new(200, 10, 10), Rgb::new(5, 5, 90)]);
        assert_eq!(variants[1].image.width(), 3);

        let broken: VariantsResponse =
            serde_json::from_str(r#"{"variants":[{"image_base64":"%%%"}]}"#).unwrap();
        assert!(matches!(
            Vec::<ColorVariant>::try_from(broken),
            Err(CapabilityError::Decode(_))
        ));
    }

    #[test]
    fn test_crop_body_shape() {
        let spec = CropSpec {
            width_cm: 160.0,
            height_cm: 230.0,
            dpi: Dpi::Standard,
            mode: CropMode::PreserveBorder,
            border_mask: Some(Mask::new(GrayImage::new(2, 2))),
        };
        let body = CropBody::new(&Raster::new(image::RgbaImage::new(2, 2)), &spec).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["dpi"], 150);
        assert_eq!(json["mode"], "preserve_border");
        assert!(json["border_mask_base64"].is_string());
    }

    #[test]
    fn test_mapping_body_shape() {
        let mapping = PaletteMapping {
            source_colors: vec![Rgb::new(1, 2, 3)],
            target_colors: vec![Rgb::new(4, 5, 6)],
            tolerance: 40,
            preserve_luminance: false,
        };
        let body = MappingBody::new(&Raster::new(image::RgbaImage::new(1, 1)), &mapping).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["source_colors"], serde_json::json!([[1, 2, 3]]));
        assert_eq!(json["target_colors"], serde_json::json!([[4, 5, 6]]));
        assert_eq!(json["preserve_luminance"], false);
    }

    #[test]
    fn test_error_detail_variants() {
        assert_eq!(error_detail(r#"{"detail":"Session not found"}"#), "Session not found");
        assert_eq!(
            error_detail(r#"{"detail":[{"loc":["x"],"msg":"bad"}]}"#),
            r#"[{"loc":["x"],"msg":"bad"}]"#
        );
        assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_detail(""), "no details");
    }
}
