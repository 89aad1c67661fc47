//! Scripted capability for tests
//!
//! Every call is counted so tests can assert that a local rejection never
//! reached the service. Results are scripted per operation; a gated
//! operation waits until the test releases it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use tokio::sync::Notify;

use super::*;
use crate::domain::{Dpi, Mask, Rgb};
use crate::error::CapabilityError;

#[derive(Debug, Default)]
pub struct CallCounts {
    pub upload: AtomicUsize,
    pub pick: AtomicUsize,
    pub switch_granularity: AtomicUsize,
    pub apply_edit: AtomicUsize,
    pub extract_palette: AtomicUsize,
    pub apply_color_mapping: AtomicUsize,
    pub color_variants: AtomicUsize,
    pub crop_to_size: AtomicUsize,
    pub generate: AtomicUsize,
    pub search: AtomicUsize,
    pub fetch_image: AtomicUsize,
}

#[derive(Default)]
pub struct FakeCapability {
    pub calls: CallCounts,
    pub segmentation_mode: Mutex<SegmentationMode>,
    /// Layer returned by the next picks; `None` means "no region"
    pub pick_layer: Mutex<Option<LayerName>>,
    pub fail_pick: Mutex<Option<CapabilityError>>,
    pub fail_edit: Mutex<Option<CapabilityError>>,
    /// When set, edits wait for a notification before settling
    pub edit_gate: Mutex<Option<std::sync::Arc<Notify>>>,
    /// Every generate and search request, in call order
    pub generate_requests: Mutex<Vec<GenerateRequest>>,
    pub search_requests: Mutex<Vec<SearchRequest>>,
}

impl FakeCapability {
    pub fn new() -> Self {
        let fake = Self::default();
        *lock(&fake.pick_layer) = Some(LayerName::Field);
        fake
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn last_generate(&self) -> Option<GenerateRequest> {
        lock(&self.generate_requests).last().cloned()
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        lock(&self.search_requests).last().cloned()
    }

    pub fn total_calls(&self) -> usize {
        let c = &self.calls;
        [
            &c.upload,
            &c.pick,
            &c.switch_granularity,
            &c.apply_edit,
            &c.extract_palette,
            &c.apply_color_mapping,
            &c.color_variants,
            &c.crop_to_size,
            &c.generate,
            &c.search,
            &c.fetch_image,
        ]
        .iter()
        .map(|a| a.load(Ordering::SeqCst))
        .sum()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

pub fn solid(width: u32, height: u32, v: u8) -> Raster {
    Raster::new(RgbaImage::from_pixel(width, height, Rgba([v, v, v, 255])))
}

pub fn square_mask(width: u32, height: u32) -> Mask {
    let mut gray = GrayImage::new(width, height);
    gray.put_pixel(0, 0, Luma([255]));
    Mask::new(gray)
}

impl Capability for FakeCapability {
    fn upload(&self, image: Raster, _options: UploadOptions) -> BoxFuture<'_, CapabilityResult<UploadReceipt>> {
        bump(&self.calls.upload);
        let n = Self::count(&self.calls.upload);
        let mode = *lock(&self.segmentation_mode);
        async move {
            Ok(UploadReceipt {
                session_id: SessionId::new(format!("session-{n}")),
                meta: SessionMeta {
                    width: image.width(),
                    height: image.height(),
                    segmentation_mode: mode,
                },
            })
        }
        .boxed()
    }

    fn pick(&self, _session: SessionId, _point: PixelPoint) -> BoxFuture<'_, CapabilityResult<RegionPick>> {
        bump(&self.calls.pick);
        let result = match lock(&self.fail_pick).clone() {
            Some(err) => Err(err),
            None => Ok(RegionPick {
                layer: *lock(&self.pick_layer),
                mask: square_mask(4, 4),
            }),
        };
        async move { result }.boxed()
    }

    fn switch_granularity(
        &self,
        _session: SessionId,
        level: Granularity,
    ) -> BoxFuture<'_, CapabilityResult<RegionPick>> {
        bump(&self.calls.switch_granularity);
        let side = 2 + u8::from(level) as u32;
        async move {
            Ok(RegionPick {
                layer: Some(LayerName::SelectedRegion),
                mask: square_mask(side, side),
            })
        }
        .boxed()
    }

    fn apply_edit(&self, request: EditRequest) -> BoxFuture<'_, CapabilityResult<EditResult>> {
        bump(&self.calls.apply_edit);
        let failure = lock(&self.fail_edit).clone();
        let gate = lock(&self.edit_gate).clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(EditResult {
                    image: solid(4, 4, request.instruction.len() as u8),
                    updated_mask: None,
                    applied_params: serde_json::json!({ "layer": request.layer.as_str() }),
                }),
            }
        }
        .boxed()
    }

    fn extract_palette(&self, _image: Raster, n_colors: u8) -> BoxFuture<'_, CapabilityResult<Vec<PaletteEntry>>> {
        bump(&self.calls.extract_palette);
        let palette = (0..n_colors)
            .map(|i| {
                let rgb = Rgb::new(i * 20, 0, 0);
                PaletteEntry {
                    rgb,
                    hex: rgb.to_hex(),
                    ratio: 1.0 / n_colors as f64,
                }
            })
            .collect();
        async move { Ok(palette) }.boxed()
    }

    fn apply_color_mapping(&self, request: MappingRequest) -> BoxFuture<'_, CapabilityResult<Raster>> {
        bump(&self.calls.apply_color_mapping);
        let v = request.mapping.target_colors.first().map_or(0, |c| c.g);
        async move { Ok(solid(request.image.width(), request.image.height(), v)) }.boxed()
    }

    /// Variant `i` is a solid image of value `100 + 50 * i`
    fn color_variants(&self, image: Raster, n_colors: u8) -> BoxFuture<'_, CapabilityResult<Vec<ColorVariant>>> {
        bump(&self.calls.color_variants);
        let variants = (0..3u8)
            .map(|i| {
                let v = 100 + 50 * i;
                ColorVariant {
                    colors: vec![Rgb::new(v, v, v); n_colors as usize],
                    image: solid(image.width(), image.height(), v),
                }
            })
            .collect();
        async move { Ok(variants) }.boxed()
    }

    fn crop_to_size(&self, request: CropRequest) -> BoxFuture<'_, CapabilityResult<CropPreview>> {
        bump(&self.calls.crop_to_size);
        // keep previews tiny; only the reported size follows the request
        let (w, h) = request.spec.target_pixels();
        let scale = w as f64 / request.image.width().max(1) as f64;
        let mode = request.spec.mode;
        let dpi_marker = if request.spec.dpi == Dpi::High { 30 } else { 15 };
        async move {
            Ok(CropPreview {
                image: solid(3, 5, dpi_marker),
                actual_width_px: w,
                actual_height_px: h,
                scale_ratio: scale,
                mode_used: mode,
            })
        }
        .boxed()
    }

    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, CapabilityResult<Generation>> {
        bump(&self.calls.generate);
        lock(&self.generate_requests).push(request.clone());
        let urls = (0..request.count)
            .map(|i| format!("/generated/{i}.png"))
            .collect();
        async move {
            Ok(Generation {
                urls,
                assistant_confirm: Some(request.prompt),
            })
        }
        .boxed()
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>> {
        bump(&self.calls.search);
        lock(&self.search_requests).push(request.clone());
        let hits = (0..request.top_k.min(3))
            .map(|i| SearchHit {
                id: format!("hit-{i}"),
                score: 1.0 - i as f64 * 0.1,
                path: format!("/static/{i}.png"),
            })
            .collect();
        async move { Ok(hits) }.boxed()
    }

    fn fetch_image(&self, _url: String) -> BoxFuture<'_, CapabilityResult<Raster>> {
        bump(&self.calls.fetch_image);
        async move { Ok(solid(6, 4, 7)) }.boxed()
    }
}
