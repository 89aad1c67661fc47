//! Palette-based recoloring: extract, assign targets, preview, commit
//!
//! Works on a snapshot of the session image taken when the workflow starts.
//! Previews never touch history; only `commit` does. A generated hue
//! variant can stand in for the mapping preview.

use std::ops::RangeInclusive;

use tokio::task::AbortHandle;

use crate::capability::{ColorVariant, MappingRequest};
use crate::domain::{PaletteEntry, PaletteMapping, Raster, Rgb, SnapshotOrigin};
use crate::error::{CapabilityResult, EditError, ValidationError};
use crate::session::lifecycle::{OpKind, Slot, Ticket};
use crate::session::state::EditSession;

pub const PALETTE_SIZES: RangeInclusive<u8> = 2..=10;
pub const TOLERANCES: RangeInclusive<u8> = 10..=100;
/// Dominant colors per generated hue variant
pub const VARIANT_COLORS: RangeInclusive<u8> = 2..=5;

#[derive(Debug)]
pub struct ColorRemap {
    source: Raster,
    palette: Vec<PaletteEntry>,
    /// Target per palette entry, `None` = leave unchanged
    targets: Vec<Option<Rgb>>,
    tolerance: u8,
    preserve_luminance: bool,
    preview: Option<Raster>,
    variants: Vec<ColorVariant>,
    /// Index into `variants` when the preview is a chosen variant
    chosen_variant: Option<usize>,
    slot: Slot,
}

impl ColorRemap {
    pub fn new(source: Raster, tolerance: u8, preserve_luminance: bool) -> Self {
        Self {
            source,
            palette: Vec::new(),
            targets: Vec::new(),
            tolerance: tolerance.clamp(*TOLERANCES.start(), *TOLERANCES.end()),
            preserve_luminance,
            preview: None,
            variants: Vec::new(),
            chosen_variant: None,
            slot: Slot::new("color-remap"),
        }
    }

    pub fn source(&self) -> &Raster {
        &self.source
    }

    pub fn palette(&self) -> &[PaletteEntry] {
        &self.palette
    }

    pub fn targets(&self) -> &[Option<Rgb>] {
        &self.targets
    }

    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    pub fn preserve_luminance(&self) -> bool {
        self.preserve_luminance
    }

    pub fn preview(&self) -> Option<&Raster> {
        self.preview.as_ref()
    }

    pub fn variants(&self) -> &[ColorVariant] {
        &self.variants
    }

    pub fn chosen_variant(&self) -> Option<usize> {
        self.chosen_variant
    }

    pub fn pending_kind(&self) -> Option<OpKind> {
        self.slot.pending()
    }

    pub fn attach_abort(&mut self, ticket: Ticket, handle: AbortHandle) {
        self.slot.attach(ticket, handle);
    }

    /// Start extracting `n_colors` dominant colors from the source
    pub fn begin_extract(&mut self, n_colors: u8) -> Result<Ticket, EditError> {
        if !PALETTE_SIZES.contains(&n_colors) {
            return Err(ValidationError::PaletteSize(n_colors).into());
        }
        Ok(self.slot.begin(OpKind::ExtractPalette))
    }

    /// Install an extracted palette; all assignments and the preview reset
    pub fn settle_extract(
        &mut self,
        ticket: Ticket,
        result: CapabilityResult<Vec<PaletteEntry>>,
    ) -> Result<usize, EditError> {
        if ticket.kind() != OpKind::ExtractPalette {
            return Err(EditError::StateInvariant("palette settled with a foreign ticket"));
        }
        self.slot.settle(ticket)?;
        let palette = result?;
        self.targets = vec![None; palette.len()];
        self.palette = palette;
        self.clear_preview();
        Ok(self.palette.len())
    }

    /// Start generating hue variants of the source
    pub fn begin_variants(&mut self, n_colors: u8) -> Result<Ticket, EditError> {
        if !VARIANT_COLORS.contains(&n_colors) {
            return Err(ValidationError::VariantColors(n_colors).into());
        }
        Ok(self.slot.begin(OpKind::ColorVariants))
    }

    /// Install generated variants. A chosen variant preview is dropped; a
    /// mapping preview stays.
    pub fn settle_variants(
        &mut self,
        ticket: Ticket,
        result: CapabilityResult<Vec<ColorVariant>>,
    ) -> Result<usize, EditError> {
        if ticket.kind() != OpKind::ColorVariants {
            return Err(EditError::StateInvariant("variants settled with a foreign ticket"));
        }
        self.slot.settle(ticket)?;
        let variants = result?;
        if self.chosen_variant.is_some() {
            self.clear_preview();
        }
        self.variants = variants;
        Ok(self.variants.len())
    }

    /// Use variant `index` (0-based) as the preview to commit
    pub fn choose_variant(&mut self, index: usize) -> Result<(), ValidationError> {
        let variant = self
            .variants
            .get(index)
            .ok_or(ValidationError::NoVariant(index + 1))?;
        self.preview = Some(variant.image.clone());
        self.chosen_variant = Some(index);
        Ok(())
    }

    fn clear_preview(&mut self) {
        self.preview = None;
        self.chosen_variant = None;
    }

    pub fn assign(&mut self, index: usize, target: Option<Rgb>) -> Result<(), ValidationError> {
        if self.palette.is_empty() {
            return Err(ValidationError::NoPalette);
        }
        let len = self.targets.len();
        let slot = self
            .targets
            .get_mut(index)
            .ok_or(ValidationError::PaletteIndex { index, len })?;
        *slot = target;
        Ok(())
    }

    pub fn set_tolerance(&mut self, tolerance: u8) -> Result<(), ValidationError> {
        if !TOLERANCES.contains(&tolerance) {
            return Err(ValidationError::Tolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(())
    }

    pub fn set_preserve_luminance(&mut self, on: bool) {
        self.preserve_luminance = on;
    }

    /// Current assignments as source/target pairs
    pub fn mapping(&self) -> PaletteMapping {
        PaletteMapping::from_assignments(
            &self.palette,
            &self.targets,
            self.tolerance,
            self.preserve_luminance,
        )
    }

    /// Request a preview. Zero paired colors is rejected before any call.
    pub fn begin_preview(&mut self) -> Result<(Ticket, MappingRequest), EditError> {
        if self.palette.is_empty() {
            return Err(ValidationError::NoPalette.into());
        }
        let mapping = self.mapping();
        if mapping.is_empty() {
            return Err(ValidationError::NoPairedColors.into());
        }
        let ticket = self.slot.begin(OpKind::ApplyMapping);
        Ok((ticket, MappingRequest {
            image: self.source.clone(),
            mapping,
        }))
    }

    pub fn settle_preview(&mut self, ticket: Ticket, result: CapabilityResult<Raster>) -> Result<(), EditError> {
        if ticket.kind() != OpKind::ApplyMapping {
            return Err(EditError::StateInvariant("mapping preview settled with a foreign ticket"));
        }
        self.slot.settle(ticket)?;
        self.preview = Some(result?);
        self.chosen_variant = None;
        Ok(())
    }

    /// Push the preview into the session history. Returns the new history length.
    ///
    /// The preview must have been made from the image currently shown; after
    /// an edit or undo it is stale and the commit is refused.
    pub fn commit(&mut self, session: &mut EditSession) -> Result<usize, EditError> {
        if self.slot.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        if !self.source.ptr_eq(session.current_image()) {
            return Err(ValidationError::StaleSource.into());
        }
        let preview = self.preview.clone().ok_or(ValidationError::NoPreview)?;
        let origin = match self.chosen_variant {
            Some(index) => SnapshotOrigin::ColorVariant { number: index + 1 },
            None => SnapshotOrigin::ColorRemap {
                pairs: self.mapping().pairs(),
            },
        };
        session.commit_transform(preview, origin)
    }
}
