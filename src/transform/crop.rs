//! Crop-to-size: preview a production crop, then commit it to history

use tokio::task::AbortHandle;

use crate::capability::{CropPreview, CropRequest};
use crate::domain::{CropSpec, Raster, SnapshotOrigin};
use crate::error::{CapabilityResult, EditError, ValidationError};
use crate::session::lifecycle::{OpKind, Slot, Ticket};
use crate::session::state::EditSession;

#[derive(Debug)]
pub struct CropToSize {
    source: Raster,
    last_spec: Option<CropSpec>,
    preview: Option<CropPreview>,
    slot: Slot,
}

impl CropToSize {
    pub fn new(source: Raster) -> Self {
        Self {
            source,
            last_spec: None,
            preview: None,
            slot: Slot::new("crop"),
        }
    }

    pub fn source(&self) -> &Raster {
        &self.source
    }

    pub fn last_spec(&self) -> Option<&CropSpec> {
        self.last_spec.as_ref()
    }

    pub fn preview(&self) -> Option<&CropPreview> {
        self.preview.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_pending()
    }

    pub fn attach_abort(&mut self, ticket: Ticket, handle: AbortHandle) {
        self.slot.attach(ticket, handle);
    }

    /// Validate `spec` locally and start a preview. `preserve_border`
    /// without a mask never reaches the service.
    pub fn begin_preview(&mut self, spec: CropSpec) -> Result<(Ticket, CropRequest), EditError> {
        spec.validate()?;
        let (w, h) = spec.target_pixels();
        log::debug!("Crop target {}x{} px at {} ({})", w, h, spec.dpi, spec.mode);

        self.last_spec = Some(spec.clone());
        let ticket = self.slot.begin(OpKind::CropPreview);
        Ok((ticket, CropRequest {
            image: self.source.clone(),
            spec,
        }))
    }

    pub fn settle_preview(
        &mut self,
        ticket: Ticket,
        result: CapabilityResult<CropPreview>,
    ) -> Result<&CropPreview, EditError> {
        if ticket.kind() != OpKind::CropPreview {
            return Err(EditError::StateInvariant("crop preview settled with a foreign ticket"));
        }
        self.slot.settle(ticket)?;
        Ok(self.preview.insert(result?))
    }

    /// Push the preview into the session history. Returns the new history length.
    pub fn commit(&mut self, session: &mut EditSession) -> Result<usize, EditError> {
        if self.slot.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        if !self.source.ptr_eq(session.current_image()) {
            return Err(ValidationError::StaleSource.into());
        }
        let preview = self.preview.as_ref().ok_or(ValidationError::NoPreview)?;
        session.commit_transform(preview.image.clone(), SnapshotOrigin::Crop {
            width_px: preview.actual_width_px,
            height_px: preview.actual_height_px,
            mode: preview.mode_used,
        })
    }
}
