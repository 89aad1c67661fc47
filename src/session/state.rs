//! Edit session state
//!
//! `EditSession` owns everything one editing workflow mutates: the history,
//! the active selection, the pending instruction and the layer-edit slot.
//! Operations are split into `begin_*` (validate, issue a ticket) and
//! `settle_*` (apply a result if its ticket is still current). Nothing here
//! performs IO; the application runs the capability call in between.

use tokio::task::AbortHandle;

use super::lifecycle::{OpKind, Slot, Ticket};
use crate::capability::{EditRequest, EditResult, SessionId, SessionMeta, UploadReceipt};
use crate::domain::{
    DisplayBox, HistoryStack, LayerName, NaturalSize, PixelPoint, Raster, RegionPick, Selection,
    SnapshotOrigin, UndoOutcome, map_click,
};
use crate::error::{CapabilityResult, EditError, ValidationError};

/// What a settled pick did to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    Selected { layer: LayerName, coverage_pct: u32 },
    /// The point hit no editable region; the selection was cleared
    NothingThere,
}

#[derive(Debug)]
pub struct EditSession {
    id: SessionId,
    meta: SessionMeta,
    history: HistoryStack,
    selection: Selection,
    instruction: String,
    /// Layer-edit slot shared by picks, granularity switches and edits
    slot: Slot,
    /// Origin recorded for the edit in flight
    pending_edit: Option<SnapshotOrigin>,
}

impl EditSession {
    pub fn new(receipt: UploadReceipt, original: Raster, history_limit: Option<usize>) -> Self {
        Self {
            id: receipt.session_id,
            meta: receipt.meta,
            history: HistoryStack::new(original, history_limit),
            selection: Selection::None,
            instruction: String::new(),
            slot: Slot::new("layer-edit"),
            pending_edit: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Always the top of the history
    pub fn current_image(&self) -> &Raster {
        &self.history.current().image
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.slot.is_pending()
    }

    pub fn pending_kind(&self) -> Option<OpKind> {
        self.slot.pending()
    }

    pub fn natural_size(&self) -> NaturalSize {
        NaturalSize::new(self.meta.width, self.meta.height)
    }

    pub fn set_instruction(&mut self, text: impl Into<String>) {
        self.instruction = text.into();
    }

    /// Map a click in display space to original-image pixels
    pub fn map_click(&self, x: f64, y: f64, display: DisplayBox) -> Result<PixelPoint, ValidationError> {
        map_click(x, y, display, self.natural_size())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    fn check_pick_allowed(&self) -> Result<(), ValidationError> {
        match self.slot.pending() {
            Some(kind) if !kind.is_pick() => Err(ValidationError::Busy),
            _ => Ok(()),
        }
    }

    /// Start a pick; an outstanding pick or switch is superseded
    pub fn begin_pick(&mut self) -> Result<Ticket, EditError> {
        self.check_pick_allowed()?;
        Ok(self.slot.begin(OpKind::Pick))
    }

    /// Start a granularity switch (point-prompt sessions only)
    pub fn begin_switch_granularity(&mut self) -> Result<Ticket, EditError> {
        if !self.meta.segmentation_mode.supports_granularity() {
            return Err(ValidationError::GranularityUnsupported.into());
        }
        self.check_pick_allowed()?;
        Ok(self.slot.begin(OpKind::SwitchGranularity))
    }

    /// Apply a pick or switch result. A failure clears the selection.
    pub fn settle_pick(
        &mut self,
        ticket: Ticket,
        result: CapabilityResult<RegionPick>,
    ) -> Result<PickOutcome, EditError> {
        if !ticket.kind().is_pick() {
            return Err(EditError::StateInvariant("pick settled with a non-pick ticket"));
        }
        self.slot.settle(ticket)?;

        match result {
            Ok(pick) => {
                let coverage_pct = (pick.mask.coverage() * 100.0).round() as u32;
                self.selection = Selection::from(pick);
                Ok(match self.selection.layer() {
                    Some(layer) => PickOutcome::Selected { layer, coverage_pct },
                    None => PickOutcome::NothingThere,
                })
            }
            Err(err) => {
                self.selection = Selection::None;
                Err(err.into())
            }
        }
    }

    /// Drop the selection; a pending operation keeps running
    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Validate and start an edit of the selected layer
    pub fn begin_edit(&mut self) -> Result<(Ticket, EditRequest), EditError> {
        if self.slot.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        let layer = self.selection.layer().ok_or(ValidationError::NoSelection)?;
        let instruction = self.instruction.trim();
        if instruction.is_empty() {
            return Err(ValidationError::EmptyInstruction.into());
        }

        let request = EditRequest {
            session_id: self.id.clone(),
            layer,
            instruction: instruction.to_string(),
        };
        self.pending_edit = Some(SnapshotOrigin::Edit {
            layer,
            instruction: request.instruction.clone(),
        });
        let ticket = self.slot.begin(OpKind::Edit);
        Ok((ticket, request))
    }

    /// Apply an edit result. On failure history and selection are kept so
    /// the user can retry without picking again.
    pub fn settle_edit(&mut self, ticket: Ticket, result: CapabilityResult<EditResult>) -> Result<(), EditError> {
        if ticket.kind() != OpKind::Edit {
            return Err(EditError::StateInvariant("edit settled with a non-edit ticket"));
        }
        self.slot.settle(ticket)?;
        let origin = self.pending_edit.take();

        let result = result?;
        let origin = origin.ok_or(EditError::StateInvariant("edit settled without a pending origin"))?;
        if !result.applied_params.is_null() {
            log::debug!("Edit applied with params {}", result.applied_params);
        }
        if let Some(mask) = &result.updated_mask {
            log::debug!("{} returned a layer mask covering {:.1}%", origin, mask.coverage() * 100.0);
        }
        self.history.push(result.image, origin);
        self.selection = Selection::None;
        self.instruction.clear();
        Ok(())
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Step back one snapshot. Supersedes whatever the layer-edit slot was
    /// running and clears the selection; at the original nothing changes.
    pub fn undo(&mut self) -> UndoOutcome {
        if !self.history.can_undo() {
            return UndoOutcome::AtInitialState;
        }
        if self.slot.cancel().is_some() {
            self.pending_edit = None;
        }
        self.selection = Selection::None;
        self.history.undo()
    }

    /// Push the result of an auxiliary transform as a new snapshot
    pub fn commit_transform(&mut self, image: Raster, origin: SnapshotOrigin) -> Result<usize, EditError> {
        if self.slot.is_pending() {
            return Err(ValidationError::Busy.into());
        }
        self.history.push(image, origin);
        self.selection = Selection::None;
        Ok(self.history.len())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn attach_abort(&mut self, ticket: Ticket, handle: AbortHandle) {
        self.slot.attach(ticket, handle);
    }

    /// Cancel the pending pick/switch/edit, e.g. when leaving the session
    pub fn cancel_pending(&mut self) -> Option<Ticket> {
        let ticket = self.slot.cancel()?;
        self.pending_edit = None;
        Some(ticket)
    }
}
