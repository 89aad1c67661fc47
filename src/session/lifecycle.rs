//! Request lifecycle slots
//!
//! A slot holds at most one outstanding operation. Starting a new one cancels
//! the previous: its task is aborted and its ticket stops matching, so a late
//! settlement is recognised as superseded and dropped without touching state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::AbortHandle;

use crate::error::EditError;

/// Process-wide ticket counter; tickets never repeat across slots or sessions
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Kind of long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Upload,
    Generate,
    Search,
    Pick,
    SwitchGranularity,
    Edit,
    ExtractPalette,
    ApplyMapping,
    ColorVariants,
    CropPreview,
}

impl OpKind {
    pub fn label(self) -> &'static str {
        match self {
            OpKind::Upload => "upload",
            OpKind::Generate => "generate",
            OpKind::Search => "search",
            OpKind::Pick => "pick",
            OpKind::SwitchGranularity => "granularity switch",
            OpKind::Edit => "edit",
            OpKind::ExtractPalette => "palette extraction",
            OpKind::ApplyMapping => "color mapping preview",
            OpKind::ColorVariants => "color variants",
            OpKind::CropPreview => "crop preview",
        }
    }

    /// Region picks re-target the selection and may replace each other
    pub fn is_pick(self) -> bool {
        matches!(self, OpKind::Pick | OpKind::SwitchGranularity)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one issued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    id: u64,
    kind: OpKind,
}

impl Ticket {
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct Pending {
    ticket: Ticket,
    abort: Option<AbortHandle>,
}

impl Pending {
    fn cancel(self) {
        if let Some(handle) = self.abort {
            handle.abort();
        }
    }
}

/// One single-flight request slot: `Idle` or `Pending(ticket)`
#[derive(Debug)]
pub struct Slot {
    label: &'static str,
    pending: Option<Pending>,
}

impl Slot {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            pending: None,
        }
    }

    /// Issue a new ticket, cancelling whatever was outstanding
    pub fn begin(&mut self, kind: OpKind) -> Ticket {
        if let Some(previous) = self.pending.take() {
            log::debug!(
                "[{}] {} #{} superseded by {}",
                self.label,
                previous.ticket.kind,
                previous.ticket.id,
                kind
            );
            previous.cancel();
        }
        let ticket = Ticket {
            id: NEXT_TICKET.fetch_add(1, Ordering::Relaxed),
            kind,
        };
        self.pending = Some(Pending {
            ticket,
            abort: None,
        });
        ticket
    }

    /// Attach the abort handle of the task running the current ticket
    pub fn attach(&mut self, ticket: Ticket, handle: AbortHandle) {
        match self.pending.as_mut() {
            Some(pending) if pending.ticket == ticket => pending.abort = Some(handle),
            // the ticket was already superseded; stop its task right away
            _ => handle.abort(),
        }
    }

    /// Accept a settlement if its ticket is still current, returning the slot
    /// to idle. Stale tickets yield `EditError::Superseded` and change nothing.
    pub fn settle(&mut self, ticket: Ticket) -> Result<(), EditError> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                Ok(())
            }
            _ => {
                log::debug!("[{}] dropping stale {} #{}", self.label, ticket.kind, ticket.id);
                Err(EditError::Superseded)
            }
        }
    }

    /// Cancel the outstanding operation, if any
    pub fn cancel(&mut self) -> Option<Ticket> {
        let pending = self.pending.take()?;
        let ticket = pending.ticket;
        log::debug!("[{}] cancelled {} #{}", self.label, ticket.kind, ticket.id);
        pending.cancel();
        Some(ticket)
    }

    pub fn pending(&self) -> Option<OpKind> {
        self.pending.as_ref().map(|p| p.ticket.kind)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}
