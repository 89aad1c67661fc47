//! Message types for the editing shell
//!
//! This module contains:
//! - Msg enum with nested sub-enums for organized message handling
//! - Settlement messages carrying the ticket of the call they answer

use std::path::PathBuf;

use crate::capability::{ColorVariant, CropPreview, EditResult, Generation, SearchHit, UploadReceipt};
use crate::domain::{
    CropMode, DisplayBox, Dpi, Granularity, PaletteEntry, Raster, RegionPick, Rgb, StyleKey,
};
use crate::error::CapabilityResult;
use crate::session::lifecycle::Ticket;

// ============================================================================
// Session Types
// ============================================================================

/// Session lifecycle messages
#[derive(Debug)]
pub enum SessionMsg {
    /// Upload an image file and start a new session
    Upload(PathBuf),
    /// Upload finished; carries the image that was sent
    Uploaded {
        ticket: Ticket,
        result: CapabilityResult<(UploadReceipt, Raster)>,
    },
    /// Print busy state, selection and history size
    Status,
    /// List history snapshots
    History,
    /// Write the current image to disk
    Save(PathBuf),
    /// Leave the session, cancelling pending work
    Exit,
}

// ============================================================================
// Region Editing Types
// ============================================================================

/// Selection and edit messages
#[derive(Debug)]
pub enum EditMsg {
    /// Click at display coordinates within a display box
    Click { x: f64, y: f64, display: DisplayBox },
    /// Re-pick at another granularity
    Granularity(Granularity),
    /// Pick or switch settled
    Picked {
        ticket: Ticket,
        result: CapabilityResult<RegionPick>,
    },
    /// Clear the selection
    Deselect,
    /// Set the instruction text
    Say(String),
    /// Apply the instruction (optionally replacing it first)
    Apply(Option<String>),
    /// Edit settled
    Applied {
        ticket: Ticket,
        result: CapabilityResult<EditResult>,
    },
    /// Undo the last snapshot
    Undo,
}

// ============================================================================
// Generation / Search Types
// ============================================================================

/// Primary slot messages
#[derive(Debug)]
pub enum PrimaryMsg {
    /// Text-to-image
    Generate(String),
    /// Image-to-image from the image being edited
    Restyle(String),
    /// Refine an earlier result (1-based) with a follow-up prompt
    Refine { index: usize, prompt: String },
    Search(String),
    /// Search with the image being edited, optionally narrowed by text
    SearchSimilar(String),
    /// Set or clear one style hint
    Hint { key: StyleKey, value: Option<String> },
    /// Show the style hints in effect
    Hints,
    Generated {
        ticket: Ticket,
        result: CapabilityResult<Generation>,
    },
    Found {
        ticket: Ticket,
        result: CapabilityResult<Vec<SearchHit>>,
    },
    /// List the latest results
    Results,
    /// Open a result (1-based) for editing
    Open(usize),
}

// ============================================================================
// Auxiliary Transform Types
// ============================================================================

/// Color remap workflow messages
#[derive(Debug)]
pub enum RemapMsg {
    /// Start recoloring the current image and extract its palette
    Start,
    /// Re-extract with an explicit palette size
    Extract(Option<u8>),
    Extracted {
        ticket: Ticket,
        result: CapabilityResult<Vec<PaletteEntry>>,
    },
    /// Assign (or clear) a target for a palette entry (1-based)
    Assign { index: usize, target: Option<Rgb> },
    Tolerance(u8),
    Luminance(bool),
    Preview,
    Previewed {
        ticket: Ticket,
        result: CapabilityResult<Raster>,
    },
    /// Generate hue variants with the given number of colors
    Variants(Option<u8>),
    VariantsReady {
        ticket: Ticket,
        result: CapabilityResult<Vec<ColorVariant>>,
    },
    /// Preview a variant (1-based)
    UseVariant(usize),
    Commit,
    Cancel,
}

/// Crop-to-size workflow messages
#[derive(Debug)]
pub enum CropMsg {
    Preview {
        width_cm: f64,
        height_cm: f64,
        dpi: Option<Dpi>,
        mode: Option<CropMode>,
    },
    Previewed {
        ticket: Ticket,
        result: CapabilityResult<CropPreview>,
    },
    Commit,
    Cancel,
}

// ============================================================================
// Main Message Enum
// ============================================================================

/// Messages driving the application
#[derive(Debug)]
pub enum Msg {
    Session(SessionMsg),
    Edit(EditMsg),
    Primary(PrimaryMsg),
    Remap(RemapMsg),
    Crop(CropMsg),
    /// A line that could not be parsed
    Unrecognized(String),
    Help,
    Quit,
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl Msg {
    pub fn upload(path: impl Into<PathBuf>) -> Self {
        Self::Session(SessionMsg::Upload(path.into()))
    }
    pub fn status() -> Self {
        Self::Session(SessionMsg::Status)
    }
    pub fn exit_session() -> Self {
        Self::Session(SessionMsg::Exit)
    }

    pub fn click(x: f64, y: f64, display_width: f64, display_height: f64) -> Self {
        Self::Edit(EditMsg::Click {
            x,
            y,
            display: DisplayBox::new(display_width, display_height),
        })
    }
    pub fn say(text: impl Into<String>) -> Self {
        Self::Edit(EditMsg::Say(text.into()))
    }
    pub fn apply_edit() -> Self {
        Self::Edit(EditMsg::Apply(None))
    }
    pub fn deselect() -> Self {
        Self::Edit(EditMsg::Deselect)
    }
    pub fn undo() -> Self {
        Self::Edit(EditMsg::Undo)
    }

    pub fn generate(prompt: impl Into<String>) -> Self {
        Self::Primary(PrimaryMsg::Generate(prompt.into()))
    }
    pub fn search(text: impl Into<String>) -> Self {
        Self::Primary(PrimaryMsg::Search(text.into()))
    }
    pub fn open(index: usize) -> Self {
        Self::Primary(PrimaryMsg::Open(index))
    }

    pub fn assign_color(index: usize, target: Option<Rgb>) -> Self {
        Self::Remap(RemapMsg::Assign { index, target })
    }
    pub fn preview_colors() -> Self {
        Self::Remap(RemapMsg::Preview)
    }
    pub fn commit_colors() -> Self {
        Self::Remap(RemapMsg::Commit)
    }

    pub fn crop(width_cm: f64, height_cm: f64, dpi: Option<Dpi>, mode: Option<CropMode>) -> Self {
        Self::Crop(CropMsg::Preview {
            width_cm,
            height_cm,
            dpi,
            mode,
        })
    }
    pub fn commit_crop() -> Self {
        Self::Crop(CropMsg::Commit)
    }
}
