//! Error kinds for the editing core
//!
//! Validation errors are raised before any capability call and never touch
//! session state. Capability errors come back from the remote service.
//! `Superseded` marks a settlement whose ticket is no longer current; it is
//! swallowed by the application and never shown to the user.

use thiserror::Error;

/// Errors produced by the editing core
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("operation superseded by a newer request")]
    Superseded,
    #[error("state invariant violated: {0}")]
    StateInvariant(&'static str),
}

impl EditError {
    #[cfg(test)]
    pub fn is_superseded(&self) -> bool {
        matches!(self, EditError::Superseded)
    }
}

/// Local precondition failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no image is being edited; upload one first")]
    NoSession,
    #[error("an operation is still running for this session")]
    Busy,
    #[error("select a region first")]
    NoSelection,
    #[error("the edit instruction is empty")]
    EmptyInstruction,
    #[error("the prompt is empty")]
    EmptyPrompt,
    #[error("click ({x}, {y}) is outside the displayed image")]
    OutOfBounds { x: f64, y: f64 },
    #[error("display box {width}x{height} is not a drawable size")]
    DegenerateDisplay { width: f64, height: f64 },
    #[error("granularity switching needs point-prompt segmentation")]
    GranularityUnsupported,
    #[error("preserve_border needs a border mask; pick the border first")]
    MissingBorderMask,
    #[error("assign at least one target color before previewing")]
    NoPairedColors,
    #[error("extract a palette first")]
    NoPalette,
    #[error("palette entry {index} does not exist (palette has {len})")]
    PaletteIndex { index: usize, len: usize },
    #[error("nothing to commit; request a preview first")]
    NoPreview,
    #[error("the image changed since this preview was made")]
    StaleSource,
    #[error("physical size {width_cm}x{height_cm} cm is not printable")]
    InvalidSize { width_cm: f64, height_cm: f64 },
    #[error("{0} dpi is not supported (use 72, 150 or 300)")]
    UnsupportedDpi(u32),
    #[error("tolerance {0} is outside 10..=100")]
    Tolerance(u8),
    #[error("palette size {0} is outside 2..=10")]
    PaletteSize(u8),
    #[error("variant color count {0} is outside 2..=5")]
    VariantColors(u8),
    #[error("no color variant #{0}; run 'variants' first")]
    NoVariant(usize),
    #[error("unknown crop mode '{0}'")]
    CropMode(String),
    #[error("no result #{0} to open")]
    NoResult(usize),
    #[error("no color remap in progress; run 'colors' first")]
    NoRemap,
    #[error("no crop in progress")]
    NoCrop,
}

/// Failures reported by (or while talking to) the remote capability
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("unreadable response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CapabilityError::Decode(err.to_string())
        } else {
            CapabilityError::Transport(err.to_string())
        }
    }
}

impl From<crate::domain::CodecError> for CapabilityError {
    fn from(err: crate::domain::CodecError) -> Self {
        CapabilityError::Decode(err.to_string())
    }
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;
