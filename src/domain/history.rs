//! Linear undo history of full image snapshots
//!
//! The first snapshot is the uploaded original and is never removed.

use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Local};

use super::crop::CropMode;
use super::raster::Raster;
use super::selection::LayerName;

/// What produced a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOrigin {
    Upload,
    Edit { layer: LayerName, instruction: String },
    ColorRemap { pairs: usize },
    /// 1-based number of the chosen hue variant
    ColorVariant { number: usize },
    Crop { width_px: u32, height_px: u32, mode: CropMode },
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotOrigin::Upload => write!(f, "upload"),
            SnapshotOrigin::Edit { layer, instruction } => {
                write!(f, "edit {layer}: \"{instruction}\"")
            }
            SnapshotOrigin::ColorRemap { pairs } => write!(f, "color remap ({pairs} colors)"),
            SnapshotOrigin::ColorVariant { number } => write!(f, "color variant #{number}"),
            SnapshotOrigin::Crop {
                width_px,
                height_px,
                mode,
            } => write!(f, "crop {width_px}x{height_px} ({mode})"),
        }
    }
}

/// One entry of the history
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: Raster,
    pub origin: SnapshotOrigin,
    pub recorded_at: DateTime<Local>,
}

impl Snapshot {
    pub fn new(image: Raster, origin: SnapshotOrigin) -> Self {
        Self {
            image,
            origin,
            recorded_at: Local::now(),
        }
    }
}

/// Result of an undo request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The last snapshot was dropped; `remaining` entries are left
    Restored { remaining: usize },
    /// Only the original is left; nothing changed
    AtInitialState,
}

/// Ordered snapshots, oldest first
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<Snapshot>,
    limit: Option<NonZeroUsize>,
}

impl HistoryStack {
    /// Start a history from the original image. `limit` bounds the number of
    /// retained snapshots (at least two are always kept).
    pub fn new(original: Raster, limit: Option<usize>) -> Self {
        Self {
            entries: vec![Snapshot::new(original, SnapshotOrigin::Upload)],
            limit: limit.and_then(|n| NonZeroUsize::new(n.max(2))),
        }
    }

    /// Append a snapshot; it becomes the current image. Returns how many old
    /// snapshots were evicted to honour the limit.
    pub fn push(&mut self, image: Raster, origin: SnapshotOrigin) -> usize {
        self.entries.push(Snapshot::new(image, origin));

        let mut evicted = 0;
        if let Some(limit) = self.limit {
            while self.entries.len() > limit.get() {
                // index 0 is the original upload
                self.entries.remove(1);
                evicted += 1;
            }
        }
        if evicted > 0 {
            log::debug!("History limit reached, evicted {} snapshot(s)", evicted);
        }
        evicted
    }

    /// Drop the latest snapshot unless only the original remains
    pub fn undo(&mut self) -> UndoOutcome {
        if self.entries.len() <= 1 {
            return UndoOutcome::AtInitialState;
        }
        self.entries.pop();
        UndoOutcome::Restored {
            remaining: self.entries.len(),
        }
    }

    pub fn current(&self) -> &Snapshot {
        // invariant: entries is never empty
        &self.entries[self.entries.len() - 1]
    }

    #[cfg(test)]
    pub fn original(&self) -> &Snapshot {
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn can_undo(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}
