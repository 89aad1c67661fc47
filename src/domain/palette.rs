//! Palette and color mapping types for recoloring

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 8-bit RGB color, serialized as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#rrggbb`, `rrggbb` or `#rgb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("'{s}' is not a hex color"));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("'{s}' is not a hex color")),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| format!("'{s}' is not a hex color"))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// One dominant color of an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub rgb: Rgb,
    pub hex: String,
    /// Fraction of pixels covered by this color
    pub ratio: f64,
}

/// Source/target color pairs sent to the mapping capability
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteMapping {
    pub source_colors: Vec<Rgb>,
    pub target_colors: Vec<Rgb>,
    pub tolerance: u8,
    pub preserve_luminance: bool,
}

impl PaletteMapping {
    /// Pair each palette entry with its assigned target, skipping unassigned ones
    pub fn from_assignments(
        palette: &[PaletteEntry],
        targets: &[Option<Rgb>],
        tolerance: u8,
        preserve_luminance: bool,
    ) -> Self {
        let (source_colors, target_colors) = palette
            .iter()
            .zip(targets)
            .filter_map(|(entry, target)| target.map(|t| (entry.rgb, t)))
            .unzip();
        Self {
            source_colors,
            target_colors,
            tolerance,
            preserve_luminance,
        }
    }

    pub fn pairs(&self) -> usize {
        self.source_colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_colors.is_empty()
    }
}
