//! Selection types for region picking

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::raster::Mask;

/// Named region of a layered design that an edit can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    /// Inner field of the design
    Field,
    /// Decorative border around the field
    Border,
    /// Whole foreground (field and border)
    Rug,
    /// Free-form region produced by point-prompt segmentation
    SelectedRegion,
}

impl LayerName {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerName::Field => "field",
            LayerName::Border => "border",
            LayerName::Rug => "rug",
            LayerName::SelectedRegion => "selected_region",
        }
    }

    /// Parse the layer label returned by a pick; `"none"` means no region
    pub fn from_pick_label(label: &str) -> Result<Option<Self>, String> {
        match label {
            "none" | "background" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "field" => Ok(LayerName::Field),
            "border" => Ok(LayerName::Border),
            "rug" => Ok(LayerName::Rug),
            "selected_region" => Ok(LayerName::SelectedRegion),
            other => Err(format!("unknown layer '{other}'")),
        }
    }
}

/// Coarseness of a point-prompt candidate mask
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    #[default]
    Fine,
    Medium,
    Coarse,
}

impl From<u8> for Granularity {
    fn from(level: u8) -> Self {
        match level {
            0 => Granularity::Fine,
            1 => Granularity::Medium,
            _ => Granularity::Coarse,
        }
    }
}

impl From<Granularity> for u8 {
    fn from(level: Granularity) -> Self {
        match level {
            Granularity::Fine => 0,
            Granularity::Medium => 1,
            Granularity::Coarse => 2,
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fine" | "0" => Ok(Granularity::Fine),
            "medium" | "1" => Ok(Granularity::Medium),
            "coarse" | "2" => Ok(Granularity::Coarse),
            other => Err(format!("unknown granularity '{other}' (fine, medium, coarse)")),
        }
    }
}

/// How the service segmented the uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Point-prompt segmentation; picks can be re-issued at other granularities
    #[serde(rename = "sam")]
    PointPrompt,
    Flat,
    Rule,
    #[serde(rename = "grabcut")]
    GrabCut,
    #[default]
    Legacy,
    #[serde(other)]
    Unknown,
}

impl SegmentationMode {
    pub fn supports_granularity(self) -> bool {
        matches!(self, SegmentationMode::PointPrompt)
    }
}

/// Result of one pick call
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPick {
    /// `None` when the click landed on no editable region
    pub layer: Option<LayerName>,
    pub mask: Mask,
}

/// Currently active region selection
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    None,
    Picked { layer: LayerName, mask: Mask },
}

impl Selection {
    pub fn layer(&self) -> Option<LayerName> {
        match self {
            Selection::Picked { layer, .. } => Some(*layer),
            Selection::None => None,
        }
    }

    pub fn mask(&self) -> Option<&Mask> {
        match self {
            Selection::Picked { mask, .. } => Some(mask),
            Selection::None => None,
        }
    }
}

impl From<RegionPick> for Selection {
    fn from(pick: RegionPick) -> Self {
        match pick.layer {
            Some(layer) => Selection::Picked {
                layer,
                mask: pick.mask,
            },
            None => Selection::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_pick_labels() {
        assert_eq!(LayerName::from_pick_label("none"), Ok(None));
        assert_eq!(LayerName::from_pick_label("border"), Ok(Some(LayerName::Border)));
        assert_eq!(
            LayerName::from_pick_label("selected_region"),
            Ok(Some(LayerName::SelectedRegion))
        );
        assert!(LayerName::from_pick_label("sky").is_err());
    }

    #[test]
    fn test_segmentation_mode_wire_names() {
        let mode: SegmentationMode = serde_json::from_str("\"sam\"").unwrap();
        assert!(mode.supports_granularity());
        let mode: SegmentationMode = serde_json::from_str("\"grabcut\"").unwrap();
        assert_eq!(mode, SegmentationMode::GrabCut);
        let mode: SegmentationMode = serde_json::from_str("\"watershed\"").unwrap();
        assert_eq!(mode, SegmentationMode::Unknown);
        assert!(!mode.supports_granularity());
    }

    #[test]
    fn test_none_pick_becomes_empty_selection() {
        let pick = RegionPick {
            layer: None,
            mask: Mask::new(GrayImage::new(2, 2)),
        };
        assert_eq!(Selection::from(pick), Selection::None);
    }

    #[test]
    fn test_granularity_levels() {
        assert_eq!(u8::from(Granularity::Coarse), 2);
        assert_eq!(Granularity::from(1), Granularity::Medium);
        assert_eq!("fine".parse::<Granularity>(), Ok(Granularity::Fine));
    }
}
