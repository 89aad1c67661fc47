//! Physical-size crop parameters
//!
//! Sizes are given in centimeters and converted to pixels at a fixed set of
//! print resolutions (2.54 cm per inch).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::raster::Mask;
use crate::error::ValidationError;

pub const CM_PER_INCH: f64 = 2.54;

/// How the source is fitted to the target size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Scale to cover the target, then center-crop
    #[default]
    Fill,
    /// Scale to fit inside the target, padding the rest
    Fit,
    /// Keep the border intact and stretch/crop the field only
    PreserveBorder,
}

impl CropMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CropMode::Fill => "fill",
            CropMode::Fit => "fit",
            CropMode::PreserveBorder => "preserve_border",
        }
    }

    pub fn needs_border_mask(self) -> bool {
        matches!(self, CropMode::PreserveBorder)
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fill" => Ok(CropMode::Fill),
            "fit" => Ok(CropMode::Fit),
            "preserve_border" | "preserve-border" => Ok(CropMode::PreserveBorder),
            other => Err(ValidationError::CropMode(other.to_string())),
        }
    }
}

/// Supported output resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Dpi {
    Screen,
    #[default]
    Standard,
    High,
}

impl Dpi {
    pub const ALL: [Dpi; 3] = [Dpi::Screen, Dpi::Standard, Dpi::High];

    pub fn value(self) -> u32 {
        match self {
            Dpi::Screen => 72,
            Dpi::Standard => 150,
            Dpi::High => 300,
        }
    }
}

impl TryFrom<u32> for Dpi {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Dpi::ALL
            .into_iter()
            .find(|d| d.value() == value)
            .ok_or(ValidationError::UnsupportedDpi(value))
    }
}

impl From<Dpi> for u32 {
    fn from(dpi: Dpi) -> Self {
        dpi.value()
    }
}

impl fmt::Display for Dpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dpi", self.value())
    }
}

/// Largest output side in pixels; also the JPEG dimension limit
pub const MAX_SIDE_PX: u32 = 65_535;

/// Convert a physical length to pixels at the given resolution
pub fn cm_to_px(cm: f64, dpi: Dpi) -> u32 {
    (cm * dpi.value() as f64 / CM_PER_INCH).round() as u32
}

/// Requested production size
#[derive(Debug, Clone, PartialEq)]
pub struct CropSpec {
    pub width_cm: f64,
    pub height_cm: f64,
    pub dpi: Dpi,
    pub mode: CropMode,
    pub border_mask: Option<Mask>,
}

impl CropSpec {
    /// Target size in pixels
    pub fn target_pixels(&self) -> (u32, u32) {
        (cm_to_px(self.width_cm, self.dpi), cm_to_px(self.height_cm, self.dpi))
    }

    /// Check everything that can be checked without the service
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = ValidationError::InvalidSize {
            width_cm: self.width_cm,
            height_cm: self.height_cm,
        };
        if !(self.width_cm.is_finite() && self.height_cm.is_finite())
            || self.width_cm <= 0.0
            || self.height_cm <= 0.0
        {
            return Err(invalid);
        }
        let (w, h) = self.target_pixels();
        // huge lengths saturate in `cm_to_px` and land above the cap too
        if w == 0 || h == 0 || w > MAX_SIDE_PX || h > MAX_SIDE_PX {
            return Err(invalid);
        }
        if self.mode.needs_border_mask() && self.border_mask.is_none() {
            return Err(ValidationError::MissingBorderMask);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn spec(width_cm: f64, height_cm: f64, dpi: Dpi, mode: CropMode) -> CropSpec {
        CropSpec {
            width_cm,
            height_cm,
            dpi,
            mode,
            border_mask: None,
        }
    }

    #[test]
    fn test_production_size_in_pixels() {
        let s = spec(160.0, 230.0, Dpi::Standard, CropMode::Fill);
        assert_eq!(s.target_pixels(), (9449, 13583));
        assert_eq!(cm_to_px(2.54, Dpi::High), 300);
        assert_eq!(cm_to_px(10.0, Dpi::Screen), 283);
    }

    #[test]
    fn test_preserve_border_requires_mask() {
        let mut s = spec(100.0, 100.0, Dpi::Standard, CropMode::PreserveBorder);
        assert_eq!(s.validate(), Err(ValidationError::MissingBorderMask));
        s.border_mask = Some(Mask::new(GrayImage::new(4, 4)));
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn test_non_positive_sizes_rejected() {
        for (w, h) in [(0.0, 10.0), (10.0, -1.0), (f64::NAN, 10.0), (0.001, 10.0)] {
            assert!(matches!(
                spec(w, h, Dpi::Standard, CropMode::Fit).validate(),
                Err(ValidationError::InvalidSize { .. })
            ));
        }
    }

    #[test]
    fn test_oversized_output_rejected() {
        assert!(spec(554.0, 554.0, Dpi::High, CropMode::Fit).validate().is_ok());
        for (w, h) in [(555.0, 10.0), (10.0, 1e12), (f64::MAX, f64::MAX)] {
            assert_eq!(
                spec(w, h, Dpi::High, CropMode::Fit).validate(),
                Err(ValidationError::InvalidSize {
                    width_cm: w,
                    height_cm: h
                })
            );
        }
        // the same length fits at a lower resolution
        assert!(spec(555.0, 10.0, Dpi::Standard, CropMode::Fill).validate().is_ok());
    }

    #[test]
    fn test_dpi_and_mode_parsing() {
        assert_eq!(Dpi::try_from(300), Ok(Dpi::High));
        assert_eq!(Dpi::try_from(96), Err(ValidationError::UnsupportedDpi(96)));
        assert_eq!("preserve_border".parse::<CropMode>(), Ok(CropMode::PreserveBorder));
        assert!("stretch".parse::<CropMode>().is_err());
    }
}
