//! Geometric types for mapping clicks onto image pixels

use crate::error::ValidationError;

/// On-screen box of the rendered image element, in display units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayBox {
    pub width: f64,
    pub height: f64,
}

impl DisplayBox {
    /// Create a new display box
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether the box can be used as a scaling reference
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Check if the box contains a point (half-open on the far edges)
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && x < self.width && y >= 0.0 && y < self.height
    }
}

/// Natural pixel size of the original image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NaturalSize {
    pub width: u32,
    pub height: u32,
}

impl NaturalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Integer pixel coordinate in the original image
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
}

impl PixelPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Translate a click relative to the rendered image's top-left corner into
/// pixel coordinates of the original image.
///
/// Scaling is axis-aligned and may differ per axis. Clicks outside
/// `[0, width) x [0, height)` of the display box are rejected.
pub fn map_click(
    click_x: f64,
    click_y: f64,
    display: DisplayBox,
    natural: NaturalSize,
) -> Result<PixelPoint, ValidationError> {
    if !display.is_drawable() {
        return Err(ValidationError::DegenerateDisplay {
            width: display.width,
            height: display.height,
        });
    }
    if !display.contains_point(click_x, click_y) {
        return Err(ValidationError::OutOfBounds {
            x: click_x,
            y: click_y,
        });
    }

    let scale_x = natural.width as f64 / display.width;
    let scale_y = natural.height as f64 / display.height;
    Ok(PixelPoint {
        x: (click_x * scale_x).round() as u32,
        y: (click_y * scale_y).round() as u32,
    })
}
