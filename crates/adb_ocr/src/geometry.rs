//! Screen-space geometry and OCR results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in screen pixels
///
/// `width` and `height` are expected to be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from a polygon's top-left and bottom-right corners
    pub fn from_corners(top_left: (i32, i32), bottom_right: (i32, i32)) -> Self {
        Self {
            x: top_left.0,
            y: top_left.1,
            width: bottom_right.0 - top_left.0,
            height: bottom_right.1 - top_left.1,
        }
    }

    /// Center point, floor division
    pub fn get_middle_coordinate(&self) -> (i32, i32) {
        (
            self.x + self.width.div_euclid(2),
            self.y + self.height.div_euclid(2),
        )
    }

    /// Translate the box by `(dx, dy)`
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// A piece of recognized text and where it sits on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    pub bounding_box: BoundingBox,
    pub text: String,
}

impl OcrResult {
    pub fn new(bounding_box: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            bounding_box,
            text: text.into(),
        }
    }
}

/// Physical screen resolution as reported by `wm size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
