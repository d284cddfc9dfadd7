use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The user-drawn highlight box, in image-space pixel coordinates.
///
/// Width and height are not required to be positive; the compositor floors
/// the drawn width to at least one pixel, and negative sizes simply clamp
/// to an empty region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightRect {
    /// X coordinate of the top-left corner.
    pub x: f64,
    /// Y coordinate of the top-left corner.
    pub y: f64,
    /// Width of the rectangle.
    pub w: f64,
    /// Height of the rectangle.
    pub h: f64,
}

impl HighlightRect {
    /// Create a new highlight rectangle.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Check that every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_rect() {
        assert!(HighlightRect::new(10.0, 10.0, 50.0, 20.0).is_finite());
        assert!(HighlightRect::new(-5.0, 0.0, -1.0, 0.0).is_finite());
    }

    #[test]
    fn test_non_finite_rect() {
        assert!(!HighlightRect::new(f64::NAN, 0.0, 1.0, 1.0).is_finite());
        assert!(!HighlightRect::new(0.0, f64::INFINITY, 1.0, 1.0).is_finite());
        assert!(!HighlightRect::new(0.0, 0.0, f64::NEG_INFINITY, 1.0).is_finite());
    }
}
