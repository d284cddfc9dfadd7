//! Highlight animation variants and per-frame evaluation.
//!
//! An animation is a pure function from normalized time `t` in `[0, 1]` to a
//! `(width, opacity)` pair. The compositor clamps the returned width to at
//! least one pixel before drawing, so `t = 0` still produces a visible
//! column.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of full opacity oscillations a glow/pulse clip runs through.
const PULSE_COUNT: f64 = 4.0;

/// Animation variant enumeration.
///
/// Wire labels are the editor-facing names; [`Animation::code`] yields the
/// short internal codes used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Animation {
    LeftToRight,
    DownUp,
    Rise,
    Glow,
    Underline,
}

/// Evaluated overlay parameters for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// Rectangle width for this frame, in image-space pixels. May be zero;
    /// callers clamp to >= 1 before drawing.
    pub width: f64,
    /// Overlay opacity for this frame, in `[0, 1]` for base opacity in range.
    pub opacity: f64,
}

impl Animation {
    /// Parse an editor-facing label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "left-to-right" => Some(Animation::LeftToRight),
            "down-up" => Some(Animation::DownUp),
            "rise" => Some(Animation::Rise),
            "glow" => Some(Animation::Glow),
            "underline" => Some(Animation::Underline),
            _ => None,
        }
    }

    /// The editor-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Animation::LeftToRight => "left-to-right",
            Animation::DownUp => "down-up",
            Animation::Rise => "rise",
            Animation::Glow => "glow",
            Animation::Underline => "underline",
        }
    }

    /// Short internal code (used in logs).
    pub fn code(self) -> &'static str {
        match self {
            Animation::LeftToRight => "ltr",
            Animation::DownUp => "du",
            Animation::Rise => "rise",
            Animation::Glow => "pulse",
            Animation::Underline => "underline",
        }
    }

    /// Evaluate the overlay parameters at normalized time `t`.
    ///
    /// `DownUp`, `Rise` and `Underline` currently hold both width and
    /// opacity constant; they are selectable labels whose motion curves
    /// are not implemented yet.
    pub fn evaluate(self, t: f64, base_width: f64, base_opacity: f64) -> FrameParams {
        match self {
            Animation::LeftToRight => FrameParams {
                width: base_width * t,
                opacity: base_opacity,
            },
            Animation::Glow => {
                // Swings opacity between 0.4x and 1.0x of base.
                let pulse = (t * std::f64::consts::PI * 2.0 * PULSE_COUNT).sin() * 0.3 + 0.7;
                FrameParams {
                    width: base_width,
                    opacity: base_opacity * pulse,
                }
            }
            Animation::DownUp | Animation::Rise | Animation::Underline => FrameParams {
                width: base_width,
                opacity: base_opacity,
            },
        }
    }
}

impl std::fmt::Display for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Normalized time for frame `index` of `total` frames.
///
/// Sweeps 0 -> 1 inclusive across the sequence; a single-frame render
/// collapses to 1 so the overlay is fully drawn.
pub fn frame_time(index: u32, total: u32) -> f64 {
    if total <= 1 {
        1.0
    } else {
        f64::from(index) / f64::from(total - 1)
    }
}
