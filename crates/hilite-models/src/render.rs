//! The validated render specification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::rect::HighlightRect;

/// Default clip duration (seconds) when the field is absent or unparsable.
pub const DEFAULT_DURATION_SEC: f64 = 2.0;
/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// A fully validated render request, ready for the frame loop.
///
/// Built by the orchestrator after plan policy and quota checks pass;
/// everything in here is already normalized (opacity in `[0, 1]`, color in
/// canonical lowercase hex, finite rectangle).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderSpec {
    /// The highlight rectangle, in source-image pixel coordinates.
    pub rect: HighlightRect,
    /// Canonical lowercase `#rrggbb` fill color.
    pub color: String,
    /// Base overlay opacity, normalized to `[0, 1]`.
    pub opacity: f64,
    /// Clip duration in seconds.
    pub duration_sec: f64,
    /// Output frame rate.
    pub fps: u32,
    /// Animation variant.
    pub animation: Animation,
}

impl RenderSpec {
    /// Total frames for this clip: `max(1, round(duration * fps))`.
    pub fn total_frames(&self) -> u32 {
        let frames = (self.duration_sec * f64::from(self.fps)).round();
        (frames as u32).max(1)
    }
}

/// Normalize a raw opacity value to `[0, 1]`.
///
/// The editor sends either a 0-1 fraction or a 0-100 percentage; values
/// above 1 are treated as percentages.
pub fn normalize_opacity(raw: f64) -> f64 {
    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    fraction.clamp(0.0, 1.0)
}
