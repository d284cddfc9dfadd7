//! Plan tiers and their capability records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::animation::Animation;

/// Every highlight color the product offers, across all tiers.
pub const ALL_COLORS: &[&str] = &[
    "#ffff00", "#ff0000", "#00ffff", "#00ff00", "#0000ff", "#ff00ff",
];

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Pro,
}

/// Fixed-shape capability record for one plan tier.
///
/// Resolved once via [`PlanTier::capabilities`]; never mutated after that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct PlanCapabilities {
    /// Display name used in user-facing error messages.
    pub name: &'static str,
    /// Highlight colors this tier may use.
    pub colors: &'static [&'static str],
    /// Animations this tier may use.
    pub animations: &'static [Animation],
    /// Cap on the larger output dimension, in pixels.
    pub max_resolution: u32,
    /// Whether exports carry the branding watermark.
    pub watermark: bool,
    /// Daily export quota; `None` means unlimited.
    pub export_limit_per_day: Option<u32>,
}

const FREE_CAPS: PlanCapabilities = PlanCapabilities {
    name: "Free",
    colors: &["#ffff00"],
    animations: &[Animation::LeftToRight],
    max_resolution: 720,
    watermark: true,
    export_limit_per_day: Some(2),
};

const BASIC_CAPS: PlanCapabilities = PlanCapabilities {
    name: "Basic",
    colors: &["#ffff00", "#ff0000"],
    animations: &[
        Animation::LeftToRight,
        Animation::DownUp,
        Animation::Rise,
        Animation::Glow,
    ],
    max_resolution: 1080,
    watermark: false,
    export_limit_per_day: None,
};

const PRO_CAPS: PlanCapabilities = PlanCapabilities {
    name: "Pro",
    colors: ALL_COLORS,
    animations: &[
        Animation::LeftToRight,
        Animation::DownUp,
        Animation::Rise,
        Animation::Glow,
        Animation::Underline,
    ],
    max_resolution: 1080,
    watermark: false,
    export_limit_per_day: None,
};

impl PlanTier {
    /// Parse from string (case-insensitive).
    ///
    /// Fail-open: any unrecognized identifier resolves to the most
    /// restrictive tier rather than an error. Billing-era aliases
    /// (`basic30`, `pro99`) are still accepted.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "basic" | "basic30" => PlanTier::Basic,
            "pro" | "pro99" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    /// Get the static capability record for this tier.
    pub fn capabilities(self) -> &'static PlanCapabilities {
        match self {
            PlanTier::Free => &FREE_CAPS,
            PlanTier::Basic => &BASIC_CAPS,
            PlanTier::Pro => &PRO_CAPS,
        }
    }

    /// Check whether a (canonical lowercase hex) color is entitled.
    pub fn allows_color(self, color: &str) -> bool {
        self.capabilities().colors.contains(&color)
    }

    /// Check whether an animation is entitled.
    pub fn allows_animation(self, animation: Animation) -> bool {
        self.capabilities().animations.contains(&animation)
    }

    /// Cap on the larger output dimension, in pixels.
    pub fn max_resolution(self) -> u32 {
        self.capabilities().max_resolution
    }

    /// Get the plan name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan feature summary for API responses.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PlanFeatures {
    pub plan: String,
    pub name: &'static str,
    pub colors: Vec<&'static str>,
    pub animations: Vec<&'static str>,
    pub export_quality: String,
    pub watermark: bool,
    pub export_limit: Option<u32>,
}

impl PlanFeatures {
    /// Build the feature summary for a tier.
    pub fn for_tier(tier: PlanTier) -> Self {
        let caps = tier.capabilities();
        Self {
            plan: tier.as_str().to_string(),
            name: caps.name,
            colors: caps.colors.to_vec(),
            animations: caps.animations.iter().map(|a| a.label()).collect(),
            export_quality: format!("{}p", caps.max_resolution),
            watermark: caps.watermark,
            export_limit: caps.export_limit_per_day,
        }
    }
}
