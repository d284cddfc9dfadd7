//! Shared data models for the Hilite export backend.
//!
//! This crate provides Serde-serializable types for:
//! - Plan tiers and their capability records
//! - Highlight rectangle and color handling
//! - Animation variants and per-frame evaluation
//! - The render specification and quota decision types

pub mod animation;
pub mod color;
pub mod plan;
pub mod quota;
pub mod rect;
pub mod render;

// Re-export common types
pub use animation::{frame_time, Animation, FrameParams};
pub use color::{canonical_hex, parse_hex};
pub use plan::{PlanCapabilities, PlanFeatures, PlanTier, ALL_COLORS};
pub use quota::QuotaCheck;
pub use rect::HighlightRect;
pub use render::{normalize_opacity, RenderSpec, DEFAULT_DURATION_SEC, DEFAULT_FPS};
