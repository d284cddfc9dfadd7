//! Quota admission decision types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::PlanTier;

/// Result of an export-quota admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuotaCheck {
    /// Whether the export may proceed.
    pub allowed: bool,
    /// The tier's daily limit; `None` on unlimited plans.
    pub limit: Option<u32>,
    /// Exports already completed today; `None` on unlimited plans.
    pub used: Option<u32>,
}

impl QuotaCheck {
    /// Decision for an unlimited plan: always admitted, nothing reported.
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: None,
            used: None,
        }
    }

    /// Decision for a finite-limit plan with `used` exports so far today.
    pub fn limited(limit: u32, used: u32) -> Self {
        Self {
            allowed: used < limit,
            limit: Some(limit),
            used: Some(used),
        }
    }

    /// Whether a successful export on `tier` should append a ledger record.
    ///
    /// Records exist solely for quota accounting, so unlimited plans are
    /// not logged.
    pub fn should_record(tier: PlanTier) -> bool {
        tier.capabilities().export_limit_per_day.is_some()
    }
}
