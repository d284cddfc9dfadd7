//! The export quota ledger.
//!
//! One record per successful export; the only query is "how many exports
//! has this user completed today", using server-local calendar days. The
//! check and the commit are deliberately separate calls: admission happens
//! before any rendering work, the commit only after output reached the
//! client. Two in-flight renders by one user can both pass the check — the
//! quota is a soft limit, not an atomic reservation.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::sync::RwLock;
use tracing::debug;

use hilite_models::{PlanTier, QuotaCheck};

use crate::error::{ApiError, ApiResult};

/// One successful export.
#[derive(Debug, Clone)]
pub struct ExportRecord {
    pub user_id: String,
    pub exported_at: DateTime<Local>,
}

/// Persistence seam for export accounting.
///
/// Backed in production by whatever store the deployment uses; this crate
/// ships an in-memory implementation.
#[async_trait]
pub trait ExportLedger: Send + Sync {
    /// Count this user's exports within the current local calendar day
    /// (midnight to end of day, both bounds inclusive).
    async fn count_exports_today(&self, user_id: &str) -> anyhow::Result<u32>;

    /// Append one export record stamped now. Called only after a render
    /// has successfully delivered output; never on failure, never
    /// speculatively.
    async fn record_export(&self, user_id: &str) -> anyhow::Result<()>;
}

/// Check quota admission for a user before rendering starts.
pub async fn check_quota(
    ledger: &dyn ExportLedger,
    user_id: &str,
    tier: PlanTier,
) -> ApiResult<QuotaCheck> {
    let Some(limit) = tier.capabilities().export_limit_per_day else {
        return Ok(QuotaCheck::unlimited());
    };

    let used = ledger
        .count_exports_today(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Export ledger unavailable: {e}")))?;

    debug!(user_id, limit, used, "Quota check");
    Ok(QuotaCheck::limited(limit, used))
}

/// In-memory export ledger.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<ExportRecord>>,
}

impl MemoryLedger {
    /// Append a record with an explicit timestamp (test support).
    pub async fn record_at(&self, user_id: &str, exported_at: DateTime<Local>) {
        self.records.write().await.push(ExportRecord {
            user_id: user_id.to_string(),
            exported_at,
        });
    }

    /// Total records across all users and days.
    pub async fn total_records(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ExportLedger for MemoryLedger {
    async fn count_exports_today(&self, user_id: &str) -> anyhow::Result<u32> {
        let today = Local::now().date_naive();
        let records = self.records.read().await;
        let count = records
            .iter()
            .filter(|r| r.user_id == user_id && r.exported_at.date_naive() == today)
            .count();
        Ok(count as u32)
    }

    async fn record_export(&self, user_id: &str) -> anyhow::Result<()> {
        self.record_at(user_id, Local::now()).await;
        Ok(())
    }
}
