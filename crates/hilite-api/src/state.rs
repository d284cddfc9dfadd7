//! Application state.

use std::sync::Arc;

use hilite_media::WatermarkCache;

use crate::config::ApiConfig;
use crate::ledger::{ExportLedger, MemoryLedger};

/// Shared application state.
///
/// The only cross-request mutable state lives behind the ledger (append-only
/// writes) and the watermark cache (write-once, read-mostly); renders
/// otherwise proceed fully in parallel.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub ledger: Arc<dyn ExportLedger>,
    pub watermark: Arc<WatermarkCache>,
}

impl AppState {
    /// Create application state with the in-memory export ledger.
    pub fn new(config: ApiConfig) -> Self {
        let watermark = Arc::new(WatermarkCache::new(&config.watermark_path));
        Self {
            config,
            ledger: Arc::new(MemoryLedger::default()),
            watermark,
        }
    }

    /// Create state with a custom ledger backend.
    pub fn with_ledger(config: ApiConfig, ledger: Arc<dyn ExportLedger>) -> Self {
        let watermark = Arc::new(WatermarkCache::new(&config.watermark_path));
        Self {
            config,
            ledger,
            watermark,
        }
    }
}
