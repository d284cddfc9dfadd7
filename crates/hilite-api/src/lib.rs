//! Axum HTTP API server for highlight video export.
//!
//! This crate provides:
//! - Multipart render endpoint streaming fast-start MP4
//! - Plan-based entitlement checks and daily export quota
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use ledger::{ExportLedger, MemoryLedger};
pub use routes::create_router;
pub use state::AppState;
