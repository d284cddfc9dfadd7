//! Prometheus metrics.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the scrape handle.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder")
}

/// Record the terminal outcome of a render pipeline.
///
/// Outcomes: `success`, `failed`, `aborted` (client disconnect).
pub fn record_render_outcome(outcome: &'static str) {
    metrics::counter!("hilite_renders_total", "outcome" => outcome).increment(1);
}

/// Record a render rejected before any frame work.
///
/// Reasons: `missing_image`, `validation`, `quota`.
pub fn record_render_rejected(reason: &'static str) {
    metrics::counter!("hilite_render_rejections_total", "reason" => reason).increment(1);
}
