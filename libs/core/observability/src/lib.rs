//! Observability utilities for the aggregation pipeline.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Per-stage counters, histograms, and gauges (`StageMetrics`)
//! - An optional axum handler for scraping `/metrics`
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, StageMetrics};
//!
//! init_metrics();
//!
//! let _timer = StageMetrics::start("c5_pod_aggregate");
//! StageMetrics::record_rows_in("c5_pod_aggregate", 12_000);
//! StageMetrics::record_rows_out("c5_pod_aggregate", 340);
//! ```

pub mod stages;

pub use stages::{StageMetrics, StageTimer};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for an optional `/metrics` scrape endpoint.
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation.
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "stage_rows_in_total",
        "Rows consumed by a pipeline stage, labeled by stage name"
    );
    describe_counter!(
        "stage_rows_out_total",
        "Rows emitted by a pipeline stage, labeled by stage name"
    );
    describe_histogram!(
        "stage_duration_seconds",
        "Wall-clock duration of a pipeline stage run"
    );
    describe_gauge!(
        "stage_peak_memory_bytes",
        "Peak resident memory sampled around a pipeline stage"
    );
    describe_counter!(
        "partition_objects_total",
        "Object-store objects read per partition"
    );
    describe_counter!(
        "audit_records_total",
        "Non-fatal audit records emitted, labeled by kind"
    );
}
