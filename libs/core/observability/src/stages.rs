//! Per-stage metrics for the aggregation pipeline.
//!
//! Mirrors the teacher's pricing-collection metrics: a static recorder with
//! `counter!`/`histogram!`/`gauge!` calls, plus a `Drop`-based timer guard so
//! callers can't forget to record a stage's duration on early return.

use std::time::Instant;

use metrics::{counter, gauge, histogram};

/// Stage-scoped counters, histograms, and gauges.
///
/// Stage names are short identifiers such as `c4_capacity`,
/// `c5_pod_aggregate`, `c6_storage_aggregate`, `c7_unallocated`,
/// `c8_resource_match`, `c9_tag_match`, `c12_cost_attribute`, `c13_aggregate`.
pub struct StageMetrics;

impl StageMetrics {
    /// Start a timer for `stage`. Recording happens when the returned guard
    /// is dropped, so the duration is captured even if the caller returns
    /// early via `?`.
    pub fn start(stage: &'static str) -> StageTimer {
        StageTimer::new(stage)
    }

    pub fn record_rows_in(stage: &'static str, rows: u64) {
        counter!("stage_rows_in_total", "stage" => stage).increment(rows);
    }

    pub fn record_rows_out(stage: &'static str, rows: u64) {
        counter!("stage_rows_out_total", "stage" => stage).increment(rows);
    }

    pub fn record_peak_memory_bytes(stage: &'static str, bytes: u64) {
        gauge!("stage_peak_memory_bytes", "stage" => stage).set(bytes as f64);
    }

    pub fn record_partition_objects(partition: &str, count: u64) {
        counter!("partition_objects_total", "partition" => partition.to_string())
            .increment(count);
    }

    /// `kind` is one of `malformed_label`, `ambiguous_resource_match`,
    /// `nonretryable_object_error`, or similar warning-class conditions.
    pub fn record_audit(kind: &'static str) {
        counter!("audit_records_total", "kind" => kind).increment(1);
    }
}

/// RAII guard that records `stage_duration_seconds` and a peak-memory
/// sample on drop.
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
    started_physical_mem: Option<usize>,
}

impl StageTimer {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
            started_physical_mem: memory_stats::memory_stats().map(|m| m.physical_mem),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        histogram!("stage_duration_seconds", "stage" => self.stage).record(elapsed);

        // Sampled at stage boundaries rather than continuously (spec.md §6
        // "Observability surface"): cheap enough to call twice per stage,
        // not precise enough to call a true peak.
        if let Some(ended) = memory_stats::memory_stats().map(|m| m.physical_mem) {
            let peak = ended.max(self.started_physical_mem.unwrap_or(0));
            StageMetrics::record_peak_memory_bytes(self.stage, peak as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_on_drop_without_panicking() {
        let timer = StageMetrics::start("test_stage");
        drop(timer);
    }

    #[test]
    fn recorders_do_not_panic_without_an_installed_exporter() {
        StageMetrics::record_rows_in("test_stage", 10);
        StageMetrics::record_rows_out("test_stage", 5);
        StageMetrics::record_peak_memory_bytes("test_stage", 1024);
        StageMetrics::record_partition_objects("2026-07/ns-a", 3);
        StageMetrics::record_audit("malformed_label");
    }
}
