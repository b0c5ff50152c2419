//! Capacity engine (C4, spec.md §4.4): three-stage reduction from hourly
//! per-pod capacity reports (every pod on a node repeats the same node
//! capacity for its interval) down to one row per node per day, then one row
//! per cluster per day.

use std::collections::HashMap;

use chrono::NaiveDate;
use ocp_model::{AuditKind, AuditLog, PodLineItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDailyCapacity {
    pub day: NaiveDate,
    pub node: String,
    pub cpu_core_seconds: i64,
    pub memory_byte_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDailyCapacity {
    pub day: NaiveDate,
    pub cpu_core_seconds: i64,
    pub memory_byte_seconds: i64,
}

/// Clamp a capacity reading to zero, recording an audit entry. `i64` inputs
/// are never non-finite, but negative values (clock skew, a malformed
/// exporter reading) are clamped the same way as the spec's non-finite case.
fn clamp_non_negative(value: i64, node: &str, audit: &mut AuditLog) -> i64 {
    if value < 0 {
        audit.push(AuditKind::ZeroNodeCapacity, format!("negative capacity reading on node {node}"));
        0
    } else {
        value
    }
}

/// Runs all three reduction stages over one partition's hourly pod
/// line-items. `rows` need not be sorted or deduplicated by caller.
pub fn compute_capacity(
    rows: &[PodLineItem],
    audit: &mut AuditLog,
) -> (Vec<NodeDailyCapacity>, Vec<ClusterDailyCapacity>) {
    // Stage 1: max over (interval_start, node).
    let mut per_interval: HashMap<(chrono::NaiveDateTime, String), (i64, i64)> = HashMap::new();
    for row in rows {
        let cpu = clamp_non_negative(row.node_capacity_cpu_core_seconds, &row.node, audit);
        let mem = clamp_non_negative(row.node_capacity_memory_byte_seconds, &row.node, audit);
        let entry = per_interval
            .entry((row.interval_start, row.node.clone()))
            .or_insert((0, 0));
        entry.0 = entry.0.max(cpu);
        entry.1 = entry.1.max(mem);
    }

    // Stage 2: sum over day within each node.
    let mut per_node_day: HashMap<(NaiveDate, String), (i64, i64)> = HashMap::new();
    for ((interval_start, node), (cpu, mem)) in per_interval {
        let day = interval_start.date();
        let entry = per_node_day.entry((day, node)).or_insert((0, 0));
        entry.0 += cpu;
        entry.1 += mem;
    }

    // Stage 3: sum across nodes within each day.
    let mut per_cluster_day: HashMap<NaiveDate, (i64, i64)> = HashMap::new();
    let mut node_daily = Vec::with_capacity(per_node_day.len());
    for ((day, node), (cpu, mem)) in per_node_day {
        let entry = per_cluster_day.entry(day).or_insert((0, 0));
        entry.0 += cpu;
        entry.1 += mem;
        node_daily.push(NodeDailyCapacity {
            day,
            node,
            cpu_core_seconds: cpu,
            memory_byte_seconds: mem,
        });
    }

    let cluster_daily = per_cluster_day
        .into_iter()
        .map(|(day, (cpu, mem))| ClusterDailyCapacity {
            day,
            cpu_core_seconds: cpu,
            memory_byte_seconds: mem,
        })
        .collect();

    (node_daily, cluster_daily)
}
