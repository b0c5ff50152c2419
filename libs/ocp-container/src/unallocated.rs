//! Unallocated synthesiser (C7, spec.md §4.7): for every `(day, node,
//! source)` with real Pod usage, synthesises one row covering the gap
//! between node capacity and the sum of attributed pod usage.

use std::collections::HashMap;

use chrono::NaiveDate;
use ocp_model::{AuditKind, AuditLog, ContainerSummaryRow, DataSource, MetadataSnapshot, NodeRole};
use uuid::Uuid;

/// Synthetic sink namespaces a row must not already be one of before C7
/// considers it real usage (spec.md §4.7's filter).
pub const SINK_NAMESPACES: &[&str] = &[
    "Platform unallocated",
    "Worker unallocated",
    "Network unattributed",
    "Storage unattributed",
];

pub const PLATFORM_UNALLOCATED: &str = "Platform unallocated";
pub const WORKER_UNALLOCATED: &str = "Worker unallocated";

#[derive(Hash, PartialEq, Eq, Clone)]
struct GroupKey {
    day: NaiveDate,
    node: String,
    source: Uuid,
}

#[derive(Default)]
struct Accumulator {
    sum_usage_cpu: f64,
    sum_request_cpu: f64,
    sum_effective_cpu: f64,
    sum_limit_cpu: f64,
    sum_usage_memory: f64,
    sum_request_memory: f64,
    sum_effective_memory: f64,
    sum_limit_memory: f64,
    max_node_capacity_cpu_core_hours: Option<f64>,
    max_node_capacity_memory_gigabyte_hours: Option<f64>,
    report_period_id: Option<i64>,
    cluster_id: Option<String>,
    cluster_alias: Option<String>,
    year: String,
    month: String,
}

fn clamp_non_negative(value: f64) -> f64 {
    value.max(0.0)
}

/// Synthesises the unallocated rows for one partition's C5 output.
pub fn synthesise_unallocated(
    pod_rows: &[ContainerSummaryRow],
    roles: &MetadataSnapshot,
    audit: &mut AuditLog,
) -> Vec<ContainerSummaryRow> {
    let mut groups: HashMap<GroupKey, Accumulator> = HashMap::new();

    for row in pod_rows {
        if row.data_source != DataSource::Pod {
            continue;
        }
        let Some(node) = row.node.clone() else { continue };
        if row.namespace.as_deref().is_some_and(|ns| SINK_NAMESPACES.contains(&ns)) {
            continue;
        }

        let key = GroupKey { day: row.usage_start, node, source: row.source };
        let acc = groups.entry(key).or_insert_with(|| Accumulator {
            report_period_id: row.report_period_id,
            cluster_id: row.cluster_id.clone(),
            cluster_alias: row.cluster_alias.clone(),
            year: row.year.clone(),
            month: row.month.clone(),
            ..Default::default()
        });

        acc.sum_usage_cpu += row.pod_usage_cpu_core_hours.unwrap_or(0.0);
        acc.sum_request_cpu += row.pod_request_cpu_core_hours.unwrap_or(0.0);
        acc.sum_effective_cpu += row.pod_effective_usage_cpu_core_hours.unwrap_or(0.0);
        acc.sum_limit_cpu += row.pod_limit_cpu_core_hours.unwrap_or(0.0);
        acc.sum_usage_memory += row.pod_usage_memory_gigabyte_hours.unwrap_or(0.0);
        acc.sum_request_memory += row.pod_request_memory_gigabyte_hours.unwrap_or(0.0);
        acc.sum_effective_memory += row.pod_effective_usage_memory_gigabyte_hours.unwrap_or(0.0);
        acc.sum_limit_memory += row.pod_limit_memory_gigabyte_hours.unwrap_or(0.0);

        acc.max_node_capacity_cpu_core_hours = max_option(
            acc.max_node_capacity_cpu_core_hours,
            row.node_capacity_cpu_core_hours,
        );
        acc.max_node_capacity_memory_gigabyte_hours = max_option(
            acc.max_node_capacity_memory_gigabyte_hours,
            row.node_capacity_memory_gigabyte_hours,
        );
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, acc) in groups {
        // spec.md §4.7: `CASE max(node_role) WHEN 'master'|'infra' THEN
        // 'Platform unallocated' WHEN 'worker' THEN 'Worker unallocated' ELSE
        // NULL END` — an unknown role still gets a row, with a NULL
        // namespace, not a dropped group.
        let namespace = match roles.node_role(&key.node) {
            Some(NodeRole::Master) | Some(NodeRole::Infra) => Some(PLATFORM_UNALLOCATED.to_string()),
            Some(NodeRole::Worker) => Some(WORKER_UNALLOCATED.to_string()),
            None => {
                audit.push(AuditKind::UnknownNodeRole, format!("node {} has no recorded role", key.node));
                None
            }
        };

        let cap_cpu = acc.max_node_capacity_cpu_core_hours.unwrap_or(0.0);
        let cap_memory = acc.max_node_capacity_memory_gigabyte_hours.unwrap_or(0.0);

        out.push(ContainerSummaryRow {
            data_source: DataSource::Pod,
            usage_start: key.day,
            usage_end: key.day,
            report_period_id: acc.report_period_id,
            cluster_id: acc.cluster_id,
            cluster_alias: acc.cluster_alias,
            source: key.source,
            year: acc.year,
            month: acc.month,
            namespace,
            node: Some(key.node),
            resource_id: None,
            pod_labels: "{}".to_string(),

            pod_usage_cpu_core_hours: Some(clamp_non_negative(cap_cpu - acc.sum_usage_cpu)),
            pod_request_cpu_core_hours: Some(clamp_non_negative(cap_cpu - acc.sum_request_cpu)),
            pod_limit_cpu_core_hours: Some(clamp_non_negative(cap_cpu - acc.sum_limit_cpu)),
            pod_effective_usage_cpu_core_hours: Some(clamp_non_negative(cap_cpu - acc.sum_effective_cpu)),
            pod_usage_memory_gigabyte_hours: Some(clamp_non_negative(cap_memory - acc.sum_usage_memory)),
            pod_request_memory_gigabyte_hours: Some(clamp_non_negative(cap_memory - acc.sum_request_memory)),
            pod_limit_memory_gigabyte_hours: Some(clamp_non_negative(cap_memory - acc.sum_limit_memory)),
            pod_effective_usage_memory_gigabyte_hours: Some(clamp_non_negative(
                cap_memory - acc.sum_effective_memory,
            )),

            node_capacity_cpu_cores: None,
            node_capacity_memory_gigabytes: None,
            node_capacity_cpu_core_hours: acc.max_node_capacity_cpu_core_hours,
            node_capacity_memory_gigabyte_hours: acc.max_node_capacity_memory_gigabyte_hours,
            cluster_capacity_cpu_core_hours: None,
            cluster_capacity_memory_gigabyte_hours: None,

            persistentvolumeclaim_capacity_gigabyte: None,
            persistentvolumeclaim_capacity_gigabyte_months: None,
            volume_request_storage_gigabyte_months: None,
            persistentvolumeclaim_usage_gigabyte_months: None,
            persistentvolumeclaim: None,
            persistentvolume: None,
            storageclass: None,
            csi_volume_handle: None,

            cost_category_id: None,
            infrastructure_usage_cost: crate::pods::INFRASTRUCTURE_USAGE_COST.to_string(),
        });
    }
    out
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row(node: &str, namespace: &str, usage_hours: f64, cap_hours: f64) -> ContainerSummaryRow {
        ContainerSummaryRow {
            data_source: DataSource::Pod,
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            usage_end: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            report_period_id: Some(1),
            cluster_id: Some("cluster-a".into()),
            cluster_alias: None,
            source: Uuid::nil(),
            year: "2026".into(),
            month: "07".into(),
            namespace: Some(namespace.into()),
            node: Some(node.into()),
            resource_id: Some("i-1".into()),
            pod_labels: "{}".into(),
            pod_usage_cpu_core_hours: Some(usage_hours),
            pod_request_cpu_core_hours: Some(usage_hours),
            pod_limit_cpu_core_hours: Some(usage_hours),
            pod_effective_usage_cpu_core_hours: Some(usage_hours),
            pod_usage_memory_gigabyte_hours: Some(0.0),
            pod_request_memory_gigabyte_hours: Some(0.0),
            pod_limit_memory_gigabyte_hours: Some(0.0),
            pod_effective_usage_memory_gigabyte_hours: Some(0.0),
            node_capacity_cpu_cores: Some(4.0),
            node_capacity_memory_gigabytes: Some(16.0),
            node_capacity_cpu_core_hours: Some(cap_hours),
            node_capacity_memory_gigabyte_hours: Some(0.0),
            cluster_capacity_cpu_core_hours: None,
            cluster_capacity_memory_gigabyte_hours: None,
            persistentvolumeclaim_capacity_gigabyte: None,
            persistentvolumeclaim_capacity_gigabyte_months: None,
            volume_request_storage_gigabyte_months: None,
            persistentvolumeclaim_usage_gigabyte_months: None,
            persistentvolumeclaim: None,
            persistentvolume: None,
            storageclass: None,
            csi_volume_handle: None,
            cost_category_id: None,
            infrastructure_usage_cost: "{}".into(),
        }
    }

    #[test]
    fn worker_node_gap_becomes_worker_unallocated() {
        let mut audit = AuditLog::new();
        let roles = MetadataSnapshot::new(
            Vec::new(),
            Vec::new(),
            vec![("node-a".to_string(), "i-1".to_string(), Some(NodeRole::Worker))],
        );
        let rows = vec![base_row("node-a", "app-ns", 6.0, 24.0)];
        let out = synthesise_unallocated(&rows, &roles, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].namespace.as_deref(), Some(WORKER_UNALLOCATED));
        assert_eq!(out[0].pod_usage_cpu_core_hours, Some(18.0));
    }

    #[test]
    fn negative_gap_is_clamped_to_zero() {
        let mut audit = AuditLog::new();
        let roles = MetadataSnapshot::new(
            Vec::new(),
            Vec::new(),
            vec![("node-a".to_string(), "i-1".to_string(), Some(NodeRole::Worker))],
        );
        let rows = vec![base_row("node-a", "app-ns", 30.0, 24.0)];
        let out = synthesise_unallocated(&rows, &roles, &mut audit);
        assert_eq!(out[0].pod_usage_cpu_core_hours, Some(0.0));
    }

    #[test]
    fn sink_namespace_rows_are_excluded_from_the_base() {
        let mut audit = AuditLog::new();
        let roles = MetadataSnapshot::new(
            Vec::new(),
            Vec::new(),
            vec![("node-a".to_string(), "i-1".to_string(), Some(NodeRole::Worker))],
        );
        let rows = vec![base_row("node-a", "Worker unallocated", 6.0, 24.0)];
        let out = synthesise_unallocated(&rows, &roles, &mut audit);
        // No real usage rows contributed, so the gap is the full capacity.
        assert_eq!(out[0].pod_usage_cpu_core_hours, Some(24.0));
    }

    #[test]
    fn unknown_node_role_synthesises_a_null_namespace_row_with_audit() {
        let mut audit = AuditLog::new();
        let roles = MetadataSnapshot::new(Vec::new(), Vec::new(), Vec::new());
        let rows = vec![base_row("node-unknown", "app-ns", 6.0, 24.0)];
        let out = synthesise_unallocated(&rows, &roles, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].namespace, None);
        assert_eq!(out[0].pod_usage_cpu_core_hours, Some(18.0));
        assert_eq!(audit.count_kind(&AuditKind::UnknownNodeRole), 1);
    }
}
