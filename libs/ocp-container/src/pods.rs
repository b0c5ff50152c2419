//! Pod aggregator (C5, spec.md §4.5): groups daily pod line-items down to
//! one row per `(day, namespace, node, source, canonical(labels))`, pulling
//! in node/cluster capacity from C4 and the cost-category match from C3.

use std::collections::HashMap;

use chrono::NaiveDate;
use ocp_model::{ContainerSummaryRow, DataSource, PodLineItem};
use uuid::Uuid;

use crate::capacity::{ClusterDailyCapacity, NodeDailyCapacity};
use crate::labels::{self, CostCategoryMatcher, LabelMap};

/// Fixed literal the spec designates as the `infrastructure_usage_cost`
/// column for container-only rows — it carries no per-row information.
pub const INFRASTRUCTURE_USAGE_COST: &str = "{}";

const BYTES_PER_GIBIBYTE: f64 = 1_073_741_824.0;

pub struct PodAggregateContext<'a> {
    pub node_labels: &'a HashMap<(NaiveDate, String), LabelMap>,
    pub namespace_labels: &'a HashMap<(NaiveDate, String), LabelMap>,
    pub node_daily_cap: &'a HashMap<(NaiveDate, String), NodeDailyCapacity>,
    pub cluster_daily_cap: &'a HashMap<NaiveDate, ClusterDailyCapacity>,
    pub cost_categories: CostCategoryMatcher<'a>,
    pub allow_set: &'a [String],
    pub report_period_id: Option<i64>,
    pub cluster_id: Option<String>,
    pub cluster_alias: Option<String>,
    pub year: i32,
    pub month: u32,
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct GroupKey {
    day: NaiveDate,
    namespace: String,
    node: String,
    source: Uuid,
    canonical_labels: String,
}

#[derive(Default)]
struct Accumulator {
    usage_cpu_seconds: i64,
    request_cpu_seconds: i64,
    limit_cpu_seconds: i64,
    effective_cpu_seconds: i64,
    usage_memory_byte_seconds: i64,
    request_memory_byte_seconds: i64,
    limit_memory_byte_seconds: i64,
    effective_memory_byte_seconds: i64,
    max_node_capacity_cpu_cores: f64,
    max_node_capacity_memory_bytes: i64,
    max_resource_id: Option<String>,
}

/// Runs C5 over one partition's daily pod line-items. `rows` are assumed
/// already scoped to the requested partition (I8); this function applies
/// only the `node != ''` filter (I1/P6).
pub fn aggregate_pods(
    rows: &[PodLineItem],
    ctx: &PodAggregateContext,
    audit: &mut ocp_model::AuditLog,
) -> Vec<ContainerSummaryRow> {
    let mut groups: HashMap<GroupKey, Accumulator> = HashMap::new();

    for row in rows {
        if row.node.is_empty() {
            continue;
        }
        let day = row.interval_start.date();

        let node_map = ctx
            .node_labels
            .get(&(day, row.node.clone()))
            .cloned()
            .unwrap_or_default();
        let namespace_map = ctx
            .namespace_labels
            .get(&(day, row.namespace.clone()))
            .cloned()
            .unwrap_or_default();
        let pod_map = labels::filter(labels::parse(row.pod_labels.as_deref(), audit), ctx.allow_set);
        let merged = labels::merge3(&node_map, &namespace_map, &pod_map);
        let canonical_labels = labels::canonicalise(&merged);

        let key = GroupKey {
            day,
            namespace: row.namespace.clone(),
            node: row.node.clone(),
            source: row.source,
            canonical_labels,
        };

        let effective_cpu = row
            .pod_effective_usage_cpu_core_seconds
            .unwrap_or_else(|| row.pod_usage_cpu_core_seconds.max(row.pod_request_cpu_core_seconds));
        let effective_memory = row
            .pod_effective_usage_memory_byte_seconds
            .unwrap_or_else(|| row.pod_usage_memory_byte_seconds.max(row.pod_request_memory_byte_seconds));

        let acc = groups.entry(key).or_default();
        acc.usage_cpu_seconds += row.pod_usage_cpu_core_seconds;
        acc.request_cpu_seconds += row.pod_request_cpu_core_seconds;
        acc.limit_cpu_seconds += row.pod_limit_cpu_core_seconds;
        acc.effective_cpu_seconds += effective_cpu;
        acc.usage_memory_byte_seconds += row.pod_usage_memory_byte_seconds;
        acc.request_memory_byte_seconds += row.pod_request_memory_byte_seconds;
        acc.limit_memory_byte_seconds += row.pod_limit_memory_byte_seconds;
        acc.effective_memory_byte_seconds += effective_memory;
        acc.max_node_capacity_cpu_cores = acc.max_node_capacity_cpu_cores.max(row.node_capacity_cpu_cores);
        acc.max_node_capacity_memory_bytes =
            acc.max_node_capacity_memory_bytes.max(row.node_capacity_memory_bytes);
        acc.max_resource_id = match acc.max_resource_id.take() {
            Some(current) if current >= row.resource_id => Some(current),
            _ => Some(row.resource_id.clone()),
        };
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let node_cap = ctx.node_daily_cap.get(&(key.day, key.node.clone()));
            let cluster_cap = ctx.cluster_daily_cap.get(&key.day);
            let cost_category_id = ctx.cost_categories.best_match(&key.namespace);

            ContainerSummaryRow {
                data_source: DataSource::Pod,
                usage_start: key.day,
                usage_end: key.day,
                report_period_id: ctx.report_period_id,
                cluster_id: ctx.cluster_id.clone(),
                cluster_alias: ctx.cluster_alias.clone(),
                source: key.source,
                year: ctx.year.to_string(),
                month: format!("{:02}", ctx.month),
                namespace: Some(key.namespace),
                node: Some(key.node),
                resource_id: acc.max_resource_id,
                pod_labels: key.canonical_labels,

                pod_usage_cpu_core_hours: Some(acc.usage_cpu_seconds as f64 / 3600.0),
                pod_request_cpu_core_hours: Some(acc.request_cpu_seconds as f64 / 3600.0),
                pod_limit_cpu_core_hours: Some(acc.limit_cpu_seconds as f64 / 3600.0),
                pod_effective_usage_cpu_core_hours: Some(acc.effective_cpu_seconds as f64 / 3600.0),
                pod_usage_memory_gigabyte_hours: Some(
                    acc.usage_memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE,
                ),
                pod_request_memory_gigabyte_hours: Some(
                    acc.request_memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE,
                ),
                pod_limit_memory_gigabyte_hours: Some(
                    acc.limit_memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE,
                ),
                pod_effective_usage_memory_gigabyte_hours: Some(
                    acc.effective_memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE,
                ),

                node_capacity_cpu_cores: Some(acc.max_node_capacity_cpu_cores),
                node_capacity_memory_gigabytes: Some(
                    acc.max_node_capacity_memory_bytes as f64 / BYTES_PER_GIBIBYTE,
                ),
                node_capacity_cpu_core_hours: node_cap.map(|c| c.cpu_core_seconds as f64 / 3600.0),
                node_capacity_memory_gigabyte_hours: node_cap
                    .map(|c| c.memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE),
                cluster_capacity_cpu_core_hours: cluster_cap.map(|c| c.cpu_core_seconds as f64 / 3600.0),
                cluster_capacity_memory_gigabyte_hours: cluster_cap
                    .map(|c| c.memory_byte_seconds as f64 / 3600.0 / BYTES_PER_GIBIBYTE),

                persistentvolumeclaim_capacity_gigabyte: None,
                persistentvolumeclaim_capacity_gigabyte_months: None,
                volume_request_storage_gigabyte_months: None,
                persistentvolumeclaim_usage_gigabyte_months: None,
                persistentvolumeclaim: None,
                persistentvolume: None,
                storageclass: None,
                csi_volume_handle: None,

                cost_category_id,
                infrastructure_usage_cost: INFRASTRUCTURE_USAGE_COST.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_row(day_hour: &str, namespace: &str, node: &str) -> PodLineItem {
        PodLineItem {
            interval_start: chrono::NaiveDateTime::parse_from_str(day_hour, "%Y-%m-%d %H:%M:%S").unwrap(),
            source: Uuid::nil(),
            namespace: namespace.into(),
            node: node.into(),
            pod: "pod-a".into(),
            resource_id: "i-1".into(),
            pod_labels: None,
            pod_usage_cpu_core_seconds: 1800,
            pod_request_cpu_core_seconds: 3600,
            pod_limit_cpu_core_seconds: 3600,
            pod_effective_usage_cpu_core_seconds: None,
            pod_usage_memory_byte_seconds: 1_000_000_000,
            pod_request_memory_byte_seconds: 2_000_000_000,
            pod_limit_memory_byte_seconds: 2_000_000_000,
            pod_effective_usage_memory_byte_seconds: None,
            node_capacity_cpu_cores: 4.0,
            node_capacity_memory_bytes: 16_000_000_000,
            node_capacity_cpu_core_seconds: 14_400,
            node_capacity_memory_byte_seconds: 0,
        }
    }

    struct EmptyMaps {
        node_labels: HashMap<(NaiveDate, String), LabelMap>,
        namespace_labels: HashMap<(NaiveDate, String), LabelMap>,
        node_daily_cap: HashMap<(NaiveDate, String), NodeDailyCapacity>,
        cluster_daily_cap: HashMap<NaiveDate, ClusterDailyCapacity>,
    }

    impl EmptyMaps {
        fn new() -> Self {
            Self {
                node_labels: HashMap::new(),
                namespace_labels: HashMap::new(),
                node_daily_cap: HashMap::new(),
                cluster_daily_cap: HashMap::new(),
            }
        }

        fn ctx<'a>(
            &'a self,
            patterns: &'a [ocp_model::CostCategoryPattern],
            allow_set: &'a [String],
        ) -> PodAggregateContext<'a> {
            PodAggregateContext {
                node_labels: &self.node_labels,
                namespace_labels: &self.namespace_labels,
                node_daily_cap: &self.node_daily_cap,
                cluster_daily_cap: &self.cluster_daily_cap,
                cost_categories: CostCategoryMatcher::new(patterns),
                allow_set,
                report_period_id: Some(1),
                cluster_id: Some("cluster-a".into()),
                cluster_alias: None,
                year: 2026,
                month: 7,
            }
        }
    }

    #[test]
    fn empty_node_rows_are_excluded() {
        let mut audit = ocp_model::AuditLog::new();
        let maps = EmptyMaps::new();
        let patterns = Vec::new();
        let allow_set = Vec::new();
        let ctx = maps.ctx(&patterns, &allow_set);
        let rows = vec![pod_row("2026-07-01 00:00:00", "ns", "")];
        let out = aggregate_pods(&rows, &ctx, &mut audit);
        assert!(out.is_empty());
    }

    #[test]
    fn effective_usage_falls_back_to_greatest_of_usage_and_request() {
        let mut audit = ocp_model::AuditLog::new();
        let maps = EmptyMaps::new();
        let patterns = Vec::new();
        let allow_set = Vec::new();
        let ctx = maps.ctx(&patterns, &allow_set);
        let rows = vec![pod_row("2026-07-01 00:00:00", "ns", "node-a")];
        let out = aggregate_pods(&rows, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        // request (3600s) > usage (1800s), so effective == request == 1h.
        assert_eq!(out[0].pod_effective_usage_cpu_core_hours, Some(1.0));
    }

    #[test]
    fn two_hourly_rows_same_group_sum_into_one_output_row() {
        let mut audit = ocp_model::AuditLog::new();
        let maps = EmptyMaps::new();
        let patterns = Vec::new();
        let allow_set = Vec::new();
        let ctx = maps.ctx(&patterns, &allow_set);
        let rows = vec![
            pod_row("2026-07-01 00:00:00", "ns", "node-a"),
            pod_row("2026-07-01 01:00:00", "ns", "node-a"),
        ];
        let out = aggregate_pods(&rows, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pod_usage_cpu_core_hours, Some(1.0));
    }
}
