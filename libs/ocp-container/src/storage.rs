//! Storage aggregator (C6, spec.md §4.6): joins storage line-items to pods
//! for node/resource_id, scales shared-volume usage by the number of nodes
//! that mount it, then groups into one row per
//! `(day, namespace, node, persistentvolumeclaim, persistentvolume,
//! storageclass, canonical(labels))`.
//!
//! **Open Question Q1 resolution (documented in full in DESIGN.md):** the
//! merge order `node < namespace < filter(parse(volume_labels)) <
//! filter(parse(pvc_labels))` is applied literally left-to-right, so a PVC
//! label wins over a PV label of the same key on conflict.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use ocp_model::{ContainerSummaryRow, DataSource, StorageLineItem};
use uuid::Uuid;

use crate::calendar::days_in_month;
use crate::labels::{self, CostCategoryMatcher, LabelMap};

const BYTES_PER_GIBIBYTE: f64 = 1_073_741_824.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Each row's `persistentvolumeclaim_capacity_bytes` is a point-in-time
/// gauge reading, not yet byte-seconds, so it is scaled by this constant the
/// same way `volume_request_storage_byte_seconds` already is upstream.
/// `DatasetKind` (`ocp_model::dataset`) has no `StorageHourly` variant —
/// `pipeline.rs` only ever reads `DatasetKind::StorageDaily` — so one row
/// covers one full day, not one hour; this reuses `SECONDS_PER_DAY`.
const CAPACITY_INTERVAL_SECONDS: f64 = SECONDS_PER_DAY;

pub struct StorageAggregateContext<'a> {
    /// `(day, source, namespace, pod) → (node, resource_id)`, built from the
    /// same partition's pod-daily line-items.
    pub pod_lookup: &'a HashMap<(NaiveDate, Uuid, String, String), (String, String)>,
    pub node_labels: &'a HashMap<(NaiveDate, String), LabelMap>,
    pub namespace_labels: &'a HashMap<(NaiveDate, String), LabelMap>,
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
    node: Option<String>,
    persistentvolumeclaim: String,
    persistentvolume: String,
    storageclass: Option<String>,
    canonical_labels: String,
}

#[derive(Default)]
struct Accumulator {
    max_capacity_bytes: i64,
    sum_capacity_gigabyte_months: f64,
    sum_request_gigabyte_months: f64,
    sum_usage_gigabyte_months: f64,
    max_csi_volume_handle: Option<String>,
    max_resource_id: Option<String>,
}

/// Step 1 of C6: for each `(day, persistentvolume)`, count distinct nodes
/// over the joined relation (a `None` node counts once, however many rows
/// lack a match).
fn shared_volume_node_counts(
    rows: &[StorageLineItem],
    ctx: &StorageAggregateContext,
) -> HashMap<(NaiveDate, String), usize> {
    let mut nodes_per_volume: HashMap<(NaiveDate, String), HashSet<Option<String>>> = HashMap::new();
    for row in rows {
        let day = row.interval_start.date();
        let node = ctx
            .pod_lookup
            .get(&(day, row.source, row.namespace.clone(), row.pod.clone()))
            .map(|(node, _)| node.clone());
        nodes_per_volume
            .entry((day, row.persistentvolume.clone()))
            .or_default()
            .insert(node);
    }
    nodes_per_volume
        .into_iter()
        .map(|(key, nodes)| (key, nodes.len().max(1)))
        .collect()
}

pub fn aggregate_storage(
    rows: &[StorageLineItem],
    ctx: &StorageAggregateContext,
    audit: &mut ocp_model::AuditLog,
) -> Vec<ContainerSummaryRow> {
    let node_counts = shared_volume_node_counts(rows, ctx);
    let mut groups: HashMap<GroupKey, Accumulator> = HashMap::new();

    for row in rows {
        let day = row.interval_start.date();
        let matched = ctx
            .pod_lookup
            .get(&(day, row.source, row.namespace.clone(), row.pod.clone()));
        let (node, resource_id) = match matched {
            Some((node, resource_id)) => (Some(node.clone()), Some(resource_id.clone())),
            None => (None, None),
        };

        let node_count = *node_counts
            .get(&(day, row.persistentvolume.clone()))
            .unwrap_or(&1) as f64;

        let node_map = node
            .as_ref()
            .and_then(|n| ctx.node_labels.get(&(day, n.clone())))
            .cloned()
            .unwrap_or_default();
        let namespace_map = ctx
            .namespace_labels
            .get(&(day, row.namespace.clone()))
            .cloned()
            .unwrap_or_default();
        let pv_map = labels::filter(
            labels::parse(row.persistentvolume_labels.as_deref(), audit),
            ctx.allow_set,
        );
        let pvc_map = labels::filter(
            labels::parse(row.persistentvolumeclaim_labels.as_deref(), audit),
            ctx.allow_set,
        );
        let merged = labels::merge4(&node_map, &namespace_map, &pv_map, &pvc_map);
        let canonical_labels = labels::canonicalise(&merged);

        let key = GroupKey {
            day,
            namespace: row.namespace.clone(),
            node,
            persistentvolumeclaim: row.persistentvolumeclaim.clone(),
            persistentvolume: row.persistentvolume.clone(),
            storageclass: row.storageclass.clone(),
            canonical_labels,
        };

        let days = days_in_month(ctx.year, ctx.month) as f64;
        let denom = SECONDS_PER_DAY * days;

        let scaled_request = row.volume_request_storage_byte_seconds as f64 / node_count;
        let scaled_usage = row.persistentvolumeclaim_usage_byte_seconds as f64 / node_count;
        let capacity_byte_seconds = row.persistentvolumeclaim_capacity_bytes as f64 * CAPACITY_INTERVAL_SECONDS;

        let acc = groups.entry(key).or_default();
        acc.max_capacity_bytes = acc.max_capacity_bytes.max(row.persistentvolumeclaim_capacity_bytes);
        acc.sum_capacity_gigabyte_months += capacity_byte_seconds / denom / BYTES_PER_GIBIBYTE;
        acc.sum_request_gigabyte_months += scaled_request / denom / BYTES_PER_GIBIBYTE;
        acc.sum_usage_gigabyte_months += scaled_usage / denom / BYTES_PER_GIBIBYTE;
        acc.max_csi_volume_handle = match (&acc.max_csi_volume_handle, &row.csi_volume_handle) {
            (Some(current), Some(candidate)) if current >= candidate => Some(current.clone()),
            (_, Some(candidate)) => Some(candidate.clone()),
            (current, None) => current.clone(),
        };
        acc.max_resource_id = match (&acc.max_resource_id, &resource_id) {
            (Some(current), Some(candidate)) if current >= candidate => Some(current.clone()),
            (_, Some(candidate)) => Some(candidate.clone()),
            (current, None) => current.clone(),
        };
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let cost_category_id = ctx.cost_categories.best_match(&key.namespace);
            ContainerSummaryRow {
                data_source: DataSource::Storage,
                usage_start: key.day,
                usage_end: key.day,
                report_period_id: ctx.report_period_id,
                cluster_id: ctx.cluster_id.clone(),
                cluster_alias: ctx.cluster_alias.clone(),
                source: Uuid::nil(),
                year: ctx.year.to_string(),
                month: format!("{:02}", ctx.month),
                namespace: Some(key.namespace),
                node: key.node,
                resource_id: acc.max_resource_id,
                pod_labels: key.canonical_labels,

                pod_usage_cpu_core_hours: None,
                pod_request_cpu_core_hours: None,
                pod_limit_cpu_core_hours: None,
                pod_effective_usage_cpu_core_hours: None,
                pod_usage_memory_gigabyte_hours: None,
                pod_request_memory_gigabyte_hours: None,
                pod_limit_memory_gigabyte_hours: None,
                pod_effective_usage_memory_gigabyte_hours: None,

                node_capacity_cpu_cores: None,
                node_capacity_memory_gigabytes: None,
                node_capacity_cpu_core_hours: None,
                node_capacity_memory_gigabyte_hours: None,
                cluster_capacity_cpu_core_hours: None,
                cluster_capacity_memory_gigabyte_hours: None,

                persistentvolumeclaim_capacity_gigabyte: Some(
                    acc.max_capacity_bytes as f64 / BYTES_PER_GIBIBYTE,
                ),
                persistentvolumeclaim_capacity_gigabyte_months: Some(acc.sum_capacity_gigabyte_months),
                volume_request_storage_gigabyte_months: Some(acc.sum_request_gigabyte_months),
                persistentvolumeclaim_usage_gigabyte_months: Some(acc.sum_usage_gigabyte_months),
                persistentvolumeclaim: Some(key.persistentvolumeclaim),
                persistentvolume: Some(key.persistentvolume),
                storageclass: key.storageclass,
                csi_volume_handle: acc.max_csi_volume_handle,

                cost_category_id,
                infrastructure_usage_cost: crate::pods::INFRASTRUCTURE_USAGE_COST.to_string(),
            }
        })
        .collect()
}
