//! Pipeline driver (C14, spec.md §4.14 "orchestrates C1-C13"): wires
//! C1 -> C4 -> C5 -> C6 -> C7 -> C2 for a container-only run, and
//! C1 -> C8 -> C9 -> C10 -> C11 -> C12 -> C13 -> C2 for a container-on-cloud
//! run. Grounded on `PriceCollector::collect` in
//! `apps/cloud/pricing-collector/src/collector.rs`: one method per run kind,
//! reading through the trait object, aggregating in memory, persisting at
//! the end, with an `AuditLog` threaded throughout instead of raising on
//! every recoverable condition.

use std::collections::{HashMap, HashSet};

use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use observability::StageMetrics;
use ocp_attribution::{
    attribute_row, build_storage_indexes, compute_disk_capacity, compute_node_ratios, AttributionContext, MatchKind,
    MatchedStorageCost, NodeResource, ObservedContainerKeys, ResourceMatcher, VolumeResource,
};
use ocp_container::{aggregate_pods, aggregate_storage, compute_capacity, labels, synthesise_unallocated, CostCategoryMatcher, LabelMap, PodAggregateContext, StorageAggregateContext};
use ocp_model::{
    AuditLog, CloudBillingLineItem, DatasetKind, EngineError, EngineResult, MetadataSnapshot, NamespaceLabelLineItem, NodeLabelLineItem, PartitionKey, PodLineItem,
    RunRequest, StorageLineItem,
};
use ocp_objectstore::{decode, DatasetReader};
use ocp_sink::{persist_container_on_cloud, persist_container_summary, RelationalSink};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Outcome of a container-only run, returned to `main` for logging and exit
/// code selection.
#[derive(Debug)]
pub struct ContainerOnlyOutcome {
    pub rows_persisted: u64,
    pub audit: AuditLog,
}

/// Outcome of a container-on-cloud run.
#[derive(Debug)]
pub struct ContainerOnCloudOutcome {
    pub attributed_rows: usize,
    pub container_on_cloud_rows_persisted: u64,
    pub rollup_rows_persisted: u64,
    pub audit: AuditLog,
}

fn partition_for(source: Uuid, request: &RunRequest) -> PartitionKey {
    let partition = PartitionKey::new(source, request.year, request.month);
    match &request.days {
        Some(days) => partition.with_days(days.clone()),
        None => partition,
    }
}

fn partition_bounds(partition: &PartitionKey) -> EngineResult<(NaiveDate, NaiveDate)> {
    partition
        .date_bounds()
        .ok_or_else(|| EngineError::Configuration(format!("{}-{:02} is not a valid calendar month", partition.year, partition.month)))
}

fn in_bounds(ts: chrono::NaiveDateTime, bounds: (NaiveDate, NaiveDate)) -> bool {
    let day = ts.date();
    day >= bounds.0 && day < bounds.1
}

/// Reads every chunk of `dataset`'s partition and decodes it, one
/// `RecordBatch` at a time so only one batch is ever held alongside the
/// growing output `Vec` (spec.md §5 "Memory discipline").
async fn read_and_decode<T>(
    reader: &dyn DatasetReader,
    tenant: &str,
    dataset: DatasetKind,
    partition: &PartitionKey,
    decode_fn: fn(&RecordBatch) -> EngineResult<Vec<T>>,
) -> EngineResult<Vec<T>> {
    let mut chunks = reader.open_chunks(tenant, dataset, partition, None).await?;
    let mut out = Vec::new();
    while let Some(batch) = chunks.next_chunk().await? {
        out.extend(decode_fn(&batch)?);
    }
    Ok(out)
}

/// Like [`read_and_decode`], but drains the whole partition with
/// `ChunkIterator::collect_all` first. Spec.md §5 requires the cloud side of
/// a container-on-cloud run to be fully materialised regardless of the
/// container side's streaming mode; this is that path.
async fn read_and_decode_materialized<T>(
    reader: &dyn DatasetReader,
    tenant: &str,
    dataset: DatasetKind,
    partition: &PartitionKey,
    decode_fn: fn(&RecordBatch) -> EngineResult<Vec<T>>,
) -> EngineResult<Vec<T>> {
    let chunks = reader.open_chunks(tenant, dataset, partition, None).await?;
    let batches = chunks.collect_all().await?;
    let mut out = Vec::new();
    for batch in &batches {
        out.extend(decode_fn(batch)?);
    }
    Ok(out)
}

/// Dispatches to [`read_and_decode`] or [`read_and_decode_materialized`]
/// depending on `mode.streaming` (spec.md §5 "Streaming mode", `ModeConfig`
/// in `apps::config`): `true` processes one row-group `RecordBatch` at a
/// time (bounded transient memory during the read), `false` collects every
/// batch of the partition before decoding any of it (the "in-memory mode"
/// spec.md describes as the default). Both return the same fully-decoded
/// `Vec<T>` to callers — the choice only changes how many `RecordBatch`es
/// are alive in the object-store layer at once, not what pod/storage
/// aggregation sees downstream.
async fn read_rows<T>(
    reader: &dyn DatasetReader,
    tenant: &str,
    dataset: DatasetKind,
    partition: &PartitionKey,
    streaming: bool,
    decode_fn: fn(&RecordBatch) -> EngineResult<Vec<T>>,
) -> EngineResult<Vec<T>> {
    if streaming {
        read_and_decode(reader, tenant, dataset, partition, decode_fn).await
    } else {
        read_and_decode_materialized(reader, tenant, dataset, partition, decode_fn).await
    }
}

/// C3-C7: the container-only engine. Reads pod/storage/label partitions for
/// `request.ocp_provider_id`, aggregates capacity, pods, storage, and the
/// unallocated remainder, then bulk-appends the result into
/// `ocp_usage_line_items`.
pub async fn run_container_only(
    request: &RunRequest,
    reader: &dyn DatasetReader,
    sink: &dyn RelationalSink,
    metadata: &MetadataSnapshot,
    streaming: bool,
    in_memory_row_limit: usize,
) -> EngineResult<ContainerOnlyOutcome> {
    let mut audit = AuditLog::new();
    let tenant = request.tenant_id.as_str();
    let partition = partition_for(request.ocp_provider_id, request);
    let bounds = partition_bounds(&partition)?;
    let allow_set = metadata.enabled_tag_keys().to_vec();

    let _timer = StageMetrics::start("c4_capacity");
    let hourly_pods: Vec<PodLineItem> = read_rows(reader, tenant, DatasetKind::PodHourly, &partition, streaming, decode::decode_pod_batch)
        .await?
        .into_iter()
        .filter(|r| !r.node.is_empty())
        .collect();
    StageMetrics::record_rows_in("c4_capacity", hourly_pods.len() as u64);
    let (node_daily_cap, cluster_daily_cap) = compute_capacity(&hourly_pods, &mut audit);
    drop(_timer);
    let node_daily_cap_map: HashMap<(NaiveDate, String), _> = node_daily_cap.into_iter().map(|c| ((c.day, c.node.clone()), c)).collect();
    let cluster_daily_cap_map: HashMap<NaiveDate, _> = cluster_daily_cap.into_iter().map(|c| (c.day, c)).collect();

    let daily_pods: Vec<PodLineItem> = read_rows(reader, tenant, DatasetKind::PodDaily, &partition, streaming, decode::decode_pod_batch)
        .await?
        .into_iter()
        .filter(|r| !r.node.is_empty() && in_bounds(r.interval_start, bounds))
        .collect();
    // Spec.md §5's "`input_rows > threshold` OR explicit configuration"
    // selection can only act on `mode.streaming` up front — the row count
    // itself isn't known until the read above completes. Surface the
    // threshold breach so an operator can flip `mode.streaming` on for the
    // next run rather than silently materialising an oversized partition.
    if !streaming && daily_pods.len() > in_memory_row_limit {
        tracing::warn!(
            rows = daily_pods.len(),
            limit = in_memory_row_limit,
            "pod-daily partition exceeded mode.in_memory_row_limit while running in non-streaming mode"
        );
    }

    let node_labels_raw: Vec<NodeLabelLineItem> = read_and_decode(reader, tenant, DatasetKind::NodeLabelsDaily, &partition, decode::decode_node_label_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();
    let namespace_labels_raw: Vec<NamespaceLabelLineItem> = read_and_decode(reader, tenant, DatasetKind::NamespaceLabelsDaily, &partition, decode::decode_namespace_label_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();

    let node_labels: HashMap<(NaiveDate, String), LabelMap> = node_labels_raw
        .into_iter()
        .map(|r| {
            let day = r.interval_start.date();
            let map = labels::filter(labels::parse(r.labels.as_deref(), &mut audit), &allow_set);
            ((day, r.node), map)
        })
        .collect();
    let namespace_labels: HashMap<(NaiveDate, String), LabelMap> = namespace_labels_raw
        .into_iter()
        .map(|r| {
            let day = r.interval_start.date();
            let map = labels::filter(labels::parse(r.labels.as_deref(), &mut audit), &allow_set);
            ((day, r.namespace), map)
        })
        .collect();

    let pod_ctx = PodAggregateContext {
        node_labels: &node_labels,
        namespace_labels: &namespace_labels,
        node_daily_cap: &node_daily_cap_map,
        cluster_daily_cap: &cluster_daily_cap_map,
        cost_categories: CostCategoryMatcher::new(metadata.cost_category_patterns()),
        allow_set: &allow_set,
        report_period_id: None,
        cluster_id: request.cluster_id.clone(),
        cluster_alias: request.cluster_id.clone(),
        year: request.year,
        month: request.month,
    };
    let _timer = StageMetrics::start("c5_pod_aggregate");
    let mut output_rows = aggregate_pods(&daily_pods, &pod_ctx, &mut audit);
    StageMetrics::record_rows_out("c5_pod_aggregate", output_rows.len() as u64);
    drop(_timer);

    let storage_rows_raw: Vec<StorageLineItem> = read_rows(reader, tenant, DatasetKind::StorageDaily, &partition, streaming, decode::decode_storage_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();

    let mut pod_lookup: HashMap<(NaiveDate, Uuid, String, String), (String, String)> = HashMap::new();
    for row in &daily_pods {
        pod_lookup.insert(
            (row.interval_start.date(), row.source, row.namespace.clone(), row.pod.clone()),
            (row.node.clone(), row.resource_id.clone()),
        );
    }

    let storage_ctx = StorageAggregateContext {
        pod_lookup: &pod_lookup,
        node_labels: &node_labels,
        namespace_labels: &namespace_labels,
        cost_categories: CostCategoryMatcher::new(metadata.cost_category_patterns()),
        allow_set: &allow_set,
        report_period_id: None,
        cluster_id: request.cluster_id.clone(),
        cluster_alias: request.cluster_id.clone(),
        year: request.year,
        month: request.month,
    };
    let _timer = StageMetrics::start("c6_storage_aggregate");
    let storage_rows = aggregate_storage(&storage_rows_raw, &storage_ctx, &mut audit);
    StageMetrics::record_rows_out("c6_storage_aggregate", storage_rows.len() as u64);
    drop(_timer);

    let _timer = StageMetrics::start("c7_unallocated");
    let unallocated_rows = synthesise_unallocated(&output_rows, metadata, &mut audit);
    StageMetrics::record_rows_out("c7_unallocated", unallocated_rows.len() as u64);
    drop(_timer);

    output_rows.extend(storage_rows);
    output_rows.extend(unallocated_rows);

    let _timer = StageMetrics::start("c2_persist_container_summary");
    let rows_persisted = persist_container_summary(sink, &output_rows).await?;
    drop(_timer);

    Ok(ContainerOnlyOutcome { rows_persisted, audit })
}

/// C8-C13: the container-on-cloud attribution engine. Reads the same
/// container-side partitions as [`run_container_only`] plus the cloud
/// billing partition for `request.cloud_provider_id`, resolves a resource or
/// tag match for every cloud row, attributes cost, and bulk-appends both the
/// per-row output and the eight roll-up tables.
pub async fn run_container_on_cloud(
    request: &RunRequest,
    reader: &dyn DatasetReader,
    sink: &dyn RelationalSink,
    metadata: &MetadataSnapshot,
) -> EngineResult<ContainerOnCloudOutcome> {
    let cloud_provider_id = request
        .cloud_provider_id
        .ok_or_else(|| EngineError::Configuration("container-on-cloud run requires --cloud-provider-id".to_string()))?;

    let mut audit = AuditLog::new();
    let tenant = request.tenant_id.as_str();
    let ocp_partition = partition_for(request.ocp_provider_id, request);
    let bounds = partition_bounds(&ocp_partition)?;
    let cloud_partition = partition_for(cloud_provider_id, request);
    let allow_set = metadata.enabled_tag_keys().to_vec();

    let _timer = StageMetrics::start("c4_capacity");
    let hourly_pods: Vec<PodLineItem> = read_and_decode(reader, tenant, DatasetKind::PodHourly, &ocp_partition, decode::decode_pod_batch)
        .await?
        .into_iter()
        .filter(|r| !r.node.is_empty())
        .collect();
    let (node_daily_cap, _cluster_daily_cap) = compute_capacity(&hourly_pods, &mut audit);
    drop(_timer);
    let node_daily_cap_map: HashMap<(NaiveDate, String), _> = node_daily_cap.into_iter().map(|c| ((c.day, c.node.clone()), c)).collect();

    let daily_pods: Vec<PodLineItem> = read_and_decode(reader, tenant, DatasetKind::PodDaily, &ocp_partition, decode::decode_pod_batch)
        .await?
        .into_iter()
        .filter(|r| !r.node.is_empty() && in_bounds(r.interval_start, bounds))
        .collect();
    let storage_rows: Vec<StorageLineItem> = read_and_decode(reader, tenant, DatasetKind::StorageDaily, &ocp_partition, decode::decode_storage_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();

    let node_labels_raw: Vec<NodeLabelLineItem> = read_and_decode(reader, tenant, DatasetKind::NodeLabelsDaily, &ocp_partition, decode::decode_node_label_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();
    let namespace_labels_raw: Vec<NamespaceLabelLineItem> = read_and_decode(reader, tenant, DatasetKind::NamespaceLabelsDaily, &ocp_partition, decode::decode_namespace_label_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.interval_start, bounds))
        .collect();

    // C9's tag matcher needs one label set per entity, not per (entity,
    // day); later days win on conflict, matching the right-biased merge
    // rule C3's label kernel uses everywhere else.
    let node_labels: HashMap<String, LabelMap> = {
        let mut rows = node_labels_raw.clone();
        rows.sort_by_key(|r| r.interval_start);
        rows.into_iter()
            .map(|r| (r.node, labels::filter(labels::parse(r.labels.as_deref(), &mut audit), &allow_set)))
            .collect()
    };
    let namespace_labels: HashMap<String, LabelMap> = {
        let mut rows = namespace_labels_raw.clone();
        rows.sort_by_key(|r| r.interval_start);
        rows.into_iter()
            .map(|r| (r.namespace, labels::filter(labels::parse(r.labels.as_deref(), &mut audit), &allow_set)))
            .collect()
    };

    let nodes: Vec<NodeResource> = metadata
        .nodes()
        .map(|(node, resource_id)| NodeResource { node: node.to_string(), resource_id: resource_id.to_string() })
        .collect();

    let mut seen_volumes: HashSet<String> = HashSet::new();
    let mut volumes: Vec<VolumeResource> = Vec::new();
    for row in &storage_rows {
        if seen_volumes.insert(row.persistentvolume.clone()) {
            volumes.push(VolumeResource {
                persistentvolume: row.persistentvolume.clone(),
                csi_volume_handle: row.csi_volume_handle.clone(),
                persistentvolumeclaim: row.persistentvolumeclaim.clone(),
                namespace: row.namespace.clone(),
            });
        }
    }
    let resource_matcher = ResourceMatcher::new(&nodes, &volumes);

    let cluster_ids: HashSet<String> = request.cluster_id.iter().cloned().collect();
    let cluster_aliases: HashSet<String> = request.cluster_id.iter().cloned().collect();
    let observed_nodes: HashSet<String> = daily_pods.iter().map(|r| r.node.clone()).collect();
    let observed_namespaces: HashSet<String> = daily_pods
        .iter()
        .map(|r| r.namespace.clone())
        .chain(storage_rows.iter().map(|r| r.namespace.clone()))
        .collect();

    let mut label_pairs: HashSet<(String, String)> = HashSet::new();
    for row in &daily_pods {
        let map = labels::filter(labels::parse(row.pod_labels.as_deref(), &mut audit), &allow_set);
        label_pairs.extend(map);
    }
    for row in &storage_rows {
        for labels_json in [&row.persistentvolume_labels, &row.persistentvolumeclaim_labels] {
            let map = labels::filter(labels::parse(labels_json.as_deref(), &mut audit), &allow_set);
            label_pairs.extend(map);
        }
    }
    let observed_keys = ObservedContainerKeys {
        cluster_ids: &cluster_ids,
        cluster_aliases: &cluster_aliases,
        nodes: &observed_nodes,
        namespaces: &observed_namespaces,
        label_pairs: &label_pairs,
    };

    let node_ratios = compute_node_ratios(&daily_pods, &node_daily_cap_map, request.cost_distribution);
    let (pvc_capacity_by_pv_day, volume_owner_namespace) = build_storage_indexes(&storage_rows);

    let _timer = StageMetrics::start("c1_cloud_read");
    let cloud_rows: Vec<CloudBillingLineItem> = read_and_decode_materialized(reader, tenant, DatasetKind::CloudHourlyDaily, &cloud_partition, decode::decode_cloud_batch)
        .await?
        .into_iter()
        .filter(|r| in_bounds(r.usage_start, bounds))
        .collect();
    StageMetrics::record_rows_in("c1_cloud_read", cloud_rows.len() as u64);
    drop(_timer);

    // C10: disk capacity needs the cloud cost matched to a volume first
    // (only the CSI-handle match kind identifies a storage product's own
    // billing row; PV-name matches are container-side only).
    let _timer = StageMetrics::start("c10_disk_capacity");
    let mut matched_storage_costs: Vec<MatchedStorageCost> = Vec::new();
    for row in &cloud_rows {
        let matches = resource_matcher.matches(&row.lineitem_resourceid, &mut audit);
        let Some(csi_match) = matches.iter().find(|m| m.match_kind == MatchKind::CsiVolume) else {
            continue;
        };
        if let Some(volume) = volumes.iter().find(|v| v.csi_volume_handle.as_deref() == Some(csi_match.match_key.as_str())) {
            matched_storage_costs.push(MatchedStorageCost {
                persistentvolume: volume.persistentvolume.clone(),
                day: row.usage_start.date(),
                unblended_cost: row.lineitem_unblendedcost,
                unblended_rate: row.lineitem_unblendedrate,
            });
        }
    }
    let disk_capacity_by_pv_day: HashMap<(String, NaiveDate), Decimal> = compute_disk_capacity(&matched_storage_costs, request.year, request.month, &mut audit)
        .into_iter()
        .map(|r| ((r.persistentvolume, r.day), r.capacity_gb))
        .collect();
    drop(_timer);

    let ctx = AttributionContext {
        resource_matcher: &resource_matcher,
        observed_keys: &observed_keys,
        node_ratios: &node_ratios,
        node_labels: &node_labels,
        namespace_labels: &namespace_labels,
        pvc_capacity_by_pv_day: &pvc_capacity_by_pv_day,
        volume_owner_namespace: &volume_owner_namespace,
        disk_capacity_by_pv_day: &disk_capacity_by_pv_day,
        allow_set: &allow_set,
        markup_rate: request.markup_rate.unwrap_or(Decimal::ZERO),
    };

    let _timer = StageMetrics::start("c12_cost_attribute");
    let mut attributed_rows = Vec::new();
    for row in &cloud_rows {
        attributed_rows.extend(attribute_row(row, &ctx, &mut audit));
    }
    StageMetrics::record_rows_out("c12_cost_attribute", attributed_rows.len() as u64);
    drop(_timer);

    let _timer = StageMetrics::start("c2_persist_container_on_cloud");
    let container_on_cloud_rows_persisted = persist_container_on_cloud(sink, &attributed_rows).await?;
    drop(_timer);

    let _timer = StageMetrics::start("c13_aggregate");
    let rollup_counts = ocp_aggregates::persist_all(sink, &attributed_rows).await?;
    StageMetrics::record_rows_out("c13_aggregate", rollup_counts.total());
    drop(_timer);

    Ok(ContainerOnCloudOutcome {
        attributed_rows: attributed_rows.len(),
        container_on_cloud_rows_persisted,
        rollup_rows_persisted: rollup_counts.total(),
        audit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_bounds_excludes_next_month() {
        let bounds = (NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(), NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
        let inside = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let outside = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(in_bounds(inside, bounds));
        assert!(!in_bounds(outside, bounds));
    }

    #[test]
    fn partition_for_applies_the_requested_days() {
        let request = RunRequest {
            tenant_id: "acme".into(),
            ocp_provider_id: Uuid::nil(),
            cloud_provider_id: None,
            year: 2026,
            month: 7,
            days: Some(vec![5, 6]),
            cluster_id: None,
            markup_rate: None,
            cost_distribution: ocp_model::CostDistribution::default(),
        };
        let partition = partition_for(Uuid::nil(), &request);
        let bounds = partition_bounds(&partition).unwrap();
        assert_eq!(bounds, (NaiveDate::from_ymd_opt(2026, 7, 5).unwrap(), NaiveDate::from_ymd_opt(2026, 7, 7).unwrap()));
    }
}
