//! Cost attributor (C12, spec.md §4.12): the state machine that turns a
//! matched cloud row into one or more attributed `ContainerOnCloudRow`s.
//!
//! ```text
//! INITIAL -> tried_resource_match -> (matched | unmatched_resource)
//! unmatched_resource -> tried_tag_match -> (matched_by_tag | unmatched)
//! matched -> attributed -> emitted
//! matched_by_tag -> attributed_by_tag -> emitted
//! unmatched -> dropped_with_audit
//! ```
//!
//! Network rows (C11) and tax line-items short-circuit this state machine:
//! the former always resolves via node resource-match, the latter is a
//! pass-through with no matching at all.

use std::collections::HashMap;

use chrono::NaiveDate;
use ocp_container::LabelMap;
use ocp_model::{AuditKind, AuditLog, CloudBillingLineItem, ContainerOnCloudRow, CostDistribution, DataSource, StorageLineItem};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::network::{self, NETWORK_UNATTRIBUTED_NAMESPACE};
use crate::resource_match::{MatchKind, ResourceMatch, ResourceMatcher};
use crate::tag_match::{match_tags, MatchedTarget, ObservedContainerKeys, TagMatch};

pub const STORAGE_UNATTRIBUTED_NAMESPACE: &str = "Storage unattributed";

const SAVINGS_PLAN_COVERED_USAGE: &str = "SavingsPlanCoveredUsage";
const TAX_LINE_ITEM: &str = "Tax";
const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// Per-(day, node) sum of `r_pod`, both overall and broken down by
/// namespace, used to split a matched compute row across namespaces.
#[derive(Default)]
pub struct NodeRatios {
    total: f64,
    by_namespace: HashMap<String, f64>,
}

#[derive(Default)]
struct PodUsage {
    cpu_seconds: i64,
    memory_byte_seconds: i64,
}

/// Builds per-(day, node) attribution ratios from pod usage and C4 capacity.
/// `r_pod` is selected by `distribution` (spec.md §6 `cost.distribution`):
/// `Cpu`/`Memory` take their respective share outright, `Max` takes the
/// larger of the two. Always clamped to `[0, 1]`; namespace totals and the
/// node-wide total are both kept since C12 needs the ratio of one to the
/// other.
pub fn compute_node_ratios(
    pod_rows: &[ocp_model::PodLineItem],
    node_daily_cap: &HashMap<(NaiveDate, String), ocp_container::NodeDailyCapacity>,
    distribution: CostDistribution,
) -> HashMap<(NaiveDate, String), NodeRatios> {
    let mut per_pod: HashMap<(NaiveDate, String, String, String), PodUsage> = HashMap::new();
    for row in pod_rows {
        if row.node.is_empty() {
            continue;
        }
        let day = row.interval_start.date();
        let key = (day, row.node.clone(), row.namespace.clone(), row.pod.clone());
        let usage = per_pod.entry(key).or_default();
        usage.cpu_seconds += row.pod_usage_cpu_core_seconds;
        usage.memory_byte_seconds += row.pod_usage_memory_byte_seconds;
    }

    let mut out: HashMap<(NaiveDate, String), NodeRatios> = HashMap::new();
    for ((day, node, namespace, _pod), usage) in per_pod {
        let Some(cap) = node_daily_cap.get(&(day, node.clone())) else {
            continue;
        };
        let cpu_share = if cap.cpu_core_seconds > 0 {
            usage.cpu_seconds as f64 / cap.cpu_core_seconds as f64
        } else {
            0.0
        };
        let memory_share = if cap.memory_byte_seconds > 0 {
            usage.memory_byte_seconds as f64 / cap.memory_byte_seconds as f64
        } else {
            0.0
        };
        let ratio = match distribution {
            CostDistribution::Cpu => cpu_share,
            CostDistribution::Memory => memory_share,
            CostDistribution::Max => cpu_share.max(memory_share),
        }
        .clamp(0.0, 1.0);

        let node_ratios = out.entry((day, node)).or_default();
        node_ratios.total += ratio;
        *node_ratios.by_namespace.entry(namespace).or_insert(0.0) += ratio;
    }
    out
}

/// Per-`(persistentvolume, day)` PVC capacity by owning namespace, and the
/// first-observed owning namespace per volume (for the PV-name-only match
/// path, which has no per-PVC ratio to split).
pub fn build_storage_indexes(
    storage_rows: &[StorageLineItem],
) -> (HashMap<(String, NaiveDate), Vec<(String, i64)>>, HashMap<String, String>) {
    let mut pvc_capacity: HashMap<(String, NaiveDate), HashMap<String, i64>> = HashMap::new();
    let mut owner: HashMap<String, String> = HashMap::new();
    for row in storage_rows {
        let day = row.interval_start.date();
        pvc_capacity
            .entry((row.persistentvolume.clone(), day))
            .or_default()
            .insert(row.namespace.clone(), row.persistentvolumeclaim_capacity_bytes);
        owner.entry(row.persistentvolume.clone()).or_insert_with(|| row.namespace.clone());
    }
    let pvc_capacity = pvc_capacity.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect();
    (pvc_capacity, owner)
}

pub struct AttributionContext<'a> {
    pub resource_matcher: &'a ResourceMatcher<'a>,
    pub observed_keys: &'a ObservedContainerKeys<'a>,
    pub node_ratios: &'a HashMap<(NaiveDate, String), NodeRatios>,
    pub node_labels: &'a HashMap<String, LabelMap>,
    pub namespace_labels: &'a HashMap<String, LabelMap>,
    pub pvc_capacity_by_pv_day: &'a HashMap<(String, NaiveDate), Vec<(String, i64)>>,
    pub volume_owner_namespace: &'a HashMap<String, String>,
    pub disk_capacity_by_pv_day: &'a HashMap<(String, NaiveDate), Decimal>,
    pub allow_set: &'a [String],
    pub markup_rate: Decimal,
}

/// Runs one cloud row through the C12 state machine, returning zero or more
/// attributed rows (zero only for `dropped_with_audit`).
pub fn attribute_row(row: &CloudBillingLineItem, ctx: &AttributionContext, audit: &mut AuditLog) -> Vec<ContainerOnCloudRow> {
    if row.lineitem_lineitemtype == TAX_LINE_ITEM {
        return vec![build_row(row, Decimal::ONE, None, None, None, false, None, None, DataSource::Pod, String::new(), ctx.markup_rate)];
    }

    if network::is_network_row(row) {
        return attribute_network_row(row, ctx, audit);
    }

    let matches = ctx.resource_matcher.matches(&row.lineitem_resourceid, audit);
    if let Some(node_match) = matches.iter().find(|m| m.match_kind == MatchKind::Node) {
        return match resolve_node(&node_match.match_key, ctx) {
            Some(node) => attribute_compute_row(row, &node, ctx, audit),
            None => {
                audit.push(
                    AuditKind::UnattributedCloudRowDropped,
                    format!("matched resource id '{}' did not resolve to a known node", node_match.match_key),
                );
                Vec::new()
            }
        };
    }
    if let Some(volume_match) = matches.iter().find(|m| matches!(m.match_kind, MatchKind::CsiVolume | MatchKind::PvName)) {
        return attribute_storage_row(row, volume_match, ctx, audit);
    }

    let tags = ocp_container::labels::filter(
        ocp_container::labels::parse(row.resourcetags.as_deref(), audit),
        ctx.allow_set,
    );
    if let Some(tag_match) = match_tags(&tags, ctx.observed_keys) {
        return vec![attribute_by_tag(row, &tag_match, &tags, ctx)];
    }

    audit.push(
        AuditKind::UnattributedCloudRowDropped,
        format!("resource id '{}' matched neither resource nor tag", row.lineitem_resourceid),
    );
    Vec::new()
}

fn attribute_network_row(row: &CloudBillingLineItem, ctx: &AttributionContext, audit: &mut AuditLog) -> Vec<ContainerOnCloudRow> {
    let matches = ctx.resource_matcher.matches(&row.lineitem_resourceid, audit);
    let node_match = matches.iter().find(|m| m.match_kind == MatchKind::Node).and_then(|m| resolve_node(&m.match_key, ctx));
    let Some(node) = node_match else {
        audit.push(
            AuditKind::UnattributedCloudRowDropped,
            format!("network row '{}' has no matched node", row.lineitem_resourceid),
        );
        return Vec::new();
    };
    let direction = network::classify_direction(&row.lineitem_usagetype, &row.lineitem_operation).map(str::to_string);
    let labels = canonical_node_labels(&node, ctx);
    vec![build_row(
        row,
        Decimal::ONE,
        Some(NETWORK_UNATTRIBUTED_NAMESPACE.to_string()),
        Some(node),
        Some(row.lineitem_resourceid.clone()),
        true,
        None,
        direction,
        DataSource::Pod,
        labels,
        ctx.markup_rate,
    )]
}

/// Key `costcategory` (spec.md §3 documents it as JSON, same shape as
/// `resourcetags`) carries the namespace the tie-breaker below attributes to,
/// mirroring the well-known-key convention `tag_match::match_tags` already
/// uses to pull a namespace out of `resourcetags`.
const COST_CATEGORY_NAMESPACE_KEY: &str = "openshift_project";

fn attribute_compute_row(
    row: &CloudBillingLineItem,
    node: &str,
    ctx: &AttributionContext,
    audit: &mut AuditLog,
) -> Vec<ContainerOnCloudRow> {
    let day = row.usage_start.date();
    let ratios = ctx.node_ratios.get(&(day, node.to_string()));
    let total = ratios.map(|r| r.total).unwrap_or(0.0);

    if total <= 0.0 {
        // Tie-breaker (spec.md §4.12 step 4): no usage on the node at all,
        // attribute wholly to the row's own cost-category tag, falling back
        // to `Platform unallocated`. `costcategory` is JSON like
        // `resourcetags`, so it goes through the same parse/filter path
        // rather than being used as a raw string.
        let category_tags = ocp_container::labels::parse(row.costcategory.as_deref(), audit);
        let namespace = category_tags
            .get(COST_CATEGORY_NAMESPACE_KEY)
            .cloned()
            .unwrap_or_else(|| ocp_container::unallocated::PLATFORM_UNALLOCATED.to_string());
        let labels = canonical_node_labels(node, ctx);
        return vec![build_row(
            row,
            Decimal::ONE,
            Some(namespace),
            Some(node.to_string()),
            Some(row.lineitem_resourceid.clone()),
            true,
            None,
            None,
            DataSource::Pod,
            labels,
            ctx.markup_rate,
        )];
    }

    let by_namespace = &ratios.unwrap().by_namespace;
    let mut out = Vec::with_capacity(by_namespace.len());
    for (namespace, sum_ns) in by_namespace {
        let fraction = Decimal::from_f64(sum_ns / total).unwrap_or(Decimal::ZERO);
        let labels = canonical_labels(node, namespace, ctx);
        out.push(build_row(
            row,
            fraction,
            Some(namespace.clone()),
            Some(node.to_string()),
            Some(row.lineitem_resourceid.clone()),
            true,
            None,
            None,
            DataSource::Pod,
            labels,
            ctx.markup_rate,
        ));
    }
    out
}

/// `ResourceMatch::match_key` for `MatchKind::Node` is the matched
/// `resource_id` (see resource_match.rs), not the node name; resolve it back
/// to the owning node since `node_ratios`/`node_labels` and the output row
/// are keyed by node name.
fn resolve_node(resource_id: &str, ctx: &AttributionContext) -> Option<String> {
    ctx.resource_matcher.nodes().iter().find(|n| n.resource_id == resource_id).map(|n| n.node.clone())
}

fn resolve_persistentvolume(volume_match: &ResourceMatch, ctx: &AttributionContext) -> Option<String> {
    match volume_match.match_kind {
        MatchKind::CsiVolume => ctx
            .resource_matcher
            .volumes()
            .iter()
            .find(|v| v.csi_volume_handle.as_deref() == Some(volume_match.match_key.as_str()))
            .map(|v| v.persistentvolume.clone()),
        MatchKind::PvName => Some(volume_match.match_key.clone()),
        MatchKind::Node => None,
    }
}

fn attribute_storage_row(row: &CloudBillingLineItem, volume_match: &ResourceMatch, ctx: &AttributionContext, audit: &mut AuditLog) -> Vec<ContainerOnCloudRow> {
    let day = row.usage_start.date();
    let Some(pv) = resolve_persistentvolume(volume_match, ctx) else {
        audit.push(
            AuditKind::UnattributedCloudRowDropped,
            format!("volume match '{}' did not resolve to a persistentvolume", volume_match.match_key),
        );
        return Vec::new();
    };

    if volume_match.match_kind == MatchKind::PvName {
        return match ctx.volume_owner_namespace.get(&pv) {
            Some(namespace) => {
                let labels = canonical_namespace_labels(namespace, ctx);
                vec![build_row(row, Decimal::ONE, Some(namespace.clone()), None, Some(pv), true, None, None, DataSource::Storage, labels, ctx.markup_rate)]
            }
            None => vec![build_row(row, Decimal::ONE, Some(STORAGE_UNATTRIBUTED_NAMESPACE.to_string()), None, Some(pv), true, None, None, DataSource::Storage, String::new(), ctx.markup_rate)],
        };
    }

    let disk_capacity_bytes = ctx
        .disk_capacity_by_pv_day
        .get(&(pv.clone(), day))
        .and_then(|gb| gb.to_f64())
        .unwrap_or(0.0)
        * BYTES_PER_GB;
    if disk_capacity_bytes <= 0.0 {
        return vec![build_row(row, Decimal::ONE, Some(STORAGE_UNATTRIBUTED_NAMESPACE.to_string()), None, Some(pv), true, None, None, DataSource::Storage, String::new(), ctx.markup_rate)];
    }

    let pvcs = ctx.pvc_capacity_by_pv_day.get(&(pv.clone(), day)).cloned().unwrap_or_default();
    let mut out = Vec::with_capacity(pvcs.len() + 1);
    let mut ratio_sum = 0.0;
    for (namespace, capacity_bytes) in &pvcs {
        let ratio = (*capacity_bytes as f64 / disk_capacity_bytes).clamp(0.0, 1.0);
        ratio_sum += ratio;
        let fraction = Decimal::from_f64(ratio).unwrap_or(Decimal::ZERO);
        let labels = canonical_namespace_labels(namespace, ctx);
        out.push(build_row(row, fraction, Some(namespace.clone()), None, Some(pv.clone()), true, None, None, DataSource::Storage, labels, ctx.markup_rate));
    }
    let residual = (1.0 - ratio_sum).max(0.0);
    if residual > 0.0 {
        let fraction = Decimal::from_f64(residual).unwrap_or(Decimal::ZERO);
        out.push(build_row(row, fraction, Some(STORAGE_UNATTRIBUTED_NAMESPACE.to_string()), None, Some(pv), true, None, None, DataSource::Storage, String::new(), ctx.markup_rate));
    }
    out
}

fn attribute_by_tag(row: &CloudBillingLineItem, tag_match: &TagMatch, tags: &LabelMap, ctx: &AttributionContext) -> ContainerOnCloudRow {
    let matched_value = tags.get(&tag_match.matched_tag).cloned();
    let (namespace, node, labels) = match &tag_match.target {
        MatchedTarget::Cluster | MatchedTarget::Label { .. } => (None, None, String::new()),
        MatchedTarget::Node => {
            let labels = matched_value.as_deref().map(|n| canonical_node_labels(n, ctx)).unwrap_or_default();
            (None, matched_value, labels)
        }
        MatchedTarget::Namespace(ns) => (Some(ns.clone()), None, canonical_namespace_labels(ns, ctx)),
    };

    build_row(
        row,
        Decimal::ONE,
        namespace,
        node,
        Some(row.lineitem_resourceid.clone()),
        false,
        Some(tag_match.matched_tag.clone()),
        None,
        DataSource::Pod,
        labels,
        ctx.markup_rate,
    )
}

fn canonical_node_labels(node: &str, ctx: &AttributionContext) -> String {
    let empty = LabelMap::new();
    ocp_container::labels::canonicalise(ctx.node_labels.get(node).unwrap_or(&empty))
}

fn canonical_namespace_labels(namespace: &str, ctx: &AttributionContext) -> String {
    let empty = LabelMap::new();
    ocp_container::labels::canonicalise(ctx.namespace_labels.get(namespace).unwrap_or(&empty))
}

fn canonical_labels(node: &str, namespace: &str, ctx: &AttributionContext) -> String {
    let empty = LabelMap::new();
    let node_map = ctx.node_labels.get(node).unwrap_or(&empty);
    let ns_map = ctx.namespace_labels.get(namespace).unwrap_or(&empty);
    ocp_container::labels::canonicalise(&ocp_container::labels::merge2(node_map, ns_map))
}

#[allow(clippy::too_many_arguments)]
fn build_row(
    row: &CloudBillingLineItem,
    fraction: Decimal,
    namespace: Option<String>,
    node: Option<String>,
    resource_id: Option<String>,
    resource_id_matched: bool,
    matched_tag: Option<String>,
    data_transfer_direction: Option<String>,
    data_source: DataSource,
    labels: String,
    markup_rate: Decimal,
) -> ContainerOnCloudRow {
    let is_savings_plan = row.lineitem_lineitemtype == SAVINGS_PLAN_COVERED_USAGE;
    let unblended_cost = if is_savings_plan { Decimal::ZERO } else { row.lineitem_unblendedcost * fraction };
    let blended_cost = row.lineitem_blendedcost * fraction;
    let savingsplan_effective_cost = row.savingsplan_savingsplaneffectivecost * fraction;
    let calculated_amortized_cost = row.calculated_amortized_cost * fraction;

    ContainerOnCloudRow {
        usage_start: row.usage_start.date(),
        namespace,
        node,
        resource_id,
        usage_account_id: row.lineitem_usageaccountid.clone(),
        product_code: row.lineitem_productcode.clone(),
        product_family: row.product_productfamily.clone(),
        instance_type: row.product_instancetype.clone(),
        region: row.product_region.clone(),
        availability_zone: row.lineitem_availabilityzone.clone(),
        pricing_unit: row.pricing_unit.clone(),
        currency_code: row.lineitem_currencycode.clone(),
        labels,
        data_source,
        data_transfer_direction,
        unblended_cost,
        blended_cost,
        savingsplan_effective_cost,
        calculated_amortized_cost,
        markup_unblended_cost: unblended_cost * markup_rate,
        markup_blended_cost: blended_cost * markup_rate,
        markup_savingsplan_effective_cost: savingsplan_effective_cost * markup_rate,
        markup_calculated_amortized_cost: calculated_amortized_cost * markup_rate,
        resource_id_matched,
        matched_tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_match::{NodeResource, VolumeResource};
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn base_cloud_row(resource_id: &str) -> CloudBillingLineItem {
        CloudBillingLineItem {
            usage_start: NaiveDateTime::UNIX_EPOCH,
            source: Uuid::nil(),
            lineitem_resourceid: resource_id.into(),
            lineitem_usageaccountid: "123456".into(),
            lineitem_productcode: "AmazonEC2".into(),
            product_productfamily: Some("Compute Instance".into()),
            product_instancetype: Some("m5.large".into()),
            product_region: Some("us-east-1".into()),
            lineitem_availabilityzone: None,
            lineitem_usagetype: "BoxUsage".into(),
            lineitem_operation: "RunInstances".into(),
            lineitem_usageamount: dec!(1),
            lineitem_unblendedcost: dec!(100),
            lineitem_unblendedrate: dec!(1),
            lineitem_blendedcost: dec!(100),
            savingsplan_savingsplaneffectivecost: dec!(0),
            calculated_amortized_cost: dec!(100),
            lineitem_currencycode: "USD".into(),
            pricing_unit: None,
            resourcetags: None,
            costcategory: None,
            bill_billingentity: None,
            lineitem_lineitemtype: "Usage".into(),
        }
    }

    fn empty_observed() -> (HashSet<String>, HashSet<String>, HashSet<String>, HashSet<String>, HashSet<(String, String)>) {
        (HashSet::new(), HashSet::new(), HashSet::new(), HashSet::new(), HashSet::new())
    }

    #[test]
    fn tax_line_item_passes_through_with_null_namespace() {
        let mut row = base_cloud_row("n/a");
        row.lineitem_lineitemtype = "Tax".into();
        let nodes = Vec::new();
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };
        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0.1),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].namespace, None);
        assert_eq!(out[0].unblended_cost, dec!(100));
        assert_eq!(out[0].markup_unblended_cost, dec!(10.0));
    }

    #[test]
    fn savings_plan_covered_usage_zeroes_unblended_cost() {
        let mut row = base_cloud_row("i-0abc123");
        row.lineitem_lineitemtype = SAVINGS_PLAN_COVERED_USAGE.into();
        row.savingsplan_savingsplaneffectivecost = dec!(80);
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };
        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].unblended_cost, dec!(0));
        assert_eq!(out[0].savingsplan_effective_cost, dec!(80));
    }

    #[test]
    fn zero_node_usage_attributes_to_platform_unallocated() {
        let row = base_cloud_row("i-0abc123");
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };
        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].namespace.as_deref(), Some(ocp_container::unallocated::PLATFORM_UNALLOCATED));
    }

    #[test]
    fn zero_node_usage_reads_namespace_from_costcategory_json() {
        let mut row = base_cloud_row("i-0abc123");
        row.costcategory = Some(r#"{"openshift_project":"team-a"}"#.to_string());
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };
        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn compute_row_splits_cost_proportionally_to_namespace_ratio() {
        let row = base_cloud_row("i-0abc123");
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };

        let day = row.usage_start.date();
        let mut node_ratios = HashMap::new();
        let mut by_namespace = HashMap::new();
        by_namespace.insert("team-a".to_string(), 0.3);
        by_namespace.insert("team-b".to_string(), 0.1);
        node_ratios.insert((day, "node-a".to_string()), NodeRatios { total: 0.4, by_namespace });

        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &node_ratios,
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 2);
        let total_cost: Decimal = out.iter().map(|r| r.unblended_cost).sum();
        assert_eq!(total_cost, dec!(100));
    }

    #[test]
    fn unmatched_row_is_dropped_with_audit() {
        let row = base_cloud_row("totally-unrelated");
        let nodes = Vec::new();
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };
        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &HashMap::new(),
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &HashMap::new(),
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert!(out.is_empty());
        assert_eq!(audit.count_kind(&AuditKind::UnattributedCloudRowDropped), 1);
    }

    #[test]
    fn csi_matched_storage_row_splits_by_pvc_capacity_with_residual() {
        let mut row = base_cloud_row("vol-0abcdef");
        row.lineitem_productcode = "AmazonEFS".into();
        let nodes = Vec::new();
        let volumes = vec![VolumeResource {
            persistentvolume: "pv-1".into(),
            csi_volume_handle: Some("vol-0abcdef".into()),
            persistentvolumeclaim: "pvc-1".into(),
            namespace: "team-a".into(),
        }];
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let (a, b, c, d, e) = empty_observed();
        let observed = ObservedContainerKeys { cluster_ids: &a, cluster_aliases: &b, nodes: &c, namespaces: &d, label_pairs: &e };

        let day = row.usage_start.date();
        let mut disk_capacity = HashMap::new();
        disk_capacity.insert(("pv-1".to_string(), day), dec!(100)); // 100 GB
        let mut pvc_capacity = HashMap::new();
        pvc_capacity.insert(("pv-1".to_string(), day), vec![("team-a".to_string(), 40_000_000_000i64)]); // 40 GB

        let ctx = AttributionContext {
            resource_matcher: &matcher,
            observed_keys: &observed,
            node_ratios: &HashMap::new(),
            node_labels: &HashMap::new(),
            namespace_labels: &HashMap::new(),
            pvc_capacity_by_pv_day: &pvc_capacity,
            volume_owner_namespace: &HashMap::new(),
            disk_capacity_by_pv_day: &disk_capacity,
            allow_set: &[],
            markup_rate: dec!(0),
        };
        let mut audit = AuditLog::new();
        let out = attribute_row(&row, &ctx, &mut audit);
        assert_eq!(out.len(), 2);
        let team_a = out.iter().find(|r| r.namespace.as_deref() == Some("team-a")).unwrap();
        assert_eq!(team_a.unblended_cost, dec!(40));
        let unattributed = out.iter().find(|r| r.namespace.as_deref() == Some(STORAGE_UNATTRIBUTED_NAMESPACE)).unwrap();
        assert_eq!(unattributed.unblended_cost, dec!(60));
    }
}
