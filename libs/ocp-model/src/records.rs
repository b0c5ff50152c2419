//! Row types for spec.md §3 ("Data model"). Plain structs, not dynamic maps
//! — mirrors `domain_finops::models::CloudResource` and friends: typed
//! fields, `Debug, Clone, Serialize, Deserialize` derives, nothing dynamic.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hourly or daily pod line-item. The two datasets share this schema (spec.md
/// §3 "Daily variant exists with the same schema"); which partition was read
/// is tracked by the caller via `DatasetKind`, not by the row shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodLineItem {
    pub interval_start: NaiveDateTime,
    pub source: Uuid,
    pub namespace: String,
    /// Empty string rows are excluded per spec.md I1/P6 — callers filter on
    /// `node.is_empty()` before these rows ever reach a stage.
    pub node: String,
    pub pod: String,
    pub resource_id: String,
    pub pod_labels: Option<String>,
    pub pod_usage_cpu_core_seconds: i64,
    pub pod_request_cpu_core_seconds: i64,
    pub pod_limit_cpu_core_seconds: i64,
    pub pod_effective_usage_cpu_core_seconds: Option<i64>,
    pub pod_usage_memory_byte_seconds: i64,
    pub pod_request_memory_byte_seconds: i64,
    pub pod_limit_memory_byte_seconds: i64,
    pub pod_effective_usage_memory_byte_seconds: Option<i64>,
    pub node_capacity_cpu_cores: f64,
    pub node_capacity_memory_bytes: i64,
    pub node_capacity_cpu_core_seconds: i64,
    pub node_capacity_memory_byte_seconds: i64,
}

/// Hourly (or daily) storage line-item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageLineItem {
    pub interval_start: NaiveDateTime,
    pub source: Uuid,
    pub namespace: String,
    pub pod: String,
    pub persistentvolumeclaim: String,
    pub persistentvolume: String,
    pub storageclass: Option<String>,
    pub csi_volume_handle: Option<String>,
    pub persistentvolumeclaim_capacity_bytes: i64,
    pub volume_request_storage_byte_seconds: i64,
    pub persistentvolumeclaim_usage_byte_seconds: i64,
    pub persistentvolume_labels: Option<String>,
    pub persistentvolumeclaim_labels: Option<String>,
}

/// Node-label daily line-item: the authoritative source of node-level labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLabelLineItem {
    pub interval_start: NaiveDateTime,
    pub node: String,
    pub labels: Option<String>,
}

/// Namespace-label daily line-item: the authoritative source of
/// namespace-level labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceLabelLineItem {
    pub interval_start: NaiveDateTime,
    pub namespace: String,
    pub labels: Option<String>,
}

/// Cloud billing line-item (hourly or daily, depending on provider export
/// granularity — treated uniformly here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudBillingLineItem {
    pub usage_start: NaiveDateTime,
    pub source: Uuid,
    pub lineitem_resourceid: String,
    pub lineitem_usageaccountid: String,
    pub lineitem_productcode: String,
    pub product_productfamily: Option<String>,
    pub product_instancetype: Option<String>,
    pub product_region: Option<String>,
    pub lineitem_availabilityzone: Option<String>,
    pub lineitem_usagetype: String,
    pub lineitem_operation: String,
    pub lineitem_usageamount: Decimal,
    pub lineitem_unblendedcost: Decimal,
    pub lineitem_unblendedrate: Decimal,
    pub lineitem_blendedcost: Decimal,
    pub savingsplan_savingsplaneffectivecost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub lineitem_currencycode: String,
    pub pricing_unit: Option<String>,
    pub resourcetags: Option<String>,
    pub costcategory: Option<String>,
    pub bill_billingentity: Option<String>,
    pub lineitem_lineitemtype: String,
}

/// `data_source` discriminator shared by both output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum DataSource {
    Pod,
    Storage,
}

/// Output daily summary (container) — spec.md §3 "Output daily summary
/// (container)". One row per (usage_start, namespace, node, resource_id,
/// source, merged_label_set, data_source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummaryRow {
    pub data_source: DataSource,
    pub usage_start: NaiveDate,
    pub usage_end: NaiveDate,
    pub report_period_id: Option<i64>,
    pub cluster_id: Option<String>,
    pub cluster_alias: Option<String>,
    pub source: Uuid,
    pub year: String,
    /// Zero-padded to width 2 (spec.md P9).
    pub month: String,
    /// `NULL` only for the unallocated-capacity rows C7 synthesises for a
    /// node whose role is unknown (spec.md §4.7's `CASE ... ELSE NULL`).
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub resource_id: Option<String>,
    pub pod_labels: String,

    pub pod_usage_cpu_core_hours: Option<f64>,
    pub pod_request_cpu_core_hours: Option<f64>,
    pub pod_limit_cpu_core_hours: Option<f64>,
    pub pod_effective_usage_cpu_core_hours: Option<f64>,
    pub pod_usage_memory_gigabyte_hours: Option<f64>,
    pub pod_request_memory_gigabyte_hours: Option<f64>,
    pub pod_limit_memory_gigabyte_hours: Option<f64>,
    pub pod_effective_usage_memory_gigabyte_hours: Option<f64>,

    pub node_capacity_cpu_cores: Option<f64>,
    pub node_capacity_memory_gigabytes: Option<f64>,
    pub node_capacity_cpu_core_hours: Option<f64>,
    pub node_capacity_memory_gigabyte_hours: Option<f64>,
    pub cluster_capacity_cpu_core_hours: Option<f64>,
    pub cluster_capacity_memory_gigabyte_hours: Option<f64>,

    pub persistentvolumeclaim_capacity_gigabyte: Option<f64>,
    pub persistentvolumeclaim_capacity_gigabyte_months: Option<f64>,
    pub volume_request_storage_gigabyte_months: Option<f64>,
    pub persistentvolumeclaim_usage_gigabyte_months: Option<f64>,
    pub persistentvolumeclaim: Option<String>,
    pub persistentvolume: Option<String>,
    pub storageclass: Option<String>,
    pub csi_volume_handle: Option<String>,

    pub cost_category_id: Option<i32>,
    pub infrastructure_usage_cost: String,
}

/// Output daily summary (container-on-cloud) — spec.md §3 "Output daily
/// summary (container-on-cloud)". This is the attributed, per-project row
/// that C12 emits and C13 rolls up; it is not persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerOnCloudRow {
    pub usage_start: NaiveDate,
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub resource_id: Option<String>,
    pub usage_account_id: String,
    pub product_code: String,
    pub product_family: Option<String>,
    pub instance_type: Option<String>,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub pricing_unit: Option<String>,
    pub currency_code: String,

    pub labels: String,
    pub data_source: DataSource,
    pub data_transfer_direction: Option<String>,

    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,

    pub resource_id_matched: bool,
    pub matched_tag: Option<String>,
}
