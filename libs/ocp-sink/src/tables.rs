//! Target table and column name constants, spec.md §3. Kept separate from
//! `csv.rs` so the pipeline driver can reference column order without
//! pulling in the encoding code.

/// `ocp_usage_line_items` — `ocp_model::ContainerSummaryRow` (spec.md §3,
/// C5/C6/C7 output). Column order matches the struct's field order exactly.
pub const CONTAINER_SUMMARY_TABLE: &str = "ocp_usage_line_items";
pub const CONTAINER_SUMMARY_COLUMNS: &[&str] = &[
    "data_source",
    "usage_start",
    "usage_end",
    "report_period_id",
    "cluster_id",
    "cluster_alias",
    "source",
    "year",
    "month",
    "namespace",
    "node",
    "resource_id",
    "pod_labels",
    "pod_usage_cpu_core_hours",
    "pod_request_cpu_core_hours",
    "pod_limit_cpu_core_hours",
    "pod_effective_usage_cpu_core_hours",
    "pod_usage_memory_gigabyte_hours",
    "pod_request_memory_gigabyte_hours",
    "pod_limit_memory_gigabyte_hours",
    "pod_effective_usage_memory_gigabyte_hours",
    "node_capacity_cpu_cores",
    "node_capacity_memory_gigabytes",
    "node_capacity_cpu_core_hours",
    "node_capacity_memory_gigabyte_hours",
    "cluster_capacity_cpu_core_hours",
    "cluster_capacity_memory_gigabyte_hours",
    "persistentvolumeclaim_capacity_gigabyte",
    "persistentvolumeclaim_capacity_gigabyte_months",
    "volume_request_storage_gigabyte_months",
    "persistentvolumeclaim_usage_gigabyte_months",
    "persistentvolumeclaim",
    "persistentvolume",
    "storageclass",
    "csi_volume_handle",
    "cost_category_id",
    "infrastructure_usage_cost",
];

/// `ocp_on_cloud_usage_line_items` — `ocp_model::ContainerOnCloudRow`
/// (spec.md §3, C12 output). Column order matches the struct's field order.
pub const CONTAINER_ON_CLOUD_TABLE: &str = "ocp_on_cloud_usage_line_items";
pub const CONTAINER_ON_CLOUD_COLUMNS: &[&str] = &[
    "usage_start",
    "namespace",
    "node",
    "resource_id",
    "usage_account_id",
    "product_code",
    "product_family",
    "instance_type",
    "region",
    "availability_zone",
    "pricing_unit",
    "currency_code",
    "labels",
    "data_source",
    "data_transfer_direction",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "resource_id_matched",
    "matched_tag",
];

/// The eight C13 roll-up tables, spec.md §4.13. Each is a flat append target
/// with its own column set defined alongside its materialiser in
/// `ocp_aggregates`; only the table name needs to be known here.
pub const COST_SUMMARY_TABLE: &str = "ocp_cost_summary";
pub const BY_ACCOUNT_TABLE: &str = "ocp_cost_by_account";
pub const BY_SERVICE_TABLE: &str = "ocp_cost_by_service";
pub const BY_REGION_TABLE: &str = "ocp_cost_by_region";
pub const COMPUTE_SUMMARY_TABLE: &str = "ocp_compute_summary";
pub const STORAGE_SUMMARY_TABLE: &str = "ocp_storage_summary";
pub const DATABASE_SUMMARY_TABLE: &str = "ocp_database_summary";
pub const NETWORK_SUMMARY_TABLE: &str = "ocp_network_summary";

/// Supplemented audit-event table (SPEC_FULL.md §10): persists the run-scoped
/// `AuditLog` for operational visibility instead of discarding it at process
/// exit.
pub const AUDIT_EVENTS_TABLE: &str = "audit_events";
pub const AUDIT_EVENTS_COLUMNS: &[&str] =
    &["run_id", "tenant_id", "recorded_at", "kind", "detail"];
