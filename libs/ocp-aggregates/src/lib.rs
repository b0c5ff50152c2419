//! Aggregation materialiser (C13, spec.md §4.13): turns the attributed
//! `ContainerOnCloudRow`s emitted by `ocp_attribution` into the eight
//! reporting roll-ups and bulk-loads them the same way `ocp_sink` loads the
//! two line-item tables — CSV-encode, then `COPY FROM STDIN` via the
//! `RelationalSink` trait.

pub mod persist;
pub mod rollup;

pub use persist::persist_all;
pub use rollup::{
    materialise_by_account, materialise_by_region, materialise_by_service, materialise_compute_summary,
    materialise_cost_summary, materialise_database_summary, materialise_network_summary,
    materialise_storage_summary, ByAccountRow, ByRegionRow, ByServiceRow, ComputeSummaryRow, CostSummaryRow,
    DatabaseSummaryRow, NetworkSummaryRow, StorageSummaryRow,
};
