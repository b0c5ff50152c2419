//! Shared types for the container/cloud cost aggregation engine: input and
//! output row shapes, the partition/dataset vocabulary, decimal helpers, and
//! the error taxonomy every other `ocp-*` crate builds on.

pub mod dataset;
pub mod decimal;
pub mod error;
pub mod invocation;
pub mod metadata;
pub mod records;

pub use dataset::{DatasetKind, PartitionKey};
pub use error::{AuditKind, AuditLog, AuditRecord, EngineError, EngineResult};
pub use invocation::{CostDistribution, RunRequest};
pub use metadata::{CostCategoryPattern, MetadataSnapshot, NodeRole};
pub use records::{
    CloudBillingLineItem, ContainerOnCloudRow, ContainerSummaryRow, DataSource, NamespaceLabelLineItem,
    NodeLabelLineItem, PodLineItem, StorageLineItem,
};
