//! The `DatasetReader` trait (C1 contract, spec.md §4.1).

use async_trait::async_trait;
use database::common::retry::{retry_with_backoff, RetryConfig};
use object_store::{path::Path, ObjectMeta, ObjectStore};
use ocp_model::{DatasetKind, EngineError, EngineResult, PartitionKey};
use std::sync::Arc;
use tracing::warn;

use crate::chunk::ChunkIterator;

/// `<tenant>/source=<id>/year=<YYYY>/month=<MM>/` object-name prefix mapping
/// is opaque to the engine core per spec.md §6; this is the one place that
/// knows it. Each `DatasetKind` corresponds to a fixed object-name prefix
/// under the partition directory.
pub fn path_for(tenant: &str, dataset: DatasetKind, partition: &PartitionKey) -> Path {
    let dataset_prefix = match dataset {
        DatasetKind::PodHourly => "pod_usage_hourly",
        DatasetKind::PodDaily => "pod_usage_daily",
        DatasetKind::StorageDaily => "storage_usage_daily",
        DatasetKind::NodeLabelsDaily => "node_labels_daily",
        DatasetKind::NamespaceLabelsDaily => "namespace_labels_daily",
        DatasetKind::CloudHourlyDaily => "cloud_billing",
    };
    let source = partition.source;
    let segment = partition.prefix_segment();
    Path::from(format!("{tenant}/source={source}/{segment}/{dataset_prefix}"))
}

/// Contract: `read(dataset, source, year, month, day_range, columns?) →
/// tabular chunk(s)` — spec.md §4.1. Implementations guarantee returned rows
/// satisfy the coarse partition prune; the row-wise `interval_start` bound
/// (I8) is enforced by the `decode` layer that consumes the returned chunks.
#[async_trait]
pub trait DatasetReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a chunked read over `dataset`'s partition. When `columns` is
    /// `Some`, no other columns are materialised out of the Parquet file
    /// (column projection pushed down to the reader, not filtered after the
    /// fact).
    async fn open_chunks(
        &self,
        tenant: &str,
        dataset: DatasetKind,
        partition: &PartitionKey,
        columns: Option<&[&str]>,
    ) -> EngineResult<ChunkIterator>;
}

/// Shared backend-agnostic implementation every per-cloud reader delegates
/// to: object_store already abstracts S3/Azure/GCS behind one trait, so the
/// enumerate-then-stream-Parquet logic lives here once.
pub(crate) struct ObjectStoreCore {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) retry: RetryConfig,
    /// Row-group read batch size (`mode.chunk_rows`, spec.md §6/§5); how many
    /// rows `next_chunk()` yields at a time during a streaming read.
    pub(crate) batch_size: usize,
}

const DEFAULT_BATCH_SIZE: usize = 100_000;

impl ObjectStoreCore {
    pub(crate) fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub(crate) fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// List every Parquet object under a partition prefix, retried with
    /// exponential backoff (spec.md §4.1 "network errors are retried with
    /// exponential backoff up to a configured ceiling, then surfaced as
    /// `Transient`"), generalising
    /// `database::common::retry::retry_with_backoff` beyond DB connects per
    /// SPEC_FULL.md §10.
    async fn list_partition(&self, prefix: &Path) -> EngineResult<Vec<ObjectMeta>> {
        let store = Arc::clone(&self.store);
        let prefix = prefix.clone();
        let listing = retry_with_backoff(
            || {
                let store = Arc::clone(&store);
                let prefix = prefix.clone();
                async move {
                    use futures::TryStreamExt;
                    store.list(Some(&prefix)).try_collect::<Vec<_>>().await
                }
            },
            self.retry.clone(),
        )
        .await;

        match listing {
            Ok(objects) if objects.is_empty() => Err(EngineError::Corrupt(format!(
                "no objects found under partition prefix {prefix}"
            ))),
            Ok(objects) => Ok(objects),
            Err(object_store::Error::NotFound { path, .. }) => {
                Err(EngineError::Corrupt(format!("object not found: {path}")))
            }
            Err(e) => {
                warn!(error = %e, "object-store listing exhausted retries");
                Err(EngineError::Transient(e.to_string()))
            }
        }
    }

    pub(crate) async fn open_chunks(
        &self,
        tenant: &str,
        dataset: DatasetKind,
        partition: &PartitionKey,
        columns: Option<&[&str]>,
    ) -> EngineResult<ChunkIterator> {
        let prefix = path_for(tenant, dataset, partition);
        let objects = self.list_partition(&prefix).await?;

        let column_names: Option<Vec<String>> =
            columns.map(|c| c.iter().map(|s| s.to_string()).collect());
        let store = Arc::clone(&self.store);

        let stream = crate::decode::stream_parquet_objects(store, objects, column_names, self.batch_size);
        Ok(ChunkIterator::new(Box::pin(stream)))
    }
}
