//! An explicit chunk iterator over decoded Parquet row groups.
//!
//! Spec.md §9 calls for lazy object reads to be expressed as "an explicit
//! chunk iterator with `next_chunk()` returning an end-of-stream sentinel"
//! rather than a hidden suspension/generator. `parquet`'s async reader
//! already yields a `futures::Stream` of `RecordBatch`; `ChunkIterator`
//! wraps that stream so callers drive it with an explicit `next_chunk()`
//! call instead of `for await`-style iteration.

use arrow::record_batch::RecordBatch;
use futures::{Stream, StreamExt};
use ocp_model::EngineResult;
use std::pin::Pin;

type BatchStream = Pin<Box<dyn Stream<Item = EngineResult<RecordBatch>> + Send>>;

pub struct ChunkIterator {
    inner: BatchStream,
}

impl ChunkIterator {
    pub fn new(inner: BatchStream) -> Self {
        Self { inner }
    }

    /// Returns the next chunk, or `None` at end of stream (the sentinel).
    pub async fn next_chunk(&mut self) -> EngineResult<Option<RecordBatch>> {
        self.inner.next().await.transpose()
    }

    /// Drains every remaining chunk into a single materialised batch list.
    /// Used for the cloud side of a container-on-cloud run, which spec.md §5
    /// requires to be fully materialised regardless of the container side's
    /// streaming mode.
    pub async fn collect_all(mut self) -> EngineResult<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.next_chunk().await? {
            batches.push(batch);
        }
        Ok(batches)
    }
}
