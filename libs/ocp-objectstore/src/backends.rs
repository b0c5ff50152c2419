//! One `DatasetReader` implementation per backing object store, grounded on
//! `AwsPricingProvider` / `AzurePricingProvider` / `GcpPricingProvider` each
//! implementing `PricingProvider`. Construction differs per backend (the
//! credential shape in spec.md §6's `object_store.*` keys); the read path
//! once a store is built is identical, so all three delegate to
//! `ObjectStoreCore`.

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use ocp_model::{DatasetKind, EngineError, EngineResult, PartitionKey};
use std::sync::Arc;

use crate::chunk::ChunkIterator;
use crate::reader::{DatasetReader, ObjectStoreCore};

/// The `object_store.*` configuration keys of spec.md §6, common to every
/// backend. `endpoint` is only meaningful for S3-compatible stores that
/// aren't AWS itself (e.g. MinIO); it is ignored by the Azure/GCS builders.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub key_id: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
}

pub struct S3Reader {
    core: ObjectStoreCore,
}

impl S3Reader {
    pub fn new(config: &ObjectStoreConfig) -> EngineResult<Self> {
        Self::with_chunk_rows(config, None)
    }

    /// `chunk_rows` is `mode.chunk_rows` (spec.md §6) — how many rows a
    /// streaming read yields per `next_chunk()`. `None` keeps the reader's
    /// own default.
    pub fn with_chunk_rows(config: &ObjectStoreConfig, chunk_rows: Option<usize>) -> EngineResult<Self> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let (Some(key_id), Some(secret)) = (&config.key_id, &config.secret) {
            builder = builder.with_access_key_id(key_id).with_secret_access_key(secret);
        }
        let store = builder
            .build()
            .map_err(|e| EngineError::Configuration(format!("S3 object store: {e}")))?;
        let mut core = ObjectStoreCore::new(Arc::new(store));
        if let Some(chunk_rows) = chunk_rows {
            core = core.with_batch_size(chunk_rows);
        }
        Ok(Self { core })
    }
}

#[async_trait]
impl DatasetReader for S3Reader {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn open_chunks(
        &self,
        tenant: &str,
        dataset: DatasetKind,
        partition: &PartitionKey,
        columns: Option<&[&str]>,
    ) -> EngineResult<ChunkIterator> {
        self.core.open_chunks(tenant, dataset, partition, columns).await
    }
}

pub struct AzureReader {
    core: ObjectStoreCore,
}

impl AzureReader {
    pub fn new(config: &ObjectStoreConfig) -> EngineResult<Self> {
        Self::with_chunk_rows(config, None)
    }

    pub fn with_chunk_rows(config: &ObjectStoreConfig, chunk_rows: Option<usize>) -> EngineResult<Self> {
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(&config.bucket);
        if let Some(key_id) = &config.key_id {
            builder = builder.with_account(key_id);
        }
        if let Some(secret) = &config.secret {
            builder = builder.with_access_key(secret);
        }
        let store = builder
            .build()
            .map_err(|e| EngineError::Configuration(format!("Azure object store: {e}")))?;
        let mut core = ObjectStoreCore::new(Arc::new(store));
        if let Some(chunk_rows) = chunk_rows {
            core = core.with_batch_size(chunk_rows);
        }
        Ok(Self { core })
    }
}

#[async_trait]
impl DatasetReader for AzureReader {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn open_chunks(
        &self,
        tenant: &str,
        dataset: DatasetKind,
        partition: &PartitionKey,
        columns: Option<&[&str]>,
    ) -> EngineResult<ChunkIterator> {
        self.core.open_chunks(tenant, dataset, partition, columns).await
    }
}

pub struct GcsReader {
    core: ObjectStoreCore,
}

impl GcsReader {
    pub fn new(config: &ObjectStoreConfig) -> EngineResult<Self> {
        Self::with_chunk_rows(config, None)
    }

    pub fn with_chunk_rows(config: &ObjectStoreConfig, chunk_rows: Option<usize>) -> EngineResult<Self> {
        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(&config.bucket);
        if let Some(secret) = &config.secret {
            builder = builder.with_service_account_key(secret);
        }
        let store = builder
            .build()
            .map_err(|e| EngineError::Configuration(format!("GCS object store: {e}")))?;
        let mut core = ObjectStoreCore::new(Arc::new(store));
        if let Some(chunk_rows) = chunk_rows {
            core = core.with_batch_size(chunk_rows);
        }
        Ok(Self { core })
    }
}

#[async_trait]
impl DatasetReader for GcsReader {
    fn name(&self) -> &'static str {
        "gcs"
    }

    async fn open_chunks(
        &self,
        tenant: &str,
        dataset: DatasetKind,
        partition: &PartitionKey,
        columns: Option<&[&str]>,
    ) -> EngineResult<ChunkIterator> {
        self.core.open_chunks(tenant, dataset, partition, columns).await
    }
}
