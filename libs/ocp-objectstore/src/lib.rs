//! Object-store reader (C1): enumerate and fetch Parquet objects under a
//! partition prefix, project column subsets, and yield row-group chunks.
//!
//! Grounded on `apps/cloud/pricing-collector/src/providers`: one trait
//! (`DatasetReader`, mirroring `PricingProvider`) with one implementation
//! per backing object store. The `object_store` crate already unifies S3,
//! Azure Blob, and GCS behind a single `ObjectStore` trait, so each backend
//! here is a thin, separately-constructed wrapper around shared read logic
//! rather than a full reimplementation per cloud SDK — see DESIGN.md.

pub mod backends;
pub mod chunk;
pub mod decode;
pub mod reader;

pub use backends::{AzureReader, GcsReader, ObjectStoreConfig, S3Reader};
pub use chunk::ChunkIterator;
pub use reader::{path_for, DatasetReader};
