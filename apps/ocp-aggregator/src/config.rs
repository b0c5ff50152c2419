//! Configuration for the aggregation engine (spec.md §4.14).
//!
//! Composes `PostgresConfig::from_env()` with the object-store endpoint, the
//! streaming-mode knobs (spec.md §5), and the default cost-distribution/
//! markup-rate values a `Run` invocation falls back to when not given
//! explicitly on the command line.

use core_config::FromEnv;
use database::postgres::PostgresConfig;
use eyre::Result;
use ocp_model::CostDistribution;
use ocp_objectstore::ObjectStoreConfig;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    pub object_store: ObjectStoreConfig,
    /// Which backend `object_store` is built against: `s3`, `azure`, or `gcs`.
    pub object_store_provider: String,
    pub mode: ModeConfig,
    pub cost_distribution: CostDistribution,
    pub markup_rate: Decimal,
}

/// Streaming-vs-in-memory selection (spec.md §5), applied to the
/// container-only pipeline's pod/storage reads (`pipeline::run_container_only`):
/// `streaming = true` decodes one row-group `RecordBatch` at a time
/// (`chunk_rows` rows per batch); `streaming = false` (the default, per
/// spec.md's "in-memory mode ... default mode") collects every batch of the
/// partition before decoding any of it. `in_memory_row_limit` is the
/// `input_rows > threshold` half of spec.md's selection rule — row counts
/// aren't known before the read completes, so it's enforced as a
/// post-read warning rather than an upfront switch (see
/// `run_container_only`'s use of it).
#[derive(Debug, Clone, Copy)]
pub struct ModeConfig {
    pub streaming: bool,
    pub chunk_rows: usize,
    pub in_memory_row_limit: usize,
}

fn default_chunk_rows() -> usize {
    100_000
}

fn default_in_memory_row_limit() -> usize {
    1_000_000
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let object_store = ObjectStoreConfig {
            endpoint: std::env::var("OBJECT_STORE_ENDPOINT").ok(),
            bucket: std::env::var("OBJECT_STORE_BUCKET")
                .map_err(|_| eyre::eyre!("OBJECT_STORE_BUCKET is required but not set"))?,
            key_id: std::env::var("OBJECT_STORE_KEY_ID").ok(),
            secret: std::env::var("OBJECT_STORE_SECRET").ok(),
            region: std::env::var("OBJECT_STORE_REGION").ok(),
        };

        let mode = ModeConfig {
            streaming: std::env::var("MODE_STREAMING")
                .map(|s| s.parse().unwrap_or(false))
                .unwrap_or(false),
            chunk_rows: std::env::var("MODE_CHUNK_ROWS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_chunk_rows),
            in_memory_row_limit: std::env::var("MODE_IN_MEMORY_ROW_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_in_memory_row_limit),
        };

        let cost_distribution = std::env::var("COST_DISTRIBUTION")
            .ok()
            .and_then(|s| CostDistribution::from_str(&s).ok())
            .unwrap_or_default();

        let markup_rate = std::env::var("COST_MARKUP_RATE")
            .ok()
            .and_then(|s| Decimal::from_str(&s).ok())
            .unwrap_or(Decimal::ZERO);

        Ok(Config {
            database: <PostgresConfig as FromEnv>::from_env()?,
            object_store,
            object_store_provider: std::env::var("OBJECT_STORE_PROVIDER").unwrap_or_else(|_| "s3".to_string()),
            mode,
            cost_distribution,
            markup_rate,
        })
    }
}
