//! Relational sink (C2): bulk-load into target tables via the database's
//! native copy path, fetch the small metadata tables, and persist the
//! run-scoped audit log.
//!
//! Grounded on `database::postgres::bulk` (the `sqlx` COPY path this crate
//! adds) and the `UsageRepository` trait shape of
//! `examples/other_examples/.../storage-usage.rs`: an `async_trait` +
//! `mockall::automock` repository trait, one concrete `sqlx`-backed impl.

pub mod audit;
pub mod csv;
pub mod rows;
pub mod sink;
pub mod tables;

pub use rows::{persist_container_on_cloud, persist_container_summary};
pub use sink::{LastRunSummary, PgSink, RelationalSink};
#[cfg(any(test, feature = "test-support"))]
pub use sink::MockRelationalSink;
