//! The relational sink contract (C2, spec.md §4.2) and its `sqlx`-backed
//! implementation.
//!
//! Grounded on the `UsageRepository` shape of
//! `examples/other_examples/.../storage-usage.rs`: a `#[async_trait]` trait
//! mocked with `mockall::automock` for unit tests, one concrete struct
//! wrapping a connection pool for production use. Bulk writes reuse
//! `database::postgres::bulk::copy_rows`; metadata reads are plain `sqlx`
//! queries against the same pool — SeaORM's entity layer buys nothing for
//! three ad-hoc read-only lookups, so this crate holds only the COPY pool,
//! not a second SeaORM `DatabaseConnection`.

use async_trait::async_trait;
use chrono::NaiveDateTime;
#[cfg(any(test, feature = "test-support"))]
use mockall::automock;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use database::postgres::{copy_rows, PostgresConfig};
use ocp_model::{AuditRecord, CostCategoryPattern, EngineError, EngineResult, MetadataSnapshot, NodeRole};

/// The most recently recorded run for a tenant, read back from
/// `audit_events` (SPEC_FULL.md §10 "Health check / `Status` CLI
/// subcommand"). A run with zero audit records (nothing malformed,
/// everything matched) has no row here — `Status` reports that as "no
/// issues recorded", not as "no run happened".
#[derive(Debug, Clone)]
pub struct LastRunSummary {
    pub run_id: Uuid,
    pub recorded_at: NaiveDateTime,
    pub audit_record_count: i64,
}

/// The C2 contract: bulk append into a target table and read the three
/// small metadata tables, all scoped to one tenant.
#[cfg_attr(any(test, feature = "test-support"), automock)]
#[async_trait]
pub trait RelationalSink: Send + Sync {
    /// `bulk_append(table, rows)` — spec.md §4.2. Rows within one call share
    /// a transaction; failure rolls the whole batch back. Concurrent
    /// invocations into the same table are serialised by the caller, not by
    /// this sink.
    async fn bulk_append(
        &self,
        table: &'static str,
        columns: Vec<String>,
        rows: Vec<String>,
    ) -> EngineResult<u64>;

    async fn fetch_enabled_tag_keys(&self, tenant_id: String) -> EngineResult<Vec<String>>;

    async fn fetch_cost_category_patterns(
        &self,
        tenant_id: String,
    ) -> EngineResult<Vec<CostCategoryPattern>>;

    async fn fetch_node_roles(
        &self,
        tenant_id: String,
    ) -> EngineResult<Vec<(String, String, Option<NodeRole>)>>;

    /// Persists the run-scoped audit log (SPEC_FULL.md §10 supplement).
    async fn persist_audit_events(
        &self,
        run_id: Uuid,
        tenant_id: String,
        records: Vec<AuditRecord>,
    ) -> EngineResult<u64>;
}

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub async fn connect(config: &PostgresConfig) -> EngineResult<Self> {
        let pool = database::postgres::connect_copy_pool(config)
            .await
            .map_err(EngineError::from)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Composes the three metadata reads into one immutable,
    /// `Arc`-shareable snapshot for the run (spec.md §5).
    pub async fn load_metadata_snapshot(&self, tenant_id: &str) -> EngineResult<MetadataSnapshot> {
        let enabled_keys = self.fetch_enabled_tag_keys(tenant_id.to_string()).await?;
        let patterns = self
            .fetch_cost_category_patterns(tenant_id.to_string())
            .await?;
        let nodes = self.fetch_node_roles(tenant_id.to_string()).await?;
        Ok(MetadataSnapshot::new(enabled_keys, patterns, nodes))
    }

    /// Backs the `Status` subcommand (SPEC_FULL.md §4.14): the latest
    /// `run_id` recorded for `tenant_id` in `audit_events`, with its record
    /// count. `None` means no run has ever persisted an audit record for
    /// this tenant.
    pub async fn fetch_last_run_summary(&self, tenant_id: &str) -> EngineResult<Option<LastRunSummary>> {
        let row = sqlx::query(
            "SELECT run_id, max(recorded_at) AS recorded_at, count(*) AS audit_record_count \
             FROM audit_events WHERE tenant_id = $1 GROUP BY run_id ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database::common::error::DatabaseError::from)?;

        Ok(row.map(|r| LastRunSummary {
            run_id: r.get("run_id"),
            recorded_at: r.get("recorded_at"),
            audit_record_count: r.get("audit_record_count"),
        }))
    }
}

#[async_trait]
impl RelationalSink for PgSink {
    async fn bulk_append(
        &self,
        table: &'static str,
        columns: Vec<String>,
        rows: Vec<String>,
    ) -> EngineResult<u64> {
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        copy_rows(&self.pool, table, &column_refs, &rows)
            .await
            .map_err(EngineError::from)
    }

    async fn fetch_enabled_tag_keys(&self, tenant_id: String) -> EngineResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM enabled_tag_keys WHERE tenant_id = $1 AND enabled = true",
        )
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database::common::error::DatabaseError::from)?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("key")).collect())
    }

    async fn fetch_cost_category_patterns(
        &self,
        tenant_id: String,
    ) -> EngineResult<Vec<CostCategoryPattern>> {
        let rows = sqlx::query(
            "SELECT namespace, cost_category_id FROM cost_category_namespace WHERE tenant_id = $1",
        )
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database::common::error::DatabaseError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| CostCategoryPattern {
                pattern: r.get::<String, _>("namespace"),
                cost_category_id: r.get::<i32, _>("cost_category_id"),
            })
            .collect())
    }

    async fn fetch_node_roles(
        &self,
        tenant_id: String,
    ) -> EngineResult<Vec<(String, String, Option<NodeRole>)>> {
        let rows = sqlx::query(
            "SELECT node, resource_id, node_role FROM ocp_nodes WHERE tenant_id = $1",
        )
        .bind(&tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database::common::error::DatabaseError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let node: String = r.get("node");
                let resource_id: String = r.get("resource_id");
                let role: Option<String> = r.get("node_role");
                let role = role.and_then(|s| s.parse::<NodeRole>().ok());
                (node, resource_id, role)
            })
            .collect())
    }

    async fn persist_audit_events(
        &self,
        run_id: Uuid,
        tenant_id: String,
        records: Vec<AuditRecord>,
    ) -> EngineResult<u64> {
        crate::audit::persist(self, run_id, &tenant_id, &records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocp_model::AuditKind;

    #[tokio::test]
    async fn mock_sink_records_bulk_append_calls() {
        let mut mock = MockRelationalSink::new();
        mock.expect_bulk_append()
            .withf(|table, _, rows| *table == "ocp_usage_line_items" && rows.len() == 2)
            .returning(|_, _, rows| Ok(rows.len() as u64));

        let affected = mock
            .bulk_append(
                "ocp_usage_line_items",
                vec!["a".to_string()],
                vec!["1".to_string(), "2".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn mock_sink_persists_audit_records() {
        let mut mock = MockRelationalSink::new();
        mock.expect_persist_audit_events()
            .returning(|_, _, records| Ok(records.len() as u64));

        let run_id = Uuid::nil();
        let records = vec![AuditRecord::new(AuditKind::ZeroNodeCapacity, "node-a")];
        let affected = mock
            .persist_audit_events(run_id, "tenant-1".to_string(), records)
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }
}
