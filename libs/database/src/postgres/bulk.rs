//! Bulk loading via PostgreSQL's native `COPY FROM STDIN` path.
//!
//! SeaORM has no COPY support, so bulk loads go through `sqlx` directly
//! against the same connection string. One `sqlx::PgPool` is kept alongside
//! the SeaORM `DatabaseConnection` for this purpose; both point at the same
//! database and are cheap to hold side by side (sqlx pools are just a
//! handful of pooled sockets).

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{debug, info};

use super::PostgresConfig;
use crate::common::DatabaseError;

/// Connect a dedicated `sqlx` pool for COPY operations, sized for bursty
/// bulk writes rather than steady request traffic.
pub async fn connect_copy_pool(config: &PostgresConfig) -> Result<PgPool, DatabaseError> {
    let options: PgConnectOptions = config.url().parse().map_err(|e| {
        DatabaseError::ConnectionFailed(format!("invalid DATABASE_URL for copy pool: {e}"))
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    info!("Connected sqlx COPY pool to PostgreSQL");
    Ok(pool)
}

/// Bulk-append rows into `table` using `COPY table (columns) FROM STDIN
/// WITH (FORMAT csv)`, inside a single transaction: either every row lands
/// or none does.
///
/// `rows` are pre-encoded CSV lines (no trailing newline); callers own
/// value escaping, since COPY's CSV dialect has its own quoting rules that
/// differ from a plain `INSERT`.
pub async fn copy_rows(
    pool: &PgPool,
    table: &str,
    columns: &[&str],
    rows: &[String],
) -> Result<u64, DatabaseError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;

    let copy_stmt = format!(
        "COPY {table} ({cols}) FROM STDIN WITH (FORMAT csv)",
        table = table,
        cols = columns.join(", ")
    );

    debug!(table = table, rows = rows.len(), "starting COPY");

    let mut writer = tx.copy_in_raw(&copy_stmt).await?;
    let mut buf = Vec::with_capacity(rows.iter().map(|r| r.len() + 1).sum());
    for row in rows {
        buf.extend_from_slice(row.as_bytes());
        buf.push(b'\n');
    }
    writer.send(buf).await?;
    let rows_affected = writer.finish().await?;

    tx.commit().await?;

    debug!(table = table, rows_affected, "COPY committed");
    Ok(rows_affected)
}
