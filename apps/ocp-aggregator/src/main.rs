//! Container/cloud cost aggregation engine (spec.md §1-§2, C14).
//!
//! One bounded (tenant, year, month[, days]) invocation: read OpenShift
//! telemetry (and, if a cloud provider is given, cloud billing) from object
//! storage, aggregate and attribute cost, bulk-load the result into
//! Postgres. `Status` reports the last run recorded for a tenant.

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use eyre::Result;
use tracing::{error, info, warn};

mod cli;
mod config;
mod pipeline;

use cli::{Cli, Commands};
use config::Config;
use ocp_model::EngineError;
use ocp_objectstore::{AzureReader, DatasetReader, GcsReader, S3Reader};
use ocp_sink::{PgSink, RelationalSink};

#[tokio::main]
async fn main() {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);
    observability::init_metrics();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "ocp-aggregator failed");
            // Errors that originated as an `EngineError` carry their own
            // exit code (spec.md §6); anything else (CLI parsing, config
            // loading) is a configuration problem.
            err.downcast_ref::<EngineError>().map(EngineError::exit_code).unwrap_or(1)
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let config = Config::from_env()?;
    let cli = Cli::parse();

    maybe_serve_metrics().await;

    match cli.command {
        Commands::Status { tenant_id } => run_status(&config, &tenant_id).await,
        run @ Commands::Run { .. } => run_aggregation(&config, run).await,
    }
}

/// Spawns the `/metrics` scrape endpoint in the background (SPEC_FULL.md
/// §4.15); a scrape failure to bind is logged, not fatal, since the
/// aggregation run itself doesn't depend on it.
async fn maybe_serve_metrics() {
    let server_config = match core_config::server::ServerConfig::from_env() {
        Ok(c) => c,
        Err(err) => {
            warn!(error = %err, "metrics server config invalid, /metrics disabled");
            return;
        }
    };
    let router = axum::Router::new().route("/metrics", axum::routing::get(observability::metrics_handler));
    let address = server_config.address();
    match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => {
            info!(address, "serving /metrics");
            tokio::spawn(async move {
                if let Err(err) = axum::serve(listener, router).await {
                    warn!(error = %err, "metrics server exited");
                }
            });
        }
        Err(err) => warn!(address, error = %err, "failed to bind metrics listener, /metrics disabled"),
    }
}

async fn run_status(config: &Config, tenant_id: &str) -> Result<i32> {
    info!(tenant_id, "checking database health");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| EngineError::from(database::common::error::DatabaseError::from(e)))?;
    let health = database::postgres::check_health_detailed(&db).await;

    let sink = PgSink::connect(&config.database).await?;
    let last_run = sink.fetch_last_run_summary(tenant_id).await?;

    #[derive(serde::Serialize)]
    struct StatusReport {
        tenant_id: String,
        database_healthy: bool,
        database_response_time_ms: u64,
        last_run_id: Option<String>,
        last_run_recorded_at: Option<String>,
        last_run_audit_record_count: Option<i64>,
    }

    let report = StatusReport {
        tenant_id: tenant_id.to_string(),
        database_healthy: health.healthy,
        database_response_time_ms: health.response_time_ms,
        last_run_id: last_run.as_ref().map(|r| r.run_id.to_string()),
        last_run_recorded_at: last_run.as_ref().map(|r| r.recorded_at.to_string()),
        last_run_audit_record_count: last_run.as_ref().map(|r| r.audit_record_count),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    // Transient exit code (spec.md §6) — the database itself is reachable,
    // just unhealthy; not a configuration or data problem.
    const TRANSIENT_EXIT_CODE: i32 = 2;
    Ok(if health.healthy { 0 } else { TRANSIENT_EXIT_CODE })
}

async fn run_aggregation(config: &Config, command: Commands) -> Result<i32> {
    let request = command.into_run_request(config.cost_distribution, config.markup_rate)?;

    info!(tenant_id = %request.tenant_id, year = request.year, month = request.month, "connecting to database");
    let sink = PgSink::connect(&config.database).await?;
    let metadata = sink.load_metadata_snapshot(&request.tenant_id).await?;

    // `mode.chunk_rows` (spec.md §6) sizes every streaming `next_chunk()`
    // read; `mode.streaming` only gates container-only pod aggregation
    // (spec.md §5 "Streaming mode"), so it isn't threaded through here — the
    // container-on-cloud path always materialises its cloud side regardless.
    let chunk_rows = Some(config.mode.chunk_rows);
    let reader: Box<dyn DatasetReader> = match config.object_store_provider.as_str() {
        "s3" => Box::new(S3Reader::with_chunk_rows(&config.object_store, chunk_rows)?),
        "azure" => Box::new(AzureReader::with_chunk_rows(&config.object_store, chunk_rows)?),
        "gcs" => Box::new(GcsReader::with_chunk_rows(&config.object_store, chunk_rows)?),
        other => return Err(EngineError::Configuration(format!("unknown OBJECT_STORE_PROVIDER '{other}'")).into()),
    };

    let outcome = if request.is_container_on_cloud() {
        info!("starting container-on-cloud run");
        let outcome = pipeline::run_container_on_cloud(&request, reader.as_ref(), &sink, &metadata).await?;
        info!(
            attributed_rows = outcome.attributed_rows,
            container_on_cloud_rows_persisted = outcome.container_on_cloud_rows_persisted,
            rollup_rows_persisted = outcome.rollup_rows_persisted,
            audit_records = outcome.audit.len(),
            "container-on-cloud run complete"
        );
        outcome.audit
    } else {
        info!("starting container-only run");
        let outcome = pipeline::run_container_only(&request, reader.as_ref(), &sink, &metadata, config.mode.streaming, config.mode.in_memory_row_limit).await?;
        info!(rows_persisted = outcome.rows_persisted, audit_records = outcome.audit.len(), "container-only run complete");
        outcome.audit
    };

    if !outcome.is_empty() {
        warn!(audit_records = outcome.len(), "run completed with audit records");
    }

    let run_id = uuid::Uuid::new_v4();
    sink.persist_audit_events(run_id, request.tenant_id.clone(), outcome.into_records()).await?;

    Ok(0)
}
