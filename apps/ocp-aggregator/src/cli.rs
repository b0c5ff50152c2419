//! Command-line surface (spec.md §6 "Invocation", SPEC_FULL.md §4.14).
//!
//! Grounded on `pricing-collector`'s `Collect`/`Status` subcommands: one
//! subcommand that does the work, one that reports on the last time it was
//! done.

use clap::{Parser, Subcommand};
use ocp_model::{CostDistribution, RunRequest};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ocp-aggregator")]
#[command(about = "Join OpenShift container telemetry with cloud billing and attribute cost to tenant namespaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one bounded (tenant, year, month[, days]) aggregation.
    Run {
        #[arg(long)]
        tenant_id: String,

        #[arg(long)]
        ocp_provider_id: Uuid,

        /// Omit for a container-only run (C3-C7 only, no cost attribution).
        #[arg(long)]
        cloud_provider_id: Option<Uuid>,

        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: u32,

        /// Comma-separated day-of-month list narrowing the partition. Omit
        /// to process the whole month.
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<u32>>,

        #[arg(long)]
        cluster_id: Option<String>,

        /// Overrides `COST_MARKUP_RATE` for this run only.
        #[arg(long)]
        markup_rate: Option<String>,

        /// Overrides `COST_DISTRIBUTION` for this run only.
        #[arg(long)]
        cost_distribution: Option<String>,
    },

    /// Report the last run recorded for a tenant.
    Status {
        #[arg(long)]
        tenant_id: String,
    },
}

impl Commands {
    /// Builds the `RunRequest` C14 hands to the pipeline, falling back to
    /// `config`'s defaults for anything not given on the command line.
    /// Panics if called on a `Status` command — callers match on the
    /// variant first.
    pub fn into_run_request(
        self,
        default_cost_distribution: CostDistribution,
        default_markup_rate: Decimal,
    ) -> eyre::Result<RunRequest> {
        match self {
            Commands::Run {
                tenant_id,
                ocp_provider_id,
                cloud_provider_id,
                year,
                month,
                days,
                cluster_id,
                markup_rate,
                cost_distribution,
            } => {
                let markup_rate = match markup_rate {
                    Some(s) => Decimal::from_str(&s).map_err(|e| eyre::eyre!("invalid --markup-rate '{s}': {e}"))?,
                    None => default_markup_rate,
                };
                let cost_distribution = match cost_distribution {
                    Some(s) => CostDistribution::from_str(&s).map_err(|_| eyre::eyre!("invalid --cost-distribution '{s}'"))?,
                    None => default_cost_distribution,
                };
                Ok(RunRequest {
                    tenant_id,
                    ocp_provider_id,
                    cloud_provider_id,
                    year,
                    month,
                    days,
                    cluster_id,
                    markup_rate: Some(markup_rate),
                    cost_distribution,
                })
            }
            Commands::Status { .. } => Err(eyre::eyre!("Status command has no run request")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_falls_back_to_config_defaults() {
        let cmd = Commands::Run {
            tenant_id: "acme".to_string(),
            ocp_provider_id: Uuid::nil(),
            cloud_provider_id: None,
            year: 2026,
            month: 7,
            days: None,
            cluster_id: None,
            markup_rate: None,
            cost_distribution: None,
        };
        let req = cmd.into_run_request(CostDistribution::Max, Decimal::ZERO).unwrap();
        assert_eq!(req.markup_rate, Some(Decimal::ZERO));
        assert_eq!(req.cost_distribution, CostDistribution::Max);
        assert!(!req.is_container_on_cloud());
    }

    #[test]
    fn run_request_honours_explicit_overrides() {
        let cmd = Commands::Run {
            tenant_id: "acme".to_string(),
            ocp_provider_id: Uuid::nil(),
            cloud_provider_id: Some(Uuid::nil()),
            year: 2026,
            month: 7,
            days: Some(vec![1, 2, 3]),
            cluster_id: Some("prod".to_string()),
            markup_rate: Some("0.10".to_string()),
            cost_distribution: Some("cpu".to_string()),
        };
        let req = cmd.into_run_request(CostDistribution::Max, Decimal::ZERO).unwrap();
        assert_eq!(req.markup_rate, Some(Decimal::from_str("0.10").unwrap()));
        assert_eq!(req.cost_distribution, CostDistribution::Cpu);
        assert!(req.is_container_on_cloud());
    }

    #[test]
    fn status_command_has_no_run_request() {
        let cmd = Commands::Status { tenant_id: "acme".to_string() };
        assert!(cmd.into_run_request(CostDistribution::Max, Decimal::ZERO).is_err());
    }
}
