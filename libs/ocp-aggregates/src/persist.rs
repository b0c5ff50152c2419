//! Bulk-loads the eight materialised roll-ups through the same
//! `RelationalSink::bulk_append` / CSV path `ocp_sink::audit` uses for the
//! audit log — one CSV row per struct, in field order, `COPY FROM STDIN`.

use ocp_model::EngineResult;
use ocp_sink::csv::CsvRow;
use ocp_sink::sink::RelationalSink;
use ocp_sink::tables::{
    BY_ACCOUNT_TABLE, BY_REGION_TABLE, BY_SERVICE_TABLE, COMPUTE_SUMMARY_TABLE, COST_SUMMARY_TABLE,
    DATABASE_SUMMARY_TABLE, NETWORK_SUMMARY_TABLE, STORAGE_SUMMARY_TABLE,
};

use crate::rollup::{
    ByAccountRow, ByRegionRow, ByServiceRow, ComputeSummaryRow, CostSummaryRow, DatabaseSummaryRow,
    NetworkSummaryRow, StorageSummaryRow,
};

pub const COST_SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const BY_ACCOUNT_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const BY_SERVICE_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "product_code",
    "product_family",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const BY_REGION_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "region",
    "availability_zone",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const COMPUTE_SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "instance_type",
    "resource_id",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const STORAGE_SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "product_family",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const DATABASE_SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "product_code",
    "product_family",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

pub const NETWORK_SUMMARY_COLUMNS: &[&str] = &[
    "id",
    "usage_start",
    "usage_account_id",
    "product_code",
    "product_family",
    "unblended_cost",
    "blended_cost",
    "savingsplan_effective_cost",
    "calculated_amortized_cost",
    "markup_unblended_cost",
    "markup_blended_cost",
    "markup_savingsplan_effective_cost",
    "markup_calculated_amortized_cost",
    "currency_code",
];

/// The result of one `persist_all` call: rows appended per roll-up, for the
/// pipeline driver's end-of-run log line (spec.md §4.15).
#[derive(Debug, Default, Clone, Copy)]
pub struct PersistedCounts {
    pub cost_summary: u64,
    pub by_account: u64,
    pub by_service: u64,
    pub by_region: u64,
    pub compute_summary: u64,
    pub storage_summary: u64,
    pub database_summary: u64,
    pub network_summary: u64,
}

impl PersistedCounts {
    pub fn total(&self) -> u64 {
        self.cost_summary
            + self.by_account
            + self.by_service
            + self.by_region
            + self.compute_summary
            + self.storage_summary
            + self.database_summary
            + self.network_summary
    }
}

fn columns_of(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

fn cost_columns(
    row: &mut CsvRow,
    unblended_cost: rust_decimal::Decimal,
    blended_cost: rust_decimal::Decimal,
    savingsplan_effective_cost: rust_decimal::Decimal,
    calculated_amortized_cost: rust_decimal::Decimal,
    markup_unblended_cost: rust_decimal::Decimal,
    markup_blended_cost: rust_decimal::Decimal,
    markup_savingsplan_effective_cost: rust_decimal::Decimal,
    markup_calculated_amortized_cost: rust_decimal::Decimal,
    currency_code: &str,
) {
    row.push_decimal(unblended_cost)
        .push_decimal(blended_cost)
        .push_decimal(savingsplan_effective_cost)
        .push_decimal(calculated_amortized_cost)
        .push_decimal(markup_unblended_cost)
        .push_decimal(markup_blended_cost)
        .push_decimal(markup_savingsplan_effective_cost)
        .push_decimal(markup_calculated_amortized_cost)
        .push_raw(currency_code);
}

fn cost_summary_csv(r: &CostSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id).push_raw(r.usage_start.to_string());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn by_account_csv(r: &ByAccountRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn by_service_csv(r: &ByServiceRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.product_code.clone())
        .push_opt(r.product_family.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn by_region_csv(r: &ByRegionRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_opt(r.region.clone())
        .push_opt(r.availability_zone.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn compute_summary_csv(r: &ComputeSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.instance_type.clone())
        .push_opt(r.resource_id.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn storage_summary_csv(r: &StorageSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.product_family.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn database_summary_csv(r: &DatabaseSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.product_code.clone())
        .push_opt(r.product_family.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

fn network_summary_csv(r: &NetworkSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_uuid(r.id)
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.product_code.clone())
        .push_opt(r.product_family.clone());
    cost_columns(
        &mut row,
        r.unblended_cost,
        r.blended_cost,
        r.savingsplan_effective_cost,
        r.calculated_amortized_cost,
        r.markup_unblended_cost,
        r.markup_blended_cost,
        r.markup_savingsplan_effective_cost,
        r.markup_calculated_amortized_cost,
        &r.currency_code,
    );
    row.finish()
}

/// Materialises and bulk-loads all eight roll-ups from one attributed batch.
/// Each table is its own `bulk_append` call/transaction, mirroring how
/// `ocp_sink::audit::persist` loads the audit log independently of the line
/// items: a failure partway through leaves the roll-ups already appended in
/// place rather than rolling back the whole run, since every roll-up is
/// derived and safe to recompute and re-append on retry.
pub async fn persist_all(
    sink: &dyn RelationalSink,
    rows: &[ocp_model::ContainerOnCloudRow],
) -> EngineResult<PersistedCounts> {
    let cost_summary = crate::rollup::materialise_cost_summary(rows);
    let by_account = crate::rollup::materialise_by_account(rows);
    let by_service = crate::rollup::materialise_by_service(rows);
    let by_region = crate::rollup::materialise_by_region(rows);
    let compute_summary = crate::rollup::materialise_compute_summary(rows);
    let storage_summary = crate::rollup::materialise_storage_summary(rows);
    let database_summary = crate::rollup::materialise_database_summary(rows);
    let network_summary = crate::rollup::materialise_network_summary(rows);

    let counts = PersistedCounts {
        cost_summary: sink
            .bulk_append(
                COST_SUMMARY_TABLE,
                columns_of(COST_SUMMARY_COLUMNS),
                cost_summary.iter().map(cost_summary_csv).collect(),
            )
            .await?,
        by_account: sink
            .bulk_append(
                BY_ACCOUNT_TABLE,
                columns_of(BY_ACCOUNT_COLUMNS),
                by_account.iter().map(by_account_csv).collect(),
            )
            .await?,
        by_service: sink
            .bulk_append(
                BY_SERVICE_TABLE,
                columns_of(BY_SERVICE_COLUMNS),
                by_service.iter().map(by_service_csv).collect(),
            )
            .await?,
        by_region: sink
            .bulk_append(
                BY_REGION_TABLE,
                columns_of(BY_REGION_COLUMNS),
                by_region.iter().map(by_region_csv).collect(),
            )
            .await?,
        compute_summary: sink
            .bulk_append(
                COMPUTE_SUMMARY_TABLE,
                columns_of(COMPUTE_SUMMARY_COLUMNS),
                compute_summary.iter().map(compute_summary_csv).collect(),
            )
            .await?,
        storage_summary: sink
            .bulk_append(
                STORAGE_SUMMARY_TABLE,
                columns_of(STORAGE_SUMMARY_COLUMNS),
                storage_summary.iter().map(storage_summary_csv).collect(),
            )
            .await?,
        database_summary: sink
            .bulk_append(
                DATABASE_SUMMARY_TABLE,
                columns_of(DATABASE_SUMMARY_COLUMNS),
                database_summary.iter().map(database_summary_csv).collect(),
            )
            .await?,
        network_summary: sink
            .bulk_append(
                NETWORK_SUMMARY_TABLE,
                columns_of(NETWORK_SUMMARY_COLUMNS),
                network_summary.iter().map(network_summary_csv).collect(),
            )
            .await?,
    };

    tracing::info!(total = counts.total(), "aggregation materialiser persisted roll-ups");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn cost_summary_row_encodes_as_one_csv_line() {
        let row = CostSummaryRow {
            id: Uuid::nil(),
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            unblended_cost: dec!(10),
            blended_cost: dec!(10),
            savingsplan_effective_cost: dec!(0),
            calculated_amortized_cost: dec!(10),
            markup_unblended_cost: dec!(1),
            markup_blended_cost: dec!(1),
            markup_savingsplan_effective_cost: dec!(0),
            markup_calculated_amortized_cost: dec!(1),
            currency_code: "USD".into(),
        };
        let line = cost_summary_csv(&row);
        assert_eq!(line.matches(',').count(), COST_SUMMARY_COLUMNS.len() - 1);
        assert!(line.starts_with("00000000-0000-0000-0000-000000000000,2026-07-01,"));
    }

    #[test]
    fn by_service_row_encodes_optional_product_family_as_empty_field() {
        let row = ByServiceRow {
            id: Uuid::nil(),
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            usage_account_id: "111".into(),
            product_code: "AmazonEC2".into(),
            product_family: None,
            unblended_cost: dec!(10),
            blended_cost: dec!(10),
            savingsplan_effective_cost: dec!(0),
            calculated_amortized_cost: dec!(10),
            markup_unblended_cost: dec!(1),
            markup_blended_cost: dec!(1),
            markup_savingsplan_effective_cost: dec!(0),
            markup_calculated_amortized_cost: dec!(1),
            currency_code: "USD".into(),
        };
        let line = by_service_csv(&row);
        assert_eq!(line.matches(',').count(), BY_SERVICE_COLUMNS.len() - 1);
        assert!(line.contains(",AmazonEC2,,"));
    }

    #[test]
    fn persisted_counts_total_sums_every_rollup() {
        let counts = PersistedCounts {
            cost_summary: 1,
            by_account: 2,
            by_service: 3,
            by_region: 4,
            compute_summary: 5,
            storage_summary: 6,
            database_summary: 7,
            network_summary: 8,
        };
        assert_eq!(counts.total(), 36);
    }
}
