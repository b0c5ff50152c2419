//! CSV encoding and bulk-load persistence for the two per-row output tables
//! (spec.md §3 "Output daily summary (container)" and "... (container-on-
//! cloud)"), the same `CsvRow` / `RelationalSink::bulk_append` path
//! `ocp_aggregates::persist` uses for the eight roll-ups and `audit::persist`
//! uses for the audit log.
//!
//! `ContainerOnCloudRow`s are attribution-internal: C13 rolls them up before
//! anything is persisted (spec.md §4.13 "not persisted on its own"), so only
//! `container_summary_rows` is reachable from a container-only run. The
//! on-cloud encoder exists for parity and for a future raw-row audit trail,
//! and is exercised directly in tests.

use ocp_model::{ContainerOnCloudRow, ContainerSummaryRow, EngineResult};

use crate::csv::CsvRow;
use crate::sink::RelationalSink;
use crate::tables::{
    CONTAINER_ON_CLOUD_COLUMNS, CONTAINER_ON_CLOUD_TABLE, CONTAINER_SUMMARY_COLUMNS,
    CONTAINER_SUMMARY_TABLE,
};

fn container_summary_csv(r: &ContainerSummaryRow) -> String {
    let mut row = CsvRow::new();
    row.push_raw(r.data_source.to_string())
        .push_raw(r.usage_start.to_string())
        .push_raw(r.usage_end.to_string())
        .push_opt_i64(r.report_period_id)
        .push_opt(r.cluster_id.clone())
        .push_opt(r.cluster_alias.clone())
        .push_uuid(r.source)
        .push_raw(r.year.clone())
        .push_raw(r.month.clone())
        .push_opt(r.namespace.clone())
        .push_opt(r.node.clone())
        .push_opt(r.resource_id.clone())
        .push_raw(r.pod_labels.clone())
        .push_opt_f64(r.pod_usage_cpu_core_hours)
        .push_opt_f64(r.pod_request_cpu_core_hours)
        .push_opt_f64(r.pod_limit_cpu_core_hours)
        .push_opt_f64(r.pod_effective_usage_cpu_core_hours)
        .push_opt_f64(r.pod_usage_memory_gigabyte_hours)
        .push_opt_f64(r.pod_request_memory_gigabyte_hours)
        .push_opt_f64(r.pod_limit_memory_gigabyte_hours)
        .push_opt_f64(r.pod_effective_usage_memory_gigabyte_hours)
        .push_opt_f64(r.node_capacity_cpu_cores)
        .push_opt_f64(r.node_capacity_memory_gigabytes)
        .push_opt_f64(r.node_capacity_cpu_core_hours)
        .push_opt_f64(r.node_capacity_memory_gigabyte_hours)
        .push_opt_f64(r.cluster_capacity_cpu_core_hours)
        .push_opt_f64(r.cluster_capacity_memory_gigabyte_hours)
        .push_opt_f64(r.persistentvolumeclaim_capacity_gigabyte)
        .push_opt_f64(r.persistentvolumeclaim_capacity_gigabyte_months)
        .push_opt_f64(r.volume_request_storage_gigabyte_months)
        .push_opt_f64(r.persistentvolumeclaim_usage_gigabyte_months)
        .push_opt(r.persistentvolumeclaim.clone())
        .push_opt(r.persistentvolume.clone())
        .push_opt(r.storageclass.clone())
        .push_opt(r.csi_volume_handle.clone())
        .push_opt_i32(r.cost_category_id)
        .push_raw(r.infrastructure_usage_cost.clone());
    row.finish()
}

fn container_on_cloud_csv(r: &ContainerOnCloudRow) -> String {
    let mut row = CsvRow::new();
    row.push_raw(r.usage_start.to_string())
        .push_opt(r.namespace.clone())
        .push_opt(r.node.clone())
        .push_opt(r.resource_id.clone())
        .push_raw(r.usage_account_id.clone())
        .push_raw(r.product_code.clone())
        .push_opt(r.product_family.clone())
        .push_opt(r.instance_type.clone())
        .push_opt(r.region.clone())
        .push_opt(r.availability_zone.clone())
        .push_opt(r.pricing_unit.clone())
        .push_raw(r.currency_code.clone())
        .push_raw(r.labels.clone())
        .push_raw(r.data_source.to_string())
        .push_opt(r.data_transfer_direction.clone())
        .push_decimal(r.unblended_cost)
        .push_decimal(r.blended_cost)
        .push_decimal(r.savingsplan_effective_cost)
        .push_decimal(r.calculated_amortized_cost)
        .push_decimal(r.markup_unblended_cost)
        .push_decimal(r.markup_blended_cost)
        .push_decimal(r.markup_savingsplan_effective_cost)
        .push_decimal(r.markup_calculated_amortized_cost)
        .push_bool(r.resource_id_matched)
        .push_opt(r.matched_tag.clone());
    row.finish()
}

fn columns_of(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

/// Bulk-appends the C5/C6/C7 container-only output into `ocp_usage_line_items`.
pub async fn persist_container_summary(
    sink: &dyn RelationalSink,
    rows: &[ContainerSummaryRow],
) -> EngineResult<u64> {
    sink.bulk_append(
        CONTAINER_SUMMARY_TABLE,
        columns_of(CONTAINER_SUMMARY_COLUMNS),
        rows.iter().map(container_summary_csv).collect(),
    )
    .await
}

/// Bulk-appends the C12 attributed output into `ocp_on_cloud_usage_line_items`.
pub async fn persist_container_on_cloud(
    sink: &dyn RelationalSink,
    rows: &[ContainerOnCloudRow],
) -> EngineResult<u64> {
    sink.bulk_append(
        CONTAINER_ON_CLOUD_TABLE,
        columns_of(CONTAINER_ON_CLOUD_COLUMNS),
        rows.iter().map(container_on_cloud_csv).collect(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ocp_model::DataSource;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn summary_row() -> ContainerSummaryRow {
        ContainerSummaryRow {
            data_source: DataSource::Pod,
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            usage_end: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            report_period_id: None,
            cluster_id: Some("cluster-a".into()),
            cluster_alias: None,
            source: Uuid::nil(),
            year: "2026".into(),
            month: "07".into(),
            namespace: Some("frontend".into()),
            node: Some("node-a".into()),
            resource_id: Some("i-0abc".into()),
            pod_labels: "{}".into(),
            pod_usage_cpu_core_hours: Some(1.0),
            pod_request_cpu_core_hours: Some(0.5),
            pod_limit_cpu_core_hours: Some(2.0),
            pod_effective_usage_cpu_core_hours: None,
            pod_usage_memory_gigabyte_hours: Some(0.25),
            pod_request_memory_gigabyte_hours: Some(0.125),
            pod_limit_memory_gigabyte_hours: Some(0.5),
            pod_effective_usage_memory_gigabyte_hours: None,
            node_capacity_cpu_cores: Some(4.0),
            node_capacity_memory_gigabytes: Some(16.0),
            node_capacity_cpu_core_hours: Some(96.0),
            node_capacity_memory_gigabyte_hours: Some(384.0),
            cluster_capacity_cpu_core_hours: Some(96.0),
            cluster_capacity_memory_gigabyte_hours: Some(384.0),
            persistentvolumeclaim_capacity_gigabyte: None,
            persistentvolumeclaim_capacity_gigabyte_months: None,
            volume_request_storage_gigabyte_months: None,
            persistentvolumeclaim_usage_gigabyte_months: None,
            persistentvolumeclaim: None,
            persistentvolume: None,
            storageclass: None,
            csi_volume_handle: None,
            cost_category_id: Some(3),
            infrastructure_usage_cost: "{}".into(),
        }
    }

    fn on_cloud_row() -> ContainerOnCloudRow {
        ContainerOnCloudRow {
            usage_start: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            namespace: Some("frontend".into()),
            node: Some("node-a".into()),
            resource_id: Some("i-0abc".into()),
            usage_account_id: "111111111111".into(),
            product_code: "AmazonEC2".into(),
            product_family: Some("Compute Instance".into()),
            instance_type: Some("m5.large".into()),
            region: Some("us-east-1".into()),
            availability_zone: None,
            pricing_unit: Some("Hrs".into()),
            currency_code: "USD".into(),
            labels: "{}".into(),
            data_source: DataSource::Pod,
            data_transfer_direction: None,
            unblended_cost: dec!(10),
            blended_cost: dec!(10),
            savingsplan_effective_cost: dec!(0),
            calculated_amortized_cost: dec!(10),
            markup_unblended_cost: dec!(1),
            markup_blended_cost: dec!(1),
            markup_savingsplan_effective_cost: dec!(0),
            markup_calculated_amortized_cost: dec!(1),
            resource_id_matched: true,
            matched_tag: None,
        }
    }

    #[test]
    fn container_summary_row_encodes_with_matching_column_count() {
        let line = container_summary_csv(&summary_row());
        assert_eq!(line.matches(',').count(), CONTAINER_SUMMARY_COLUMNS.len() - 1);
        assert!(line.starts_with("Pod,2026-07-01,2026-07-01,,cluster-a,,"));
    }

    #[test]
    fn container_on_cloud_row_encodes_with_matching_column_count() {
        let line = container_on_cloud_csv(&on_cloud_row());
        assert_eq!(line.matches(',').count(), CONTAINER_ON_CLOUD_COLUMNS.len() - 1);
        assert!(line.ends_with(",true,"));
    }

    #[tokio::test]
    async fn persist_container_summary_calls_bulk_append_with_target_table() {
        use crate::sink::MockRelationalSink;

        let mut mock = MockRelationalSink::new();
        mock.expect_bulk_append()
            .withf(|table, _, rows| *table == CONTAINER_SUMMARY_TABLE && rows.len() == 1)
            .returning(|_, _, rows| Ok(rows.len() as u64));

        let affected = persist_container_summary(&mock, &[summary_row()]).await.unwrap();
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn persist_container_on_cloud_calls_bulk_append_with_target_table() {
        use crate::sink::MockRelationalSink;

        let mut mock = MockRelationalSink::new();
        mock.expect_bulk_append()
            .withf(|table, _, rows| *table == CONTAINER_ON_CLOUD_TABLE && rows.len() == 1)
            .returning(|_, _, rows| Ok(rows.len() as u64));

        let affected = persist_container_on_cloud(&mock, &[on_cloud_row()]).await.unwrap();
        assert_eq!(affected, 1);
    }
}
