//! Persists the run-scoped `AuditLog` to `audit_events` (SPEC_FULL.md §10
//! supplement: the original distillation discards warning-class conditions
//! at process exit; this keeps them queryable after the fact).

use chrono::Utc;
use ocp_model::{AuditRecord, EngineResult};
use uuid::Uuid;

use crate::csv::CsvRow;
use crate::sink::{PgSink, RelationalSink};
use crate::tables::{AUDIT_EVENTS_COLUMNS, AUDIT_EVENTS_TABLE};

pub async fn persist(
    sink: &PgSink,
    run_id: Uuid,
    tenant_id: &str,
    records: &[AuditRecord],
) -> EngineResult<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let recorded_at = Utc::now().naive_utc();
    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            let mut row = CsvRow::new();
            row.push_uuid(run_id)
                .push_raw(tenant_id)
                .push_timestamp(recorded_at)
                .push_raw(record.kind.to_string())
                .push_raw(record.detail.clone());
            row.finish()
        })
        .collect();

    let columns = AUDIT_EVENTS_COLUMNS.iter().map(|c| c.to_string()).collect();
    sink.bulk_append(AUDIT_EVENTS_TABLE, columns, rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocp_model::AuditKind;

    #[test]
    fn empty_batch_short_circuits_without_a_query() {
        // persist() returns Ok(0) for an empty slice without touching the
        // pool; exercised indirectly through the bulk_append mock in
        // sink::tests, this just documents the CSV row shape is well-formed
        // for a populated batch.
        let mut row = CsvRow::new();
        row.push_uuid(Uuid::nil())
            .push_raw("tenant-1")
            .push_timestamp(Utc::now().naive_utc())
            .push_raw(AuditKind::ZeroNodeCapacity.to_string())
            .push_raw("node-a");
        assert!(row.finish().contains("ZeroNodeCapacity"));
    }
}
