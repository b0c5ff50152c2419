//! Disk-capacity calculator (C10, spec.md §4.10): derives a volume's
//! provisioned capacity in GB from its cloud billing cost and rate, since
//! cloud storage billing exposes cost and a unit rate but not capacity
//! directly.

use std::collections::HashMap;

use chrono::NaiveDate;
use ocp_container::calendar::days_in_month;
use ocp_model::{AuditKind, AuditLog};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCapacityRow {
    pub persistentvolume: String,
    pub day: NaiveDate,
    pub capacity_gb: Decimal,
}

/// One matched cloud storage billing row, reduced to the fields C10 needs.
pub struct MatchedStorageCost {
    pub persistentvolume: String,
    pub day: NaiveDate,
    pub unblended_cost: Decimal,
    pub unblended_rate: Decimal,
}

#[derive(Default)]
struct Accumulator {
    sum_cost: Decimal,
    max_rate: Decimal,
}

/// `capacity_gb = round(Σ cost / (max(rate) / hours_in_month))`, per
/// `(persistentvolume, day)`. Rows where the rate is zero or the numerator
/// is zero emit no capacity row, only an audit record.
pub fn compute_disk_capacity(
    rows: &[MatchedStorageCost],
    year: i32,
    month: u32,
    audit: &mut AuditLog,
) -> Vec<DiskCapacityRow> {
    let hours_in_month = Decimal::from(24 * days_in_month(year, month));

    let mut groups: HashMap<(String, NaiveDate), Accumulator> = HashMap::new();
    for row in rows {
        let acc = groups.entry((row.persistentvolume.clone(), row.day)).or_default();
        acc.sum_cost += row.unblended_cost;
        acc.max_rate = acc.max_rate.max(row.unblended_rate);
    }

    let mut out = Vec::with_capacity(groups.len());
    for ((persistentvolume, day), acc) in groups {
        if acc.max_rate.is_zero() || acc.sum_cost.is_zero() {
            audit.push(
                AuditKind::ZeroRateDiskCapacity,
                format!("volume {persistentvolume} on {day}: zero rate or zero cost, no capacity row emitted"),
            );
            continue;
        }
        let rate_per_hour = acc.max_rate / hours_in_month;
        let capacity_gb = (acc.sum_cost / rate_per_hour).round();
        out.push(DiskCapacityRow { persistentvolume, day, capacity_gb });
    }
    out
}
