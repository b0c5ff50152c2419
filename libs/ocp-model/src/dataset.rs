//! The dataset/partition vocabulary C1 reads against (spec.md §4.1, §6
//! "Object-store layout").

use chrono::NaiveDate;
use uuid::Uuid;

/// Which Parquet dataset a read targets. The object-name prefix mapping is
/// opaque to the engine core (spec.md §6) and lives in `ocp-objectstore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum DatasetKind {
    PodHourly,
    PodDaily,
    StorageDaily,
    NodeLabelsDaily,
    NamespaceLabelsDaily,
    CloudHourlyDaily,
}

/// The partition predicate of spec.md I8: `source = S ∧ year = Y ∧ month = M
/// ∧ interval_start ∈ [start, end+1day)`. `days` narrows the coarse
/// `(source, year, month)` object-store prefix to a row-wise date filter
/// applied after the partition prune.
#[derive(Debug, Clone)]
pub struct PartitionKey {
    pub source: Uuid,
    pub year: i32,
    pub month: u32,
    pub days: Option<Vec<u32>>,
}

impl PartitionKey {
    pub fn new(source: Uuid, year: i32, month: u32) -> Self {
        Self {
            source,
            year,
            month,
            days: None,
        }
    }

    pub fn with_days(mut self, days: Vec<u32>) -> Self {
        self.days = Some(days);
        self
    }

    /// `year=YYYY/month=MM` object-store prefix segment, zero-padded per
    /// spec.md P9.
    pub fn prefix_segment(&self) -> String {
        format!("year={:04}/month={:02}", self.year, self.month)
    }

    /// Half-open day range `[start, end+1day)` this partition covers, used
    /// to enforce I8's row-wise filter after the coarse object-store prune.
    /// Returns `None` when the partition's calendar month is invalid (never
    /// expected for a configured run; treated as a configuration error by
    /// the caller).
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        match &self.days {
            Some(days) => {
                let min_day = *days.iter().min()?;
                let max_day = *days.iter().max()?;
                let start = NaiveDate::from_ymd_opt(self.year, self.month, min_day)?;
                let end_inclusive = NaiveDate::from_ymd_opt(self.year, self.month, max_day)?;
                Some((start, end_inclusive.succ_opt()?))
            }
            None => {
                let next_month_first = if self.month == 12 {
                    NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
                };
                Some((first, next_month_first))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_segment_is_zero_padded() {
        let key = PartitionKey::new(Uuid::nil(), 2026, 3);
        assert_eq!(key.prefix_segment(), "year=2026/month=03");
    }

    #[test]
    fn date_bounds_whole_month_is_half_open() {
        let key = PartitionKey::new(Uuid::nil(), 2026, 2);
        let (start, end) = key.date_bounds().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn date_bounds_with_day_filter_is_half_open_on_max_day() {
        let key = PartitionKey::new(Uuid::nil(), 2026, 1).with_days(vec![5, 6, 10]);
        let (start, end) = key.date_bounds().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 11).unwrap());
    }

    #[test]
    fn date_bounds_handles_december_rollover() {
        let key = PartitionKey::new(Uuid::nil(), 2026, 12);
        let (_, end) = key.date_bounds().unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }
}
