//! Calendar-length helper shared by the storage aggregator (C6) and the
//! disk-capacity calculator (`ocp_attribution::disk`, C10) — both formulas
//! divide by the number of days (or hours) in the billing month.

use chrono::NaiveDate;

/// Number of calendar days in `year`-`month` (28, 29, 30, or 31).
pub fn days_in_month(year: i32, month: u32) -> i64 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid (year, month)");
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid (year, month)");
    (next_month_first - first).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn february_in_a_leap_year() {
        assert_eq!(days_in_month(2024, 2), 29);
    }

    #[test]
    fn february_in_a_non_leap_year() {
        assert_eq!(days_in_month(2026, 2), 28);
    }

    #[test]
    fn december_rolls_into_next_year() {
        assert_eq!(days_in_month(2026, 12), 31);
    }
}
