use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate, Weekday};
use sqlx::MySql;

use crate::error::ApiError;

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Working days in `[start, end]`, skipping weekends and holidays.
pub fn working_days(start: NaiveDate, end: NaiveDate, holidays: &HashSet<NaiveDate>) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !is_weekend(*d) && !holidays.contains(d))
        .collect()
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("month must be formatted as YYYY-MM"))
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = first_of_month(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

pub fn previous_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_sub_months(Months::new(1))
        .unwrap_or(date)
}

/// Ledger/period key such as `2026-10`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Holidays falling inside `[start, end]`.
pub async fn load_holidays<'c, E>(
    executor: E,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashSet<NaiveDate>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT holiday_date FROM holidays WHERE holiday_date BETWEEN ? AND ?",
    )
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;

    Ok(dates.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_and_holidays_are_skipped() {
        // Fri 2026-10-16 .. Tue 2026-10-20
        let holidays: HashSet<_> = [d(2026, 10, 19)].into_iter().collect();
        let days = working_days(d(2026, 10, 16), d(2026, 10, 20), &holidays);
        assert_eq!(days, vec![d(2026, 10, 16), d(2026, 10, 20)]);
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(working_days(d(2026, 10, 20), d(2026, 10, 16), &HashSet::new()).is_empty());
    }

    #[test]
    fn month_helpers() {
        assert_eq!(parse_month("2026-02").unwrap(), d(2026, 2, 1));
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("Feb").is_err());

        assert_eq!(month_bounds(d(2028, 2, 10)), (d(2028, 2, 1), d(2028, 2, 29)));
        assert_eq!(month_bounds(d(2026, 12, 31)), (d(2026, 12, 1), d(2026, 12, 31)));
        assert_eq!(previous_month(d(2026, 1, 15)), d(2025, 12, 1));
        assert_eq!(month_key(d(2026, 3, 9)), "2026-03");
    }

    #[test]
    fn october_2026_has_22_working_days() {
        let (first, last) = month_bounds(d(2026, 10, 1));
        assert_eq!(working_days(first, last, &HashSet::new()).len(), 22);
    }
}
