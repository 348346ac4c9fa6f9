use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::ApiError;
use crate::utils::calendar::working_days;

/// Days a request is charged: working days in range, halved for a half day.
pub fn requested_days(
    start: NaiveDate,
    end: NaiveDate,
    half_day: bool,
    holidays: &HashSet<NaiveDate>,
) -> Result<f64, ApiError> {
    if start > end {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }
    if half_day && start != end {
        return Err(ApiError::bad_request("half_day is only allowed for single-day leave"));
    }

    let days = working_days(start, end, holidays).len();
    if days == 0 {
        return Err(ApiError::bad_request(
            "Requested range contains no working days",
        ));
    }

    Ok(if half_day { 0.5 } else { days as f64 })
}

/// Balance left for a new request once other pending requests are reserved.
pub fn available_balance(balance: f64, pending_days: f64) -> f64 {
    (balance - pending_days).max(0.0)
}

/// New balance after charging `days`; never negative.
pub fn deduct(balance: f64, days: f64) -> Result<f64, ApiError> {
    if days > balance + f64::EPSILON {
        return Err(ApiError::bad_request(format!(
            "Insufficient leave balance: {balance} day(s) available, {days} requested"
        )));
    }
    Ok((balance - days).max(0.0))
}

/// Annual days moved into a new year.
pub fn carry_forward(previous_annual_balance: f64, cap: f64) -> f64 {
    previous_annual_balance.clamp(0.0, cap.max(0.0))
}

pub fn ranges_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// A new request may not overlap the employee's pending or approved leave.
pub fn check_overlap(
    requested: (NaiveDate, NaiveDate),
    active: &[(NaiveDate, NaiveDate)],
) -> Result<(), ApiError> {
    if active.iter().any(|r| ranges_overlap(requested, *r)) {
        return Err(ApiError::conflict("Leave overlaps an existing request"));
    }
    Ok(())
}

/// Tracked leave must fit in the balance left after other pending requests.
pub fn check_balance(days: f64, balance: f64, pending_days: f64) -> Result<(), ApiError> {
    let available = available_balance(balance, pending_days);
    if days > available + f64::EPSILON {
        return Err(ApiError::bad_request(format!(
            "Insufficient leave balance: {available} day(s) available, {days} requested"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_only_working_days() {
        // Mon 2026-10-12 .. Sun 2026-10-18 with Wednesday off
        let holidays: HashSet<_> = [d(2026, 10, 14)].into_iter().collect();
        assert_eq!(
            requested_days(d(2026, 10, 12), d(2026, 10, 18), false, &holidays).unwrap(),
            4.0
        );
    }

    #[test]
    fn half_day_rules() {
        let none = HashSet::new();
        assert_eq!(requested_days(d(2026, 10, 12), d(2026, 10, 12), true, &none).unwrap(), 0.5);
        assert!(requested_days(d(2026, 10, 12), d(2026, 10, 13), true, &none).is_err());
    }

    #[test]
    fn weekend_only_request_is_rejected() {
        let err = requested_days(d(2026, 10, 17), d(2026, 10, 18), false, &HashSet::new());
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn balance_never_goes_negative() {
        assert_eq!(deduct(5.0, 2.5).unwrap(), 2.5);
        assert_eq!(deduct(2.0, 2.0).unwrap(), 0.0);
        assert!(deduct(1.0, 1.5).is_err());
        assert_eq!(available_balance(3.0, 4.0), 0.0);
        assert_eq!(available_balance(10.0, 4.0), 6.0);
    }

    #[test]
    fn carry_forward_is_capped() {
        assert_eq!(carry_forward(12.0, 5.0), 5.0);
        assert_eq!(carry_forward(3.5, 5.0), 3.5);
        assert_eq!(carry_forward(-1.0, 5.0), 0.0);
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = (d(2026, 1, 5), d(2026, 1, 7));
        assert!(ranges_overlap(a, (d(2026, 1, 7), d(2026, 1, 9))));
        assert!(!ranges_overlap(a, (d(2026, 1, 8), d(2026, 1, 9))));
    }

    #[test]
    fn overlapping_requests_conflict() {
        let active = [(d(2026, 3, 2), d(2026, 3, 4)), (d(2026, 3, 16), d(2026, 3, 16))];

        assert!(check_overlap((d(2026, 3, 5), d(2026, 3, 13)), &active).is_ok());
        assert!(matches!(
            check_overlap((d(2026, 3, 4), d(2026, 3, 6)), &active),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            check_overlap((d(2026, 3, 9), d(2026, 3, 20)), &active),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn pending_requests_reserve_balance() {
        // 6 days on balance, 4 already requested
        assert!(check_balance(2.0, 6.0, 4.0).is_ok());
        assert!(matches!(
            check_balance(2.5, 6.0, 4.0),
            Err(ApiError::BadRequest(msg)) if msg.starts_with("Insufficient leave balance")
        ));
        assert!(check_balance(0.5, 0.0, 0.0).is_err());
    }
}
