//! Recurring jobs and the `job_runs` ledger that makes each (job, period)
//! run at most once.

pub mod ledger;
pub mod leave_allocation;
pub mod log_cleanup;
pub mod payroll_aggregation;
pub mod scheduler;

use chrono::NaiveDate;
use sqlx::MySqlPool;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::config::Config;
use crate::utils::calendar::{day_key, month_key, parse_month, previous_month};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    LeaveAllocation,
    PayrollAggregation,
    LogCleanup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::LeaveAllocation,
        JobKind::PayrollAggregation,
        JobKind::LogCleanup,
    ];

    /// Ledger period a run on `today` works on.
    pub fn period_for(self, today: NaiveDate) -> String {
        match self {
            JobKind::LeaveAllocation => month_key(today),
            JobKind::PayrollAggregation => month_key(previous_month(today)),
            JobKind::LogCleanup => day_key(today),
        }
    }

    /// Canonical period key, or None when `raw` has the wrong shape for this job.
    pub fn normalize_period(self, raw: &str) -> Option<String> {
        match self {
            JobKind::LeaveAllocation | JobKind::PayrollAggregation => {
                parse_month(raw).ok().map(month_key)
            }
            JobKind::LogCleanup => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .map(day_key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { affected: u64 },
    AlreadyDone,
}

/// Runs `kind` for a canonical `period` through the ledger.
pub async fn run_job(
    pool: &MySqlPool,
    config: &Config,
    kind: JobKind,
    period: &str,
) -> anyhow::Result<RunOutcome> {
    match kind {
        JobKind::LeaveAllocation => leave_allocation::run(pool, &config.leave, period).await,
        JobKind::PayrollAggregation => payroll_aggregation::run(pool, period).await,
        JobKind::LogCleanup => log_cleanup::run(pool, config, period).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn periods_per_job() {
        let today = d(2026, 1, 3);
        assert_eq!(JobKind::LeaveAllocation.period_for(today), "2026-01");
        assert_eq!(JobKind::PayrollAggregation.period_for(today), "2025-12");
        assert_eq!(JobKind::LogCleanup.period_for(today), "2026-01-03");
    }

    #[test]
    fn manual_periods_are_normalized() {
        assert_eq!(
            JobKind::LeaveAllocation.normalize_period(" 2026-02 "),
            Some("2026-02".to_string())
        );
        assert_eq!(JobKind::LeaveAllocation.normalize_period("2026-02-01"), None);
        assert_eq!(
            JobKind::LogCleanup.normalize_period("2026-02-01"),
            Some("2026-02-01".to_string())
        );
        assert_eq!(JobKind::LogCleanup.normalize_period("2026-02"), None);
    }

    #[test]
    fn job_names() {
        assert_eq!(JobKind::from_str("payroll_aggregation").unwrap(), JobKind::PayrollAggregation);
        assert_eq!(JobKind::LogCleanup.as_ref(), "log_cleanup");
        assert!(JobKind::from_str("backup").is_err());
    }
}
