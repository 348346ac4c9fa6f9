use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use sqlx::MySqlPool;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::jobs::{JobKind, RunOutcome, ledger, run_job};

/// Jobs due on `today` with their periods. The ledger drops the ones that
/// already ran, so a job missed while the server was down catches up later
/// in the same period.
pub fn due_jobs(today: NaiveDate, payroll_run_day: u32) -> Vec<(JobKind, String)> {
    JobKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            JobKind::PayrollAggregation => today.day() >= payroll_run_day,
            JobKind::LeaveAllocation | JobKind::LogCleanup => true,
        })
        .map(|kind| (kind, kind.period_for(today)))
        .collect()
}

async fn tick(pool: &MySqlPool, config: &Config) {
    let today = Local::now().date_naive();

    for (kind, period) in due_jobs(today, config.scheduler.payroll_run_day) {
        match ledger::is_done(pool, kind, &period).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                error!(job = %kind, error = %e, "Ledger lookup failed");
                continue;
            }
        }

        match run_job(pool, config, kind, &period).await {
            Ok(RunOutcome::Completed { affected }) => {
                info!(job = %kind, period = %period, affected, "Scheduled job completed")
            }
            Ok(RunOutcome::AlreadyDone) => debug!(job = %kind, period = %period, "Job already done"),
            // retried on the next tick
            Err(e) => error!(job = %kind, period = %period, error = %e, "Scheduled job failed"),
        }
    }
}

/// Spawns the tick loop on the actix runtime.
pub fn spawn(pool: MySqlPool, config: Config) {
    let tick_every = Duration::from_secs(config.scheduler.tick_secs.max(1));
    info!(tick_secs = tick_every.as_secs(), "Job scheduler started");

    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(tick_every);
        loop {
            interval.tick().await;
            tick(&pool, &config).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn kinds(due: &[(JobKind, String)]) -> Vec<JobKind> {
        due.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn payroll_waits_for_run_day() {
        let due = due_jobs(d(10, 2), 5);
        assert_eq!(kinds(&due), vec![JobKind::LeaveAllocation, JobKind::LogCleanup]);

        let due = due_jobs(d(10, 5), 5);
        assert!(due.contains(&(JobKind::PayrollAggregation, "2026-09".to_string())));
    }

    #[test]
    fn first_of_month_runs_everything() {
        let due = due_jobs(d(11, 1), 1);
        assert_eq!(
            due,
            vec![
                (JobKind::LeaveAllocation, "2026-11".to_string()),
                (JobKind::PayrollAggregation, "2026-10".to_string()),
                (JobKind::LogCleanup, "2026-11-01".to_string()),
            ]
        );
    }
}
