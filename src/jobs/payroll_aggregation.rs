use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::api::payroll::run_for_month;
use crate::jobs::{JobKind, RunOutcome, ledger};
use crate::utils::calendar::parse_month;

/// Drafts payroll for `period` (YYYY-MM). Payroll rows are unique per
/// employee and month, so a retried run only fills the gaps.
pub async fn run(pool: &MySqlPool, period: &str) -> anyhow::Result<RunOutcome> {
    let month = parse_month(period).map_err(|e| anyhow::anyhow!("{period}: {e}"))?;

    if !ledger::claim(pool, JobKind::PayrollAggregation, period).await? {
        return Ok(RunOutcome::AlreadyDone);
    }

    match run_for_month(pool, month).await {
        Ok(outcome) => {
            ledger::set_affected(pool, JobKind::PayrollAggregation, period, outcome.created).await?;
            info!(period, created = outcome.created, skipped = outcome.skipped, "Payroll aggregated");
            Ok(RunOutcome::Completed {
                affected: outcome.created,
            })
        }
        Err(e) => {
            warn!(period, error = %e, "Payroll aggregation failed, releasing ledger claim");
            ledger::release(pool, JobKind::PayrollAggregation, period).await?;
            Err(anyhow::anyhow!("payroll aggregation for {period} failed: {e}"))
        }
    }
}
