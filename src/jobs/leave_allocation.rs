use chrono::{Datelike, NaiveDate};
use sqlx::MySqlPool;
use tracing::{debug, info};

use crate::config::LeavePolicy;
use crate::jobs::{JobKind, RunOutcome, ledger};
use crate::model::{employee::EmployeeStatus, leave::LeaveType};
use crate::utils::leave_rules::carry_forward;

/// Days credited to one balance for the month. January also moves the
/// capped annual remainder of the previous year.
pub fn monthly_credit(
    policy: &LeavePolicy,
    leave_type: LeaveType,
    month: NaiveDate,
    previous_annual_balance: Option<f64>,
) -> f64 {
    let accrual = policy.monthly_accrual(leave_type);
    if month.month() == 1 && leave_type == LeaveType::Annual {
        accrual + carry_forward(previous_annual_balance.unwrap_or(0.0), policy.carry_forward_cap)
    } else {
        accrual
    }
}

/// Credits every active employee for `period` (YYYY-MM). The ledger row is
/// written in the same transaction, so a period is allocated at most once.
pub async fn run(pool: &MySqlPool, policy: &LeavePolicy, period: &str) -> anyhow::Result<RunOutcome> {
    let month = NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d")?;
    let year = month.year();

    let mut tx = pool.begin().await?;

    if !ledger::claim(&mut *tx, JobKind::LeaveAllocation, period).await? {
        debug!(period, "Leave already allocated");
        return Ok(RunOutcome::AlreadyDone);
    }

    let employees = sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE status = ?")
        .bind(EmployeeStatus::Active.as_ref())
        .fetch_all(&mut *tx)
        .await?;

    let mut affected = 0u64;
    for employee_id in &employees {
        for leave_type in LeaveType::TRACKED {
            let previous = if month.month() == 1 && leave_type == LeaveType::Annual {
                sqlx::query_scalar::<_, f64>(
                    "SELECT balance FROM leave_balances WHERE employee_id = ? AND leave_type = ? AND year = ?",
                )
                .bind(employee_id)
                .bind(leave_type.as_ref())
                .bind(year - 1)
                .fetch_optional(&mut *tx)
                .await?
            } else {
                None
            };

            let credit = monthly_credit(policy, leave_type, month, previous);
            if credit <= 0.0 {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO leave_balances (employee_id, leave_type, year, allocated, balance)
                VALUES (?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    allocated = allocated + VALUES(allocated),
                    balance = balance + VALUES(balance)
                "#,
            )
            .bind(employee_id)
            .bind(leave_type.as_ref())
            .bind(year)
            .bind(credit)
            .bind(credit)
            .execute(&mut *tx)
            .await?;
            affected += 1;
        }
    }

    ledger::set_affected(&mut *tx, JobKind::LeaveAllocation, period, affected).await?;
    tx.commit().await?;

    info!(period, employees = employees.len(), balances = affected, "Leave allocated");
    Ok(RunOutcome::Completed { affected })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2027, m, 1).unwrap()
    }

    #[test]
    fn regular_month_credits_the_accrual() {
        let policy = LeavePolicy::default();
        assert_eq!(monthly_credit(&policy, LeaveType::Annual, month(5), Some(20.0)), 1.5);
        assert_eq!(monthly_credit(&policy, LeaveType::Sick, month(5), None), 1.0);
        assert_eq!(monthly_credit(&policy, LeaveType::Unpaid, month(5), None), 0.0);
    }

    #[test]
    fn january_carries_forward_capped_annual_days() {
        let policy = LeavePolicy::default();
        assert_eq!(monthly_credit(&policy, LeaveType::Annual, month(1), Some(20.0)), 6.5);
        assert_eq!(monthly_credit(&policy, LeaveType::Annual, month(1), Some(2.0)), 3.5);
        assert_eq!(monthly_credit(&policy, LeaveType::Annual, month(1), None), 1.5);
        // only annual leave carries over
        assert_eq!(monthly_credit(&policy, LeaveType::Casual, month(1), Some(9.0)), 1.0);
    }
}
