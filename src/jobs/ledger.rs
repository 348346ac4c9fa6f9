use sqlx::{MySql, MySqlPool};

use crate::db::is_duplicate_key;
use crate::jobs::JobKind;
use crate::model::job_run::JobRun;

pub async fn is_done(pool: &MySqlPool, kind: JobKind, period: &str) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM job_runs WHERE job_name = ? AND period = ?",
    )
    .bind(kind.as_ref())
    .bind(period)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Claims (job, period). Returns false when another run already holds it.
pub async fn claim<'c, E>(executor: E, kind: JobKind, period: &str) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let result = sqlx::query("INSERT INTO job_runs (job_name, period) VALUES (?, ?)")
        .bind(kind.as_ref())
        .bind(period)
        .execute(executor)
        .await;

    claim_outcome(result.map(|_| ()))
}

fn claim_outcome(insert: Result<(), sqlx::Error>) -> Result<bool, sqlx::Error> {
    match insert {
        Ok(()) => Ok(true),
        Err(e) if is_duplicate_key(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn set_affected<'c, E>(
    executor: E,
    kind: JobKind,
    period: &str,
    affected: u64,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    sqlx::query("UPDATE job_runs SET affected = ? WHERE job_name = ? AND period = ?")
        .bind(affected)
        .bind(kind.as_ref())
        .bind(period)
        .execute(executor)
        .await?;
    Ok(())
}

/// Drops a claim after a failed non-transactional run so the next tick retries.
pub async fn release(pool: &MySqlPool, kind: JobKind, period: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM job_runs WHERE job_name = ? AND period = ?")
        .bind(kind.as_ref())
        .bind(period)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn recent(
    pool: &MySqlPool,
    job: Option<JobKind>,
    limit: u32,
) -> Result<Vec<JobRun>, sqlx::Error> {
    let rows = match job {
        Some(kind) => {
            sqlx::query_as::<_, JobRun>(
                r#"
                SELECT id, job_name, period, affected, completed_at FROM job_runs
                WHERE job_name = ? ORDER BY id DESC LIMIT ?
                "#,
            )
            .bind(kind.as_ref())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, JobRun>(
                "SELECT id, job_name, period, affected, completed_at FROM job_runs ORDER BY id DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::db_error;
    use sqlx::error::ErrorKind;

    #[test]
    fn duplicate_ledger_row_means_already_claimed() {
        assert!(claim_outcome(Ok(())).unwrap());
        assert!(!claim_outcome(Err(db_error(ErrorKind::UniqueViolation))).unwrap());
        assert!(claim_outcome(Err(db_error(ErrorKind::ForeignKeyViolation))).is_err());
        assert!(claim_outcome(Err(sqlx::Error::PoolTimedOut)).is_err());
    }
}
