use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::jobs::{JobKind, RunOutcome, ledger};

/// Prefix of the files written by the rolling appender.
pub const LOG_FILE_PREFIX: &str = "app.log";

pub fn is_stale(modified: SystemTime, now: SystemTime, retention_days: u32) -> bool {
    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    now.duration_since(modified)
        .map(|age| age > retention)
        .unwrap_or(false)
}

fn stale_log_files(dir: &Path, retention_days: u32) -> std::io::Result<Vec<PathBuf>> {
    let now = SystemTime::now();
    let mut stale = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_log = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        let meta = entry.metadata()?;
        if is_log && meta.is_file() && is_stale(meta.modified()?, now, retention_days) {
            stale.push(entry.path());
        }
    }
    Ok(stale)
}

fn remove_stale_logs(dir: PathBuf, retention_days: u32) -> u64 {
    if !dir.is_dir() {
        return 0;
    }
    let files = match stale_log_files(&dir, retention_days) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Could not scan log directory");
            return 0;
        }
    };

    let mut removed = 0;
    for file in files {
        match std::fs::remove_file(&file) {
            Ok(()) => removed += 1,
            Err(e) => warn!(file = %file.display(), error = %e, "Could not remove log file"),
        }
    }
    removed
}

/// Daily cleanup of dead refresh tokens and old log files.
pub async fn run(pool: &MySqlPool, config: &Config, period: &str) -> anyhow::Result<RunOutcome> {
    if !ledger::claim(pool, JobKind::LogCleanup, period).await? {
        return Ok(RunOutcome::AlreadyDone);
    }

    let tokens = sqlx::query("DELETE FROM refresh_tokens WHERE revoked = 1 OR expires_at < UTC_TIMESTAMP()")
        .execute(pool)
        .await;

    let tokens = match tokens {
        Ok(result) => result.rows_affected(),
        Err(e) => {
            ledger::release(pool, JobKind::LogCleanup, period).await?;
            return Err(e).context("refresh token cleanup failed");
        }
    };

    let dir = PathBuf::from(&config.log_dir);
    let retention_days = config.log_retention_days;
    let files = actix_web::rt::task::spawn_blocking(move || remove_stale_logs(dir, retention_days))
        .await
        .context("log cleanup task panicked")?;

    let affected = tokens + files;
    ledger::set_affected(pool, JobKind::LogCleanup, period, affected).await?;

    info!(period, tokens, files, "Cleanup finished");
    Ok(RunOutcome::Completed { affected })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn staleness_respects_retention() {
        let now = SystemTime::now();
        assert!(is_stale(now - DAY * 31, now, 30));
        assert!(!is_stale(now - DAY * 29, now, 30));
        // clock skew: modified in the future
        assert!(!is_stale(now + DAY, now, 30));
    }

    #[test]
    fn missing_directory_removes_nothing() {
        let dir = std::env::temp_dir().join("hrms-no-such-log-dir");
        assert_eq!(remove_stale_logs(dir, 30), 0);
    }
}
