//! Username availability: a cuckoo filter answers "definitely free" without
//! touching the database, a moka cache answers "recently seen as taken",
//! and MySQL settles everything else.

use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;
const WARMUP_BATCH: usize = 500;

static USERNAME_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static TAKEN_CACHE: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(50_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

#[inline]
pub fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

fn filter_might_contain(username: &str) -> bool {
    match USERNAME_FILTER.read() {
        Ok(filter) => filter.contains(&username.to_owned()),
        // A poisoned lock only means "can't rule it out".
        Err(_) => true,
    }
}

fn filter_add_all<'a>(usernames: impl IntoIterator<Item = &'a String>) {
    if let Ok(mut filter) = USERNAME_FILTER.write() {
        for username in usernames {
            filter.add(username);
        }
    }
}

/// Record a freshly created username in both in-memory layers.
pub async fn mark_taken(username: &str) {
    let username = normalize(username);
    filter_add_all(std::iter::once(&username));
    TAKEN_CACHE.insert(username, ()).await;
}

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_available(username: &str, pool: &MySqlPool) -> Result<bool> {
    let username = normalize(username);

    if !filter_might_contain(&username) {
        return Ok(true);
    }

    if TAKEN_CACHE.contains_key(&username) {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
    )
    .bind(&username)
    .fetch_one(pool)
    .await
    .context("username lookup failed")?;

    if exists {
        TAKEN_CACHE.insert(username, ()).await;
    }
    Ok(!exists)
}

/// Streams every username into the filter so the fast negative path is
/// valid after a restart.
pub async fn warmup(pool: &MySqlPool) -> Result<usize> {
    let mut stream = sqlx::query_scalar::<_, String>("SELECT username FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(WARMUP_BATCH);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(normalize(&row.context("username warmup row failed")?));
        total += 1;

        if batch.len() == WARMUP_BATCH {
            filter_add_all(&batch);
            batch.clear();
        }
    }
    filter_add_all(&batch);

    log::info!("Username filter warmup complete: {} users", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  JDoe "), "jdoe");
    }

    #[actix_web::test]
    async fn marked_names_hit_the_fast_paths() {
        mark_taken("Registry-Test-User").await;
        assert!(filter_might_contain("registry-test-user"));
        assert!(TAKEN_CACHE.contains_key("registry-test-user"));
    }
}
