use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::error::ErrorKind;
use sqlx::mysql::MySqlPoolOptions;

use crate::config::Config;

pub async fn init_db(config: &Config) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}

/// MySQL files unique, foreign-key and NOT NULL violations all under
/// SQLSTATE 23000, so classify by error kind instead.
pub fn constraint_kind(err: &sqlx::Error) -> Option<ErrorKind> {
    match err {
        sqlx::Error::Database(db_err) => Some(db_err.kind()),
        _ => None,
    }
}

pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(constraint_kind(err), Some(ErrorKind::UniqueViolation))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    /// Stand-in for a driver error carrying a given constraint kind.
    #[derive(Debug)]
    pub struct ConstraintError(pub ErrorKind);

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint failed: {:?}", self.0)
        }
    }

    impl StdError for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint failed"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23000"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                ErrorKind::NotNullViolation => ErrorKind::NotNullViolation,
                ErrorKind::CheckViolation => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    pub fn db_error(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::db_error;
    use super::*;

    #[test]
    fn only_unique_violations_are_duplicates() {
        assert!(is_duplicate_key(&db_error(ErrorKind::UniqueViolation)));
        // same SQLSTATE, different meaning
        assert!(!is_duplicate_key(&db_error(ErrorKind::ForeignKeyViolation)));
        assert!(!is_duplicate_key(&db_error(ErrorKind::NotNullViolation)));
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }
}
