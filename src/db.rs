//! Database connection pool and migration management.

use sqlx::{Pool, Postgres};

/// Type alias for the PostgreSQL connection pool shared by all handlers.
pub type DbPool = Pool<Postgres>;

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 5;

/// Create a new PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server
/// cannot be reached.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Users and tokens come first, then bills/politicians, then letter
/// requests with their queue and mailing records. Each file runs once and
/// is tracked in `_sqlx_migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Whether `err` is a unique-constraint violation reported by Postgres.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// Stand-in for a Postgres error, carrying only its constraint class.
    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
    }

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl StdError for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            if self.unique {
                "duplicate key value violates unique constraint"
            } else {
                "insert or update violates foreign key constraint"
            }
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(if self.unique { "23505" } else { "23503" }))
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
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }
    }

    pub(crate) fn unique_violation() -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError { unique: true }))
    }

    pub(crate) fn foreign_key_violation() -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError { unique: false }))
    }

    #[test]
    fn recognizes_unique_violations() {
        assert!(is_unique_violation(&unique_violation()));
        assert!(!is_unique_violation(&foreign_key_violation()));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
