//! Persistence error type.
//!
//! Domain failures stay [`CoreError`] values so callers can match the
//! workflow taxonomy; everything else is a database or configuration fault.

use cflows_core::error::CoreError;
use validator::ValidationErrors;

/// PostgreSQL unique constraint violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A domain-level error from `cflows_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<ValidationErrors> for DbError {
    fn from(errors: ValidationErrors) -> Self {
        DbError::Core(CoreError::Validation(errors.to_string()))
    }
}

/// Translate a unique violation on an `uq_*` constraint into `DuplicateName`.
///
/// Any other error is passed through as [`DbError::Database`].
pub fn classify_unique_violation(err: sqlx::Error, entity: &'static str, name: &str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
            && db_err.constraint().is_some_and(|c| c.starts_with("uq_"))
        {
            return DbError::Core(CoreError::DuplicateName {
                entity,
                name: name.to_string(),
            });
        }
    }
    DbError::Database(err)
}

/// `NotFound` for an entity id.
pub fn not_found(entity: &'static str, id: i64) -> DbError {
    DbError::Core(CoreError::NotFound { entity, id })
}
