//! Errors shared by every repository trait, and the deadline wrapper
//! services put around repository calls.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tracing::warn;

use crate::error::{AppError, DependencyError};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint {0} violated")]
    UniqueViolation(String),
    #[error("foreign key constraint {0} violated")]
    ForeignKeyViolation(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                let constraint = db.constraint().unwrap_or_default().to_owned();
                match code.as_deref() {
                    Some(PG_UNIQUE_VIOLATION) => RepoError::UniqueViolation(constraint),
                    Some(PG_FOREIGN_KEY_VIOLATION) => RepoError::ForeignKeyViolation(constraint),
                    _ => RepoError::Backend(sqlx::Error::Database(db).into()),
                }
            }
            other => RepoError::Backend(other.into()),
        }
    }
}

impl RepoError {
    /// Map into the service-level error, naming the entity the call was about.
    pub fn into_app(self, entity: &'static str) -> AppError {
        match self {
            RepoError::NotFound => AppError::NotFound(entity),
            RepoError::UniqueViolation(_) => AppError::Conflict(entity),
            RepoError::ForeignKeyViolation(c) if c.contains("service") => {
                AppError::NotFound("service")
            }
            RepoError::ForeignKeyViolation(c) if c.contains("user") => AppError::NotFound("user"),
            RepoError::ForeignKeyViolation(c) => {
                AppError::validation(format!("{entity} references a missing record ({c})"))
            }
            RepoError::Timeout(op) => DependencyError::Timeout(op).into(),
            RepoError::Backend(e) => DependencyError::Database(e).into(),
        }
    }
}

/// Bound a repository call. `op` names the call in logs and in the timeout error.
pub async fn with_deadline<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        warn!(op, timeout_ms = limit.as_millis() as u64, "repository call exceeded deadline");
        Err(RepoError::Timeout(op))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_passes_through_fast_results() {
        let out = with_deadline(Duration::from_millis(200), "fast", async { Ok::<_, RepoError>(7) })
            .await
            .expect("fast call");
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn deadline_turns_slow_calls_into_timeouts() {
        let err = with_deadline(Duration::from_millis(20), "slow", async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok::<_, RepoError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RepoError::Timeout("slow")));
        assert!(matches!(
            err.into_app("user"),
            AppError::Dependency(DependencyError::Timeout("slow"))
        ));
    }

    #[test]
    fn foreign_key_violations_name_the_missing_entity() {
        let err = RepoError::ForeignKeyViolation("bookings_service_id_fkey".into());
        assert!(matches!(err.into_app("booking"), AppError::NotFound("service")));
        let err = RepoError::ForeignKeyViolation("bookings_user_id_fkey".into());
        assert!(matches!(err.into_app("booking"), AppError::NotFound("user")));
        assert!(matches!(
            RepoError::NotFound.into_app("schedule"),
            AppError::NotFound("schedule")
        ));
    }
}
