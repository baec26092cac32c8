//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a request is rejected before any write.
//! - [`AccountNotFound`] and [`CustomerNotFound`] thrown when a referenced
//!   account does not exist or is soft-deleted.
//! - [`ExistingKey`] thrown when an account name is already taken.
//! - [`ConcurrencyConflict`] thrown when another writer updated an account
//!   between load and commit. The whole operation can be retried.
//! - [`Persistence`] thrown when the database rejects the unit of work.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`CustomerNotFound`]: EngineError::CustomerNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`Persistence`]: EngineError::Persistence
use sea_orm::{DbErr, RuntimeErr, sqlx};
use serde::Serialize;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" account not found!")]
    AccountNotFound(String),
    #[error("\"{0}\" customer not found!")]
    CustomerNotFound(String),
    #[error("\"{0}\" movement not found!")]
    MovementNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Concurrent update on account \"{0}\", retry the operation")]
    ConcurrencyConflict(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Persistence(#[from] DbErr),
}

/// Coarse classification of an [`EngineError`], for callers that report
/// failures as a `(kind, message)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    AccountNotFound,
    CustomerNotFound,
    MovementNotFound,
    ExistingKey,
    ConcurrencyConflict,
    InvalidData,
    Persistence,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Self::CustomerNotFound(_) => ErrorKind::CustomerNotFound,
            Self::MovementNotFound(_) => ErrorKind::MovementNotFound,
            Self::ExistingKey(_) => ErrorKind::ExistingKey,
            Self::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// `true` when retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// Turns a "database busy/locked" failure into a
    /// [`ConcurrencyConflict`](Self::ConcurrencyConflict) on `account_id`.
    /// Any other error is returned as is.
    pub(crate) fn into_conflict_if_busy(self, account_id: impl ToString) -> Self {
        match &self {
            Self::Persistence(err) if is_busy(err) => {
                tracing::debug!("store busy, reporting a conflict: {err}");
                Self::ConcurrencyConflict(account_id.to_string())
            }
            _ => self,
        }
    }
}

/// SQLite `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6), including their
/// extended codes.
fn is_busy(err: &DbErr) -> bool {
    let (DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime)) = err else {
        return false;
    };
    let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::CustomerNotFound(a), Self::CustomerNotFound(b)) => a == b,
            (Self::MovementNotFound(a), Self::MovementNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::InvalidData(a), Self::InvalidData(b)) => a == b,
            (Self::Persistence(a), Self::Persistence(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        assert_eq!(
            EngineError::Validation("amount".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::CustomerNotFound("x".to_string()).kind(),
            ErrorKind::CustomerNotFound
        );
        assert_eq!(
            EngineError::Persistence(DbErr::Custom("boom".to_string())).kind(),
            ErrorKind::Persistence
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(EngineError::ConcurrencyConflict("a".to_string()).is_retryable());
        assert!(!EngineError::AccountNotFound("a".to_string()).is_retryable());
        assert!(!EngineError::Persistence(DbErr::Custom("x".to_string())).is_retryable());
    }

    #[test]
    fn only_busy_stores_become_conflicts() {
        let other = EngineError::Persistence(DbErr::Custom("disk full".to_string()));
        assert_eq!(
            other.into_conflict_if_busy("a"),
            EngineError::Persistence(DbErr::Custom("disk full".to_string()))
        );

        let missing = EngineError::AccountNotFound("a".to_string());
        assert_eq!(
            missing.into_conflict_if_busy("a"),
            EngineError::AccountNotFound("a".to_string())
        );
    }

    #[test]
    fn messages_name_the_offending_key() {
        let err = EngineError::AccountNotFound("4f1c".to_string());
        assert_eq!(err.to_string(), "\"4f1c\" account not found!");
    }
}
