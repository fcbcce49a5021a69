//! Error types and SQLSTATE inspection
//!
//! Every fallible operation in the crate returns [`Error`]. The unit variants
//! (`NoRows`, `TxClosed`, `TxCommitRollback`, `PoolClosed`) are the sentinels
//! callers match on; driver failures keep the original `sqlx::Error` so the
//! SQLSTATE stays reachable through [`is_error`].

use std::borrow::Cow;
use std::time::Duration;

use sqlx::error::BoxDynError;
use sqlx::postgres::PgDatabaseError;

use crate::placeholder::PlaceholderError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single-row query matched nothing
    #[error("no rows in result set")]
    NoRows,

    /// The transaction was already committed or rolled back
    #[error("tx is closed")]
    TxClosed,

    /// COMMIT was issued on a transaction that had already failed, so the
    /// server rolled it back instead
    #[error("commit unexpectedly resulted in rollback")]
    TxCommitRollback,

    /// The connection string could not be parsed
    #[error("invalid connection string: {0}")]
    Config(String),

    /// The statement builder could not produce SQL
    #[error("failed to build statement: {0}")]
    Build(#[source] BoxDynError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    /// Row values could not be decoded into the requested type
    #[error("failed to scan row: {0}")]
    Scan(#[source] sqlx::Error),

    /// The unit of work outlived the pool's transaction deadline
    #[error("transaction exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("pool is closed")]
    PoolClosed,

    /// Any other driver failure. Transparent, so its SQLSTATE is read through
    /// [`Error::code`] rather than `source()`.
    #[error(transparent)]
    Database(sqlx::Error),
}

impl Error {
    /// SQLSTATE reported by the server, if this error came from one
    pub fn code(&self) -> Option<Cow<'_, str>> {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db.code(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NoRows,
            sqlx::Error::PoolClosed => Error::PoolClosed,
            other => Error::Database(other),
        }
    }
}

/// Reports whether `err`, or anything in its `source()` chain, carries the
/// given SQLSTATE code.
///
/// This is how callers detect conditions such as serialization failures and
/// decide whether to run [`Pool::tx`](crate::Pool::tx) again.
pub fn is_error(err: &(dyn std::error::Error + 'static), code: &str) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if sqlstate(e).is_some_and(|found| found == code) {
            return true;
        }
        current = e.source();
    }
    false
}

fn sqlstate<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<Cow<'a, str>> {
    if let Some(e) = err.downcast_ref::<Error>() {
        return e.code();
    }
    if let Some(sqlx::Error::Database(db)) = err.downcast_ref::<sqlx::Error>() {
        return db.code();
    }
    err.downcast_ref::<PgDatabaseError>()
        .map(|db| Cow::Borrowed(db.code()))
}

/// SQLSTATE codes callers commonly branch on
pub mod codes {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const IN_FAILED_SQL_TRANSACTION: &str = "25P02";
}
