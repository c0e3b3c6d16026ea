//! Connection source shared by the pool-backed repositories and the
//! transaction-bound ones.

use std::sync::Arc;

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::TeamError;

pub(super) type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

#[derive(Clone)]
pub(super) enum Handle {
    Pool(SqlitePool),
    /// `None` once the transaction has been committed.
    Tx(SharedTransaction),
}

/// Binds `$conn` to a `&mut SqliteConnection` from `$handle` and evaluates
/// `$body` with it. Must be used inside a fn returning `Result<_, TeamError>`.
macro_rules! with_conn {
    ($handle:expr, |$conn:ident| $body:expr) => {
        match &$handle {
            $crate::sqlite::teams::handle::Handle::Pool(pool) => {
                let mut pooled = pool
                    .acquire()
                    .await
                    .map_err($crate::sqlite::teams::handle::db_error("acquire_connection"))?;
                let $conn: &mut ::sqlx::SqliteConnection = &mut pooled;
                $body
            }
            $crate::sqlite::teams::handle::Handle::Tx(tx) => {
                let mut guard = tx.lock().await;
                let Some(open) = guard.as_mut() else {
                    return Err($crate::TeamError::Internal(
                        "transaction already committed".to_owned(),
                    ));
                };
                let $conn: &mut ::sqlx::SqliteConnection = &mut **open;
                $body
            }
        }
    };
}

pub(super) use with_conn;

/// Logs and wraps a driver error.
pub(super) fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> TeamError {
    move |e| {
        log::error!(
            target: "teamgate",
            "msg=\"database error\", operation=\"{operation}\", error=\"{e}\""
        );
        TeamError::Database(e.to_string())
    }
}

/// The unique-constraint message, when `e` is a unique violation.
pub(super) fn unique_violation(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .filter(|d| d.is_unique_violation())
        .map(|d| d.message().to_owned())
}

/// Converts a stored enum string, surfacing unknown values as a database
/// error.
pub(super) fn decode<T>(
    column: &str,
    raw: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, TeamError> {
    parse(raw).ok_or_else(|| TeamError::Database(format!("invalid {column} value \"{raw}\"")))
}
