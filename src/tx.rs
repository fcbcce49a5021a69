//! Transaction handle passed to units of work
//!
//! Every statement goes through the same steps: ask the builder for SQL and
//! arguments, rewrite `?` placeholders into `$N`, check the argument count,
//! then run it on the transaction's connection. A failure in the first two
//! steps returns before anything is sent to the server.

use futures::TryStreamExt;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, Postgres};

use crate::QueryResult;
use crate::error::{Error, codes};
use crate::executor::Transaction;
use crate::placeholder::{self, PlaceholderError};
use crate::rows::{Row, Rows};
use crate::statement::StatementBuilder;

/// A live serializable transaction.
///
/// Handed to the closure given to [`Pool::tx`](crate::Pool::tx). Statements
/// take `&mut self`, so a handle is only ever driven by one task at a time.
///
/// The handle also implements [`Transaction`], but ending it early from
/// inside the closure makes the pool's own commit or rollback fail with
/// [`Error::TxClosed`].
pub struct Tx {
    inner: Option<sqlx::Transaction<'static, Postgres>>,
    /// Rewritten SQL of the latest statement. Cursors borrow it for as long as
    /// they borrow the connection.
    sql: String,
    /// Set once any statement fails on the server, which aborts the
    /// transaction in Postgres until it rolls back to a savepoint.
    failed: bool,
}

impl Tx {
    pub(crate) fn new(inner: sqlx::Transaction<'static, Postgres>) -> Self {
        Self {
            inner: Some(inner),
            sql: String::new(),
            failed: false,
        }
    }

    /// Run a statement that returns no rows
    pub async fn exec(&mut self, qb: impl StatementBuilder) -> Result<QueryResult, Error> {
        let args = prepare(qb, &mut self.sql)?;
        let conn = self.inner.as_mut().ok_or(Error::TxClosed)?;

        match sqlx::query_with::<Postgres, _>(&self.sql, args)
            .execute(&mut **conn)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                self.failed = true;
                Err(Error::from(e))
            }
        }
    }

    /// Run a statement and iterate over its rows.
    ///
    /// The first row is read before returning, so errors raised by the server
    /// while planning or starting the statement come back here rather than
    /// from [`Rows::next`].
    pub async fn query<'a>(&'a mut self, qb: impl StatementBuilder) -> Result<Rows<'a>, Error> {
        let args = prepare(qb, &mut self.sql)?;

        let Self { inner, sql, failed } = self;
        let conn = inner.as_mut().ok_or(Error::TxClosed)?;
        let sql: &'a str = sql.as_str();

        let mut stream = sqlx::query_with::<Postgres, _>(sql, args).fetch(&mut **conn);
        match stream.try_next().await {
            Ok(first) => Ok(Rows::new(stream, first, failed)),
            Err(e) => {
                *failed = true;
                Err(Error::from(e))
            }
        }
    }

    /// Prepare a single-row query.
    ///
    /// Nothing is sent until [`Row::scan`]; a builder or placeholder failure
    /// is returned from there as well.
    pub fn query_row(&mut self, qb: impl StatementBuilder) -> Row<'_> {
        let args = match prepare(qb, &mut self.sql) {
            Ok(args) => args,
            Err(e) => return Row::from_error(e),
        };

        let Self { inner, sql, failed } = self;
        match inner.as_mut() {
            Some(conn) => Row::pending(&mut **conn, sql.as_str(), args, failed),
            None => Row::from_error(Error::TxClosed),
        }
    }

    /// Whether a statement has failed on the server. Postgres rejects every
    /// further statement in a failed transaction unless it is rolled back to
    /// a savepoint. Committing a transaction that is still failed rolls it
    /// back and returns [`Error::TxCommitRollback`].
    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl Transaction for Tx {
    async fn commit(&mut self) -> Result<(), Error> {
        let mut tx = self.inner.take().ok_or(Error::TxClosed)?;

        // A failed statement may have been undone with ROLLBACK TO SAVEPOINT,
        // so ask the server whether the transaction is still aborted.
        if self.failed {
            if let Err(e) = sqlx::query("SELECT 1").execute(&mut *tx).await {
                let err = Error::from(e);
                tx.rollback().await?;
                if err.code().as_deref() == Some(codes::IN_FAILED_SQL_TRANSACTION) {
                    return Err(Error::TxCommitRollback);
                }
                return Err(err);
            }
            log::debug!("transaction recovered from a failed statement");
        }

        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        let tx = self.inner.take().ok_or(Error::TxClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

/// Build the statement and rewrite its placeholders into `buf`
fn prepare(qb: impl StatementBuilder, buf: &mut String) -> Result<PgArguments, Error> {
    let (sql, args) = qb.to_sql().map_err(Error::Build)?;

    buf.clear();
    let placeholders = placeholder::rewrite_into(&sql, buf)?;
    if placeholders != args.len() {
        return Err(PlaceholderError::ArgumentMismatch {
            placeholders,
            arguments: args.len(),
        }
        .into());
    }

    log::trace!("prepared statement: {}", buf);
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Statement;
    use sqlx::error::BoxDynError;

    #[derive(Debug, thiserror::Error)]
    #[error("builder exploded")]
    struct Exploded;

    struct Broken;

    impl StatementBuilder for Broken {
        fn to_sql(self) -> Result<(String, PgArguments), BoxDynError> {
            Err(Box::new(Exploded))
        }
    }

    #[test]
    fn prepare_rewrites_into_the_buffer() {
        let mut buf = String::from("stale");
        let stmt = Statement::new("UPDATE t SET a = ? WHERE id = ?")
            .bind(1i32)
            .bind(2i64);
        let args = prepare(stmt, &mut buf).unwrap();
        assert_eq!(buf, "UPDATE t SET a = $1 WHERE id = $2");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn prepare_passes_builder_errors_through() {
        let mut buf = String::new();
        match prepare(Broken, &mut buf) {
            Err(Error::Build(inner)) => assert!(inner.downcast_ref::<Exploded>().is_some()),
            other => panic!("expected build error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn prepare_checks_argument_count() {
        let mut buf = String::new();
        let stmt = Statement::new("SELECT * FROM t WHERE a = ? AND b = ?").bind(1i32);
        assert!(matches!(
            prepare(stmt, &mut buf),
            Err(Error::Placeholder(PlaceholderError::ArgumentMismatch {
                placeholders: 2,
                arguments: 1,
            }))
        ));

        let stmt = Statement::new("SELECT * FROM t WHERE a = $1").bind(1i32);
        assert!(matches!(
            prepare(stmt, &mut buf),
            Err(Error::Placeholder(PlaceholderError::ArgumentMismatch {
                placeholders: 0,
                arguments: 1,
            }))
        ));
    }
}
