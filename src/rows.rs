//! Row adapters returned by [`Tx::query_row`](crate::Tx::query_row) and
//! [`Tx::query`](crate::Tx::query)

use futures::TryStreamExt;
use futures::stream::BoxStream;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgConnection, Postgres};

use crate::error::Error;

/// A single-row result whose query runs when it is scanned.
///
/// A row built with [`Row::from_error`] carries a failure from before the
/// query could be sent, and hands it back from [`Row::scan`] without touching
/// the connection.
pub struct Row<'c> {
    state: RowState<'c>,
}

enum RowState<'c> {
    Pending {
        conn: &'c mut PgConnection,
        sql: &'c str,
        args: PgArguments,
        failed: &'c mut bool,
    },
    Failed(Error),
}

impl<'c> Row<'c> {
    pub(crate) fn pending(
        conn: &'c mut PgConnection,
        sql: &'c str,
        args: PgArguments,
        failed: &'c mut bool,
    ) -> Self {
        Self {
            state: RowState::Pending {
                conn,
                sql,
                args,
                failed,
            },
        }
    }

    pub fn from_error(err: Error) -> Self {
        Self {
            state: RowState::Failed(err),
        }
    }

    /// Run the query and decode its first row.
    ///
    /// Tuples work for ad-hoc column lists: `let (id, name): (i64, String) = row.scan().await?;`
    /// Returns [`Error::NoRows`] when the query matched nothing.
    pub async fn scan<T>(self) -> Result<T, Error>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let (conn, sql, args, failed) = match self.state {
            RowState::Failed(err) => return Err(err),
            RowState::Pending {
                conn,
                sql,
                args,
                failed,
            } => (conn, sql, args, failed),
        };

        let row = sqlx::query_with::<Postgres, _>(sql, args)
            .fetch_optional(conn)
            .await
            .map_err(|e| {
                *failed = true;
                Error::from(e)
            })?
            .ok_or(Error::NoRows)?;

        T::from_row(&row).map_err(Error::Scan)
    }
}

/// A multi-row cursor.
///
/// ```ignore
/// let mut rows = tx.query(stmt).await?;
/// while rows.next().await {
///     let (id, name): (i64, String) = rows.scan()?;
/// }
/// rows.finish()?;
/// ```
///
/// The cursor is released by [`Rows::close`], [`Rows::finish`] or dropping the
/// value, whichever comes first.
pub struct Rows<'c> {
    stream: Option<BoxStream<'c, Result<PgRow, sqlx::Error>>>,
    buffered: Option<PgRow>,
    current: Option<PgRow>,
    err: Option<Error>,
    failed: &'c mut bool,
}

impl<'c> Rows<'c> {
    pub(crate) fn new(
        stream: BoxStream<'c, Result<PgRow, sqlx::Error>>,
        first: Option<PgRow>,
        failed: &'c mut bool,
    ) -> Self {
        let stream = first.as_ref().map(|_| stream);
        Self {
            stream,
            buffered: first,
            current: None,
            err: None,
            failed,
        }
    }

    /// Advance to the next row. Returns false once the rows are exhausted,
    /// the cursor is closed, or reading failed (see [`Rows::err`]).
    pub async fn next(&mut self) -> bool {
        self.current = None;

        if let Some(row) = self.buffered.take() {
            self.current = Some(row);
            return true;
        }

        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        match stream.try_next().await {
            Ok(Some(row)) => {
                self.current = Some(row);
                true
            }
            Ok(None) => {
                self.close();
                false
            }
            Err(e) => {
                *self.failed = true;
                self.err = Some(Error::from(e));
                self.close();
                false
            }
        }
    }

    /// Decode the row the cursor is positioned on.
    ///
    /// Fails with [`Error::NoRows`] before the first [`Rows::next`] or after
    /// the cursor is exhausted.
    pub fn scan<T>(&self) -> Result<T, Error>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let row = self.current.as_ref().ok_or(Error::NoRows)?;
        T::from_row(row).map_err(Error::Scan)
    }

    /// The error that stopped iteration, if any
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Release the cursor. Safe to call any number of times.
    pub fn close(&mut self) {
        self.stream = None;
        self.buffered = None;
    }

    /// Close the cursor and return the error that stopped iteration, if any
    pub fn finish(mut self) -> Result<(), Error> {
        self.close();
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none() && self.buffered.is_none()
    }
}
