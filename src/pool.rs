//! Pooled connections and the transaction entry point

use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::PgPool;

use crate::config::{Config, parse_config};
use crate::error::Error;
use crate::executor;
use crate::tx::Tx;

/// A connection pool whose only way in is [`Pool::tx`].
///
/// Cloning is cheap and every clone shares the same connections, so a pool
/// can be handed to as many tasks as needed.
#[derive(Clone)]
pub struct Pool {
    inner: PgPool,
    tx_timeout: Option<Duration>,
}

impl Pool {
    /// Parse `conn_str` and open a pool.
    ///
    /// A malformed string fails with [`Error::Config`] before any network
    /// activity; connection failures come back as the driver reported them.
    pub async fn connect(conn_str: &str) -> Result<Self, Error> {
        let config = parse_config(conn_str)?;
        Self::connect_config(config).await
    }

    pub async fn connect_config(config: Config) -> Result<Self, Error> {
        let inner = config
            .pool_options()
            .connect_with(config.connect_options.clone())
            .await?;

        log::debug!(
            "connected pool to {}:{} (max {} connections)",
            config.connect_options.get_host(),
            config.connect_options.get_port(),
            config.max_connections
        );

        Ok(Self {
            inner,
            tx_timeout: config.tx_timeout,
        })
    }

    /// Set or clear the deadline applied to each unit of work
    pub fn with_tx_timeout(mut self, limit: Option<Duration>) -> Self {
        self.tx_timeout = limit;
        self
    }

    /// Run `f` in a serializable transaction on a connection of its own.
    ///
    /// ```ignore
    /// pool.tx(|tx| Box::pin(async move {
    ///     tx.exec(Statement::new("INSERT INTO events (kind) VALUES (?)").bind("login")).await?;
    ///     Ok::<_, sq::Error>(())
    /// }))
    /// .await?;
    /// ```
    ///
    /// When `f` returns `Ok` the transaction is committed and a failed commit
    /// is returned. When `f` returns `Err` the transaction is rolled back and
    /// `f`'s error returned, **unless the rollback itself fails, in which case
    /// the rollback error is returned instead**. A panic in `f` rolls back and
    /// then continues unwinding.
    ///
    /// Serialization failures are not retried here; check for
    /// [`codes::SERIALIZATION_FAILURE`](crate::codes::SERIALIZATION_FAILURE)
    /// with [`is_error`](crate::is_error) and call `tx` again.
    ///
    /// Dropping the returned future before it finishes drops the transaction,
    /// which the driver rolls back before the connection is reused.
    pub async fn tx<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<R, E>> + Send,
        R: Send,
        E: From<Error> + Send,
    {
        let tx = self.begin().await?;
        executor::execute(tx, self.tx_timeout, f).await
    }

    async fn begin(&self) -> Result<Tx, Error> {
        let mut tx = self.inner.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        log::debug!("transaction began (serializable)");
        Ok(Tx::new(tx))
    }

    /// Close every connection. Later calls to [`Pool::tx`] fail with
    /// [`Error::PoolClosed`].
    pub async fn close(&self) {
        self.inner.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Connections currently open, idle or in use
    pub fn size(&self) -> u32 {
        self.inner.size()
    }
}
