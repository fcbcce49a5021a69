//! Transaction outcome resolution
//!
//! [`execute`] runs a unit of work against an open transaction and then ends
//! that transaction exactly once:
//!
//! | unit of work            | action   | returned                              |
//! |-------------------------|----------|---------------------------------------|
//! | `Ok(value)`             | commit   | `Ok(value)`, or the commit error      |
//! | `Err(e)`                | rollback | `Err(e)`, or the rollback error       |
//! | deadline exceeded       | rollback | `Error::Timeout`, or the rollback error |
//! | panic                   | rollback | the panic resumes after the rollback  |
//!
//! A failed rollback replaces the unit of work's own error. The work is
//! abandoned either way, and a connection that could not roll back is the
//! more pressing problem for the caller. This differs from what most callers
//! expect, so it is called out on [`Pool::tx`](crate::Pool::tx) as well.
//!
//! Nothing here retries. Callers that want to rerun on serialization failures
//! check [`is_error`](crate::is_error) and call again.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Error;

/// The two ways a transaction can end.
///
/// Implementations should fail with [`Error::TxClosed`] when the transaction
/// has already ended.
pub trait Transaction: Send {
    fn commit(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Run `f` inside `tx` and commit or roll back depending on how it finishes.
///
/// With a `deadline`, a unit of work still running when it passes is dropped
/// at its current await point and the transaction rolled back.
pub async fn execute<T, F, R, E>(mut tx: T, deadline: Option<Duration>, f: F) -> Result<R, E>
where
    T: Transaction,
    F: for<'t> FnOnce(&'t mut T) -> BoxFuture<'t, Result<R, E>>,
    E: From<Error>,
{
    let handle = &mut tx;
    let work = AssertUnwindSafe(async move { f(handle).await }).catch_unwind();
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Err(E::from(Error::Timeout(limit)))),
        },
        None => work.await,
    };

    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            log::debug!("transaction committed");
            Ok(value)
        }
        Ok(Err(err)) => {
            tx.rollback().await?;
            log::debug!("transaction rolled back");
            Err(err)
        }
        Err(panic) => {
            if let Err(e) = tx.rollback().await {
                log::warn!("rollback after panic failed: {}", e);
            } else {
                log::debug!("transaction rolled back after panic");
            }
            std::panic::resume_unwind(panic)
        }
    }
}
