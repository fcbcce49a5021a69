//! Serializable transactions over a pooled Postgres connection
//!
//! All database work goes through [`Pool::tx`], which checks out a connection,
//! begins a `SERIALIZABLE` transaction and hands a [`Tx`] to the caller's
//! closure. The transaction commits if the closure returns `Ok`, and rolls
//! back if it returns `Err` or panics.
//!
//! Statements are built by anything implementing [`StatementBuilder`], using
//! `?` placeholders that are rewritten into Postgres' `$1, $2, ...` form.
//!
//! ```ignore
//! let pool = sq::Pool::connect(&std::env::var("DATABASE_URL")?).await?;
//!
//! let balance: i64 = pool
//!     .tx(|tx| Box::pin(async move {
//!         tx.exec(Statement::new("UPDATE accounts SET balance = balance - ? WHERE id = ?")
//!             .bind(25i64)
//!             .bind(7i64))
//!             .await?;
//!
//!         let (balance,): (i64,) = tx
//!             .query_row(Statement::new("SELECT balance FROM accounts WHERE id = ?").bind(7i64))
//!             .scan()
//!             .await?;
//!         Ok::<_, sq::Error>(balance)
//!     }))
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod placeholder;
pub mod pool;
pub mod rows;
pub mod statement;
pub mod tx;

pub use config::{Config, parse_config};
pub use error::{Error, codes, is_error};
pub use placeholder::{PlaceholderError, replace_placeholders};
pub use pool::Pool;
pub use rows::{Row, Rows};
pub use statement::{Statement, StatementBuilder};
pub use tx::Tx;

/// Outcome of a statement that returns no rows
pub use sqlx::postgres::PgQueryResult as QueryResult;
