//! Statement builders
//!
//! The transaction handle never inspects how SQL is produced. Anything that can
//! hand back `(sql, arguments)` with `?` placeholders works: a query-building
//! library, a hand-written type, or the bundled [`Statement`].

use sqlx::error::BoxDynError;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, Encode, Postgres, Type};

/// Produces SQL text with `?` placeholders and the arguments that fill them,
/// in placeholder order.
pub trait StatementBuilder {
    fn to_sql(self) -> Result<(String, PgArguments), BoxDynError>;
}

impl StatementBuilder for &str {
    fn to_sql(self) -> Result<(String, PgArguments), BoxDynError> {
        Ok((self.to_owned(), PgArguments::default()))
    }
}

impl StatementBuilder for String {
    fn to_sql(self) -> Result<(String, PgArguments), BoxDynError> {
        Ok((self, PgArguments::default()))
    }
}

/// SQL text plus bound arguments.
///
/// ```ignore
/// let stmt = Statement::new("UPDATE accounts SET balance = balance - ? WHERE id = ?")
///     .bind(amount)
///     .bind(account_id);
/// tx.exec(stmt).await?;
/// ```
pub struct Statement {
    sql: String,
    args: PgArguments,
    count: usize,
    error: Option<BoxDynError>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: PgArguments::default(),
            count: 0,
            error: None,
        }
    }

    /// Bind the value for the next `?`.
    ///
    /// Encoding failures are held until [`StatementBuilder::to_sql`], so a
    /// chain of binds never has to be checked link by link.
    pub fn bind<'q, T>(mut self, value: T) -> Self
    where
        T: 'q + Encode<'q, Postgres> + Type<Postgres>,
    {
        if self.error.is_none() {
            if let Err(e) = self.args.add(value) {
                self.error = Some(e);
            }
            self.count += 1;
        }
        self
    }

    /// Append more SQL to the statement
    pub fn push(mut self, sql: &str) -> Self {
        self.sql.push_str(sql);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of arguments bound so far
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("args", &self.count)
            .field("failed", &self.error.is_some())
            .finish()
    }
}

impl StatementBuilder for Statement {
    fn to_sql(self) -> Result<(String, PgArguments), BoxDynError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok((self.sql, self.args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_sql_and_arguments() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = ?")
            .push(" AND b = ?")
            .bind(7i64)
            .bind("seven");
        assert_eq!(stmt.sql(), "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(stmt.len(), 2);

        let (sql, args) = stmt.to_sql().unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn raw_strings_have_no_arguments() {
        let (sql, args) = "SELECT 1".to_sql().unwrap();
        assert_eq!(sql, "SELECT 1");
        assert_eq!(args.len(), 0);

        let (sql, _) = String::from("SELECT 2").to_sql().unwrap();
        assert_eq!(sql, "SELECT 2");
    }

    #[test]
    fn binds_optional_and_typed_values() {
        let stmt = Statement::new("INSERT INTO t (a, b, c) VALUES (?, ?, ?)")
            .bind(None::<i32>)
            .bind(chrono::Utc::now())
            .bind(sqlx::types::Json(serde_json::json!({"k": 1})));
        let (_, args) = stmt.to_sql().unwrap();
        assert_eq!(args.len(), 3);
    }
}
