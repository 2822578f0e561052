//! `Executor` Module
//!
//! Provides the `Executor` trait that abstracts SQL execution. The query engine
//! never talks to a driver directly: it hands finished SQL (with `?`
//! placeholders) and positional `sea_query::Value` arguments to an `Executor`
//! and receives [`Row`]s back.
//!
//! Driver-specific "no rows" errors are collapsed into `Ok(None)` by
//! [`Executor::query_one`], so nothing above this layer uses errors for the
//! not-found case.

use crate::error::DbError;
use crate::query::error_handling::is_no_rows_error;
use sea_query::Value;

/// A result row: column labels paired with their values, in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append, mostly useful for transports and tests
    ///
    /// # Example
    ///
    /// ```rust
    /// use relmap::Row;
    /// use sea_query::Value;
    ///
    /// let row = Row::new().with("id", 1i64).with("name", "alice");
    /// assert_eq!(row.get("id"), Some(&Value::BigInt(Some(1))));
    /// ```
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Append a column
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    /// Value of the first column with this label
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Value at a column index
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Column labels in select order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Trait for executing parameterized SQL
///
/// Implementations wrap a live connection or session. The engine calls
/// `query_all` for row queries and `query_one` for single-row reads such as
/// counts. Within one paged call, the row query and `SELECT FOUND_ROWS()` are
/// issued back to back on the same executor, so implementations backed by a
/// pool must pin both to one connection.
///
/// # Examples
///
/// ```no_run
/// use relmap::{DbError, Executor, Row};
/// use sea_query::Value;
///
/// struct Recorder;
///
/// impl Executor for Recorder {
///     fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
///         println!("{sql} {params:?}");
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL text with `?` positional placeholders
    /// * `params` - One value per placeholder, in order
    ///
    /// # Errors
    ///
    /// Returns `DbError::Transport` if the query execution fails.
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    /// Execute a query and return the first row, or `None` if no row matched
    ///
    /// The default implementation takes the first row of `query_all`.
    /// Transport errors that signal "no rows" are normalized to `Ok(None)`.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        match self.query_all(sql, params) {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(e) if is_no_rows_error(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        (**self).query_all(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        (**self).query_one(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(String);

    impl Executor for Failing {
        fn query_all(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>, DbError> {
            Err(DbError::Transport(self.0.clone()))
        }
    }

    #[test]
    fn test_row_lookup_by_label() {
        let row = Row::new().with("id", 7i32).with("name", "bob");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::String(Some("bob".to_string()))));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_index(0), Some(&Value::Int(Some(7))));
        assert_eq!(row.columns(), &["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_query_one_normalizes_no_rows() {
        let executor = Failing("Incorrect result size: expected one row, got 0".to_string());
        assert_eq!(executor.query_one("SELECT 1", &[]).unwrap(), None);
    }

    #[test]
    fn test_query_one_propagates_other_errors() {
        let executor = Failing("table not found".to_string());
        assert!(matches!(
            executor.query_one("SELECT 1", &[]),
            Err(DbError::Transport(_))
        ));
    }
}
