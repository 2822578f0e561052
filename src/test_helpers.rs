//! Test support: a scripted executor and a log capture.
//!
//! `MockExecutor` records every statement it receives and answers from a
//! responder closure, so tests can assert both on the SQL the engine issues
//! and on how many round trips it took.

use crate::error::DbError;
use crate::executor::{Executor, Row};
use crate::sql::FOUND_ROWS_SQL;
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use sea_query::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, Once, PoisonError};
use std::thread::{self, ThreadId};

type Responder = Box<dyn Fn(&str, &[Value]) -> Result<Vec<Row>, DbError> + Send + Sync>;

/// One statement received by a [`MockExecutor`]
pub type Call = (String, Vec<Value>);

/// Executor answering from a closure and recording every call
pub struct MockExecutor {
    responder: Responder,
    calls: Mutex<Vec<Call>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    /// An executor that returns no rows for every statement
    pub fn new() -> Self {
        Self::with_result_responder(|_, _| Ok(Vec::new()))
    }

    /// Answer each statement with the rows `responder` returns
    ///
    /// # Example
    ///
    /// ```rust
    /// use relmap::test_helpers::{found_rows, MockExecutor};
    /// use relmap::{Executor, Row};
    ///
    /// let mock = MockExecutor::with_responder(|sql, _| {
    ///     if sql.contains("FOUND_ROWS") {
    ///         vec![found_rows(3)]
    ///     } else {
    ///         vec![Row::new().with("id", 1i64)]
    ///     }
    /// });
    /// assert_eq!(mock.query_all("SELECT `id` FROM `t`", &[]).unwrap().len(), 1);
    /// assert_eq!(mock.query_count(), 1);
    /// ```
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Vec<Row> + Send + Sync + 'static,
    {
        Self::with_result_responder(move |sql, params| Ok(responder(sql, params)))
    }

    pub fn with_result_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<Vec<Row>, DbError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every statement with a transport error carrying `message`
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_result_responder(move |_, _| Err(DbError::Transport(message.clone())))
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock_calls().clone()
    }

    pub fn query_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Number of statements whose SQL contains `fragment`
    pub fn count_matching(&self, fragment: &str) -> usize {
        self.lock_calls().iter().filter(|(sql, _)| sql.contains(fragment)).count()
    }

    /// Number of `SELECT FOUND_ROWS()` statements received
    pub fn found_rows_count(&self) -> usize {
        self.lock_calls().iter().filter(|(sql, _)| sql == FOUND_ROWS_SQL).count()
    }

    pub fn clear(&self) {
        self.lock_calls().clear();
    }
}

impl Executor for MockExecutor {
    fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.lock_calls().push((sql.to_string(), params.to_vec()));
        (self.responder)(sql, params)
    }
}

/// The single-column row `SELECT FOUND_ROWS()` answers with
pub fn found_rows(total: i64) -> Row {
    Row::new().with("FOUND_ROWS()", total)
}

static CAPTURED: Lazy<Mutex<HashMap<ThreadId, Vec<String>>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static INSTALL: Once = Once::new();

/// Global logger that buffers records for threads inside [`capture_logs`]
struct CaptureLogger;

static LOGGER: CaptureLogger = CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut captured = CAPTURED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lines) = captured.get_mut(&thread::current().id()) {
            lines.push(format!("{} {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

/// Run `f` and return its result with the log lines it emitted on this thread
///
/// Lines read `"<LEVEL> <message>"`, e.g. `"WARN Slow SQL: ..."`. The capture
/// logger is installed on first use; if another logger is already installed,
/// nothing is captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });

    let id = thread::current().id();
    CAPTURED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id, Vec::new());
    let result = f();
    let lines = CAPTURED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id)
        .unwrap_or_default();
    (result, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockExecutor::with_responder(|_, params| vec![Row::new().with("n", params.len() as i64)]);
        let rows = mock.query_all("SELECT ?", &[Value::from(1)]).unwrap();
        assert_eq!(rows[0].get("n"), Some(&Value::BigInt(Some(1))));
        assert_eq!(mock.calls(), vec![("SELECT ?".to_string(), vec![Value::from(1)])]);
        mock.clear();
        assert_eq!(mock.query_count(), 0);
    }

    #[test]
    fn test_capture_is_per_thread() {
        let ((), lines) = capture_logs(|| {
            log::warn!("captured here");
            thread::spawn(|| log::warn!("other thread")).join().unwrap();
        });
        assert_eq!(lines, vec!["WARN captured here".to_string()]);
    }
}
