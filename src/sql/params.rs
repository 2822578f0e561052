//! Positional `?` parameters with list expansion
//!
//! A [`Param::List`] bound to a single `?` expands to one placeholder per
//! element, which is how `IN (?)` filters take a whole batch of keys.

use crate::error::DbError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_query::Value;
use uuid::Uuid;

/// A bind argument for one `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A single value
    Value(Value),
    /// A list expanded into `?, ?, ..`
    List(Vec<Value>),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}

impl From<Vec<Value>> for Param {
    fn from(values: Vec<Value>) -> Self {
        Param::List(values)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Value(Value::from(value))
    }
}

impl From<Vec<&str>> for Param {
    fn from(values: Vec<&str>) -> Self {
        Param::List(values.into_iter().map(Value::from).collect())
    }
}

impl From<Vec<u8>> for Param {
    fn from(bytes: Vec<u8>) -> Self {
        Param::Value(Value::from(bytes))
    }
}

macro_rules! impl_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Value(Value::from(value))
                }
            }

            impl From<Option<$ty>> for Param {
                fn from(value: Option<$ty>) -> Self {
                    Param::Value(Value::from(value))
                }
            }

            impl From<Vec<$ty>> for Param {
                fn from(values: Vec<$ty>) -> Self {
                    Param::List(values.into_iter().map(Value::from).collect())
                }
            }
        )*
    };
}

impl_param!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    char,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    Decimal,
);

/// Build a `Vec<Param>` from heterogeneous arguments
///
/// # Example
///
/// ```rust
/// use relmap::{params, Param};
///
/// let args = params![18, "alice", vec![1i64, 2, 3]];
/// assert_eq!(args.len(), 3);
/// assert!(matches!(args[2], Param::List(ref v) if v.len() == 3));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Param>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::Param::from($arg)),+]
    };
}

/// Expand list parameters and flatten the arguments into positional values
///
/// `?` inside quoted strings or quoted identifiers is left alone. An empty
/// list renders as `NULL`, so `IN (?)` with no values matches nothing.
///
/// # Errors
///
/// Returns `DbError::Param` when the number of placeholders and arguments differ.
pub fn expand(sql: &str, args: &[Param]) -> Result<(String, Vec<Value>), DbError> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut args_iter = args.iter();
    let mut quote: Option<char> = None;
    let mut placeholders = 0usize;

    for ch in sql.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                out.push(ch);
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => {
                    placeholders += 1;
                    match args_iter.next() {
                        Some(Param::Value(v)) => {
                            out.push('?');
                            values.push(v.clone());
                        }
                        Some(Param::List(list)) if list.is_empty() => out.push_str("NULL"),
                        Some(Param::List(list)) => {
                            out.push_str(&vec!["?"; list.len()].join(", "));
                            values.extend(list.iter().cloned());
                        }
                        None => {
                            return Err(DbError::Param(format!(
                                "SQL has more placeholders than the {} arguments given: {}",
                                args.len(),
                                sql
                            )))
                        }
                    }
                }
                _ => out.push(ch),
            },
        }
    }

    if placeholders != args.len() {
        return Err(DbError::Param(format!(
            "SQL has {} placeholders but {} arguments were given: {}",
            placeholders,
            args.len(),
            sql
        )));
    }

    Ok((out, values))
}
