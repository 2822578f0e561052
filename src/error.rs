//! Error types for metadata lookup and query execution.
//!
//! Two layers exist:
//! - [`MetaError`] describes a misconfigured entity type. It is always fatal to
//!   the call that discovered it.
//! - [`DbError`] is what every `DbHelper` operation returns. It wraps
//!   [`MetaError`], coercion failures and transport failures.
//!
//! [`SpliceError`] comes from clause splicers. The query engine logs it and
//! falls back to a simpler clause instead of returning it.

use crate::value::CoercionError;
use std::fmt;

/// Entity registration and metadata errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// The entity (including its parents) declares no column
    NoColumnMetadata { entity: String },
    /// The entity declares no key column
    NoKeyColumn { entity: String },
    /// The operation needs exactly one key column
    MultipleKeyColumns { entity: String, count: usize },
    /// Neither the entity nor any of its parents declares a table
    NoTableMetadata { entity: String },
    /// Two fields of the merged parent chain map to the same column
    DuplicateColumn { entity: String, column: String },
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaError::NoColumnMetadata { entity } => {
                write!(f, "entity {entity} does not declare any column")
            }
            MetaError::NoKeyColumn { entity } => {
                write!(f, "entity {entity} does not declare a key column")
            }
            MetaError::MultipleKeyColumns { entity, count } => write!(
                f,
                "entity {entity} must have exactly one key column, actually has {count}"
            ),
            MetaError::NoTableMetadata { entity } => {
                write!(f, "entity {entity} does not declare a table")
            }
            MetaError::DuplicateColumn { entity, column } => {
                write!(f, "entity {entity} maps column {column} more than once")
            }
        }
    }
}

impl std::error::Error for MetaError {}

/// Errors raised while splicing a condition into a SQL fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    /// Parentheses or quotes do not balance
    Unbalanced { fragment: String },
    /// A WHERE keyword with nothing after it
    EmptyCondition { fragment: String },
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpliceError::Unbalanced { fragment } => {
                write!(f, "unbalanced parentheses or quotes in: {fragment}")
            }
            SpliceError::EmptyCondition { fragment } => {
                write!(f, "WHERE without a condition in: {fragment}")
            }
        }
    }
}

impl std::error::Error for SpliceError {}

/// Error type returned by query engine operations
#[derive(Debug)]
pub enum DbError {
    /// Entity metadata is missing or invalid
    Meta(MetaError),
    /// A key value required by the query is null
    MissingKeyValue { entity: String, column: String },
    /// A relation batch contained entities of different types
    MixedTypeBatch { expected: String },
    /// A value could not be converted into the declared field type
    Coercion(CoercionError),
    /// The transport reported that a single-row query matched nothing
    NoRows,
    /// Placeholder/argument mismatch or malformed pagination
    Param(String),
    /// A row could not be mapped onto an entity
    Mapping(String),
    /// Error raised by the execution transport
    Transport(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Meta(e) => write!(f, "Metadata error: {e}"),
            DbError::MissingKeyValue { entity, column } => {
                write!(f, "Missing key value: {entity}.{column} is null")
            }
            DbError::MixedTypeBatch { expected } => {
                write!(f, "Mixed type batch: every entity must be a {expected}")
            }
            DbError::Coercion(e) => write!(f, "Coercion error: {e}"),
            DbError::NoRows => write!(f, "Query error: no rows returned"),
            DbError::Param(s) => write!(f, "Parameter error: {s}"),
            DbError::Mapping(s) => write!(f, "Mapping error: {s}"),
            DbError::Transport(s) => write!(f, "Transport error: {s}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Meta(e) => Some(e),
            DbError::Coercion(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetaError> for DbError {
    fn from(err: MetaError) -> Self {
        DbError::Meta(err)
    }
}

impl From<CoercionError> for DbError {
    fn from(err: CoercionError) -> Self {
        DbError::Coercion(err)
    }
}
