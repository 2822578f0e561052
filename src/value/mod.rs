//! Value type system for relmap
//!
//! Field values travel as `sea_query::Value`. This module maps Rust field
//! types onto those values and converts between compatible variants.
//!
//! ## Items
//!
//! - **`FieldType`** - The `Value` variant a column field stores
//! - **`FieldValue`** - Rust type ↔ `Value` mapping used by field accessors
//! - **`cast`** - Type coercion into a field's declared type
//! - **`loose_eq`** - Same-type or string-form equality used for relation matching

pub mod cast;
pub mod types;

pub use cast::{cast, loose_eq};
pub use types::{is_null, value_to_string, FieldType, FieldValue};

use std::fmt;

/// Error type for type coercion failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    /// Null written into a field that cannot hold null
    Null { target: FieldType },
    /// The value does not fit the target type's range
    OutOfRange { value: String, target: FieldType },
    /// The value cannot be read as the target type (e.g. unparsable string)
    Invalid { value: String, target: FieldType },
    /// No conversion exists between the two types
    Unsupported { from: String, target: FieldType },
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionError::Null { target } => {
                write!(f, "null cannot be stored in a {target} field")
            }
            CoercionError::OutOfRange { value, target } => {
                write!(f, "value {value} is out of range for {target}")
            }
            CoercionError::Invalid { value, target } => {
                write!(f, "value {value} cannot be read as {target}")
            }
            CoercionError::Unsupported { from, target } => {
                write!(f, "no conversion from {from} to {target}")
            }
        }
    }
}

impl std::error::Error for CoercionError {}
