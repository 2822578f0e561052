//! Field types and the `FieldValue` trait
//!
//! Every column field declares a [`FieldType`]: the `sea_query::Value` variant
//! its Rust field stores. [`FieldValue`] maps a Rust type to that variant and
//! back, going through [`cast`](crate::value::cast) on the way in so a value
//! read from a driver (or from another entity) can land in a compatible field.
//!
//! ## Supported Rust types
//!
//! - Integer types: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`
//! - Floating point: `f32`, `f64`
//! - `bool`, `String`, `char`, `Vec<u8>`
//! - `serde_json::Value`, `uuid::Uuid`, `rust_decimal::Decimal`
//! - `chrono::NaiveDate`, `NaiveTime`, `NaiveDateTime`, `DateTime<Utc>`
//! - `Option<T>` for all of the above

use crate::value::cast::cast;
use crate::value::CoercionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_query::Value;
use sea_query::ValueType as SeaValueType;
use std::fmt;
use uuid::Uuid;

/// The `sea_query::Value` variant a field stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    TinyUnsigned,
    SmallUnsigned,
    Unsigned,
    BigUnsigned,
    Float,
    Double,
    String,
    Char,
    Bytes,
    Json,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Uuid,
    Decimal,
}

impl FieldType {
    /// The field type a value currently carries, or `None` for variants
    /// outside the supported set
    pub fn of(value: &Value) -> Option<FieldType> {
        let field_type = match value {
            Value::Bool(_) => FieldType::Bool,
            Value::TinyInt(_) => FieldType::TinyInt,
            Value::SmallInt(_) => FieldType::SmallInt,
            Value::Int(_) => FieldType::Int,
            Value::BigInt(_) => FieldType::BigInt,
            Value::TinyUnsigned(_) => FieldType::TinyUnsigned,
            Value::SmallUnsigned(_) => FieldType::SmallUnsigned,
            Value::Unsigned(_) => FieldType::Unsigned,
            Value::BigUnsigned(_) => FieldType::BigUnsigned,
            Value::Float(_) => FieldType::Float,
            Value::Double(_) => FieldType::Double,
            Value::String(_) => FieldType::String,
            Value::Char(_) => FieldType::Char,
            Value::Bytes(_) => FieldType::Bytes,
            Value::Json(_) => FieldType::Json,
            Value::ChronoDate(_) => FieldType::Date,
            Value::ChronoTime(_) => FieldType::Time,
            Value::ChronoDateTime(_) => FieldType::DateTime,
            Value::ChronoDateTimeUtc(_) => FieldType::DateTimeUtc,
            Value::Uuid(_) => FieldType::Uuid,
            Value::Decimal(_) => FieldType::Decimal,
            _ => return None,
        };
        Some(field_type)
    }

    /// The null variant for this field type
    pub fn null_value(self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(None),
            FieldType::TinyInt => Value::TinyInt(None),
            FieldType::SmallInt => Value::SmallInt(None),
            FieldType::Int => Value::Int(None),
            FieldType::BigInt => Value::BigInt(None),
            FieldType::TinyUnsigned => Value::TinyUnsigned(None),
            FieldType::SmallUnsigned => Value::SmallUnsigned(None),
            FieldType::Unsigned => Value::Unsigned(None),
            FieldType::BigUnsigned => Value::BigUnsigned(None),
            FieldType::Float => Value::Float(None),
            FieldType::Double => Value::Double(None),
            FieldType::String => Value::String(None),
            FieldType::Char => Value::Char(None),
            FieldType::Bytes => Value::Bytes(None),
            FieldType::Json => Value::Json(None),
            FieldType::Date => Value::ChronoDate(None),
            FieldType::Time => Value::ChronoTime(None),
            FieldType::DateTime => Value::ChronoDateTime(None),
            FieldType::DateTimeUtc => Value::ChronoDateTimeUtc(None),
            FieldType::Uuid => Value::Uuid(None),
            FieldType::Decimal => Value::Decimal(None),
        }
    }

    /// Whether this is one of the integer field types
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::TinyInt
                | FieldType::SmallInt
                | FieldType::Int
                | FieldType::BigInt
                | FieldType::TinyUnsigned
                | FieldType::SmallUnsigned
                | FieldType::Unsigned
                | FieldType::BigUnsigned
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether a value is the null form of its variant
///
/// Variants outside the supported set are never considered null.
pub fn is_null(value: &Value) -> bool {
    match FieldType::of(value) {
        Some(field_type) => *value == field_type.null_value(),
        None => false,
    }
}

/// Display form of a value, used for string-form comparisons and
/// string targets. `None` for nulls and unsupported variants.
pub fn value_to_string(value: &Value) -> Option<String> {
    if is_null(value) {
        return None;
    }
    let text = match value {
        Value::Bool(Some(b)) => b.to_string(),
        Value::TinyInt(Some(i)) => i.to_string(),
        Value::SmallInt(Some(i)) => i.to_string(),
        Value::Int(Some(i)) => i.to_string(),
        Value::BigInt(Some(i)) => i.to_string(),
        Value::TinyUnsigned(Some(u)) => u.to_string(),
        Value::SmallUnsigned(Some(u)) => u.to_string(),
        Value::Unsigned(Some(u)) => u.to_string(),
        Value::BigUnsigned(Some(u)) => u.to_string(),
        Value::Float(Some(f)) => f.to_string(),
        Value::Double(Some(d)) => d.to_string(),
        Value::String(Some(s)) => s.to_string(),
        Value::Char(Some(c)) => c.to_string(),
        Value::Bytes(Some(b)) => String::from_utf8_lossy(b).into_owned(),
        Value::Json(_) => <serde_json::Value as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        Value::ChronoDate(_) => <NaiveDate as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        Value::ChronoTime(_) => <NaiveTime as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        Value::ChronoDateTime(_) => <NaiveDateTime as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        Value::ChronoDateTimeUtc(_) => {
            <DateTime<Utc> as SeaValueType>::try_from(value.clone())
                .ok()?
                .to_rfc3339()
        }
        Value::Uuid(_) => <Uuid as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        Value::Decimal(_) => <Decimal as SeaValueType>::try_from(value.clone())
            .ok()?
            .to_string(),
        _ => return None,
    };
    Some(text)
}

/// Trait for Rust types that can back a column field.
///
/// `from_value` accepts any value [`cast`] can convert into
/// [`FieldValue::field_type`]; null is only accepted by `Option<T>`.
///
/// ## Example
///
/// ```rust
/// use relmap::value::{FieldType, FieldValue};
/// use sea_query::Value;
///
/// assert_eq!(i32::field_type(), FieldType::Int);
/// assert!(matches!(42i32.into_value(), Value::Int(Some(42))));
///
/// // A BIGINT read from the driver lands in an i32 field
/// assert_eq!(i32::from_value(Value::BigInt(Some(7))), Ok(7));
/// assert_eq!(<Option<i32>>::from_value(Value::BigInt(None)), Ok(None));
/// ```
pub trait FieldValue: Sized {
    /// The variant this type is stored as
    fn field_type() -> FieldType;

    /// Convert this value into a `sea_query::Value`
    fn into_value(self) -> Value;

    /// Convert a `sea_query::Value` into this type, coercing compatible variants
    fn from_value(value: Value) -> Result<Self, CoercionError>;
}

macro_rules! impl_field_value {
    ($type:ty, $field_type:ident) => {
        impl FieldValue for $type {
            fn field_type() -> FieldType {
                FieldType::$field_type
            }

            fn into_value(self) -> Value {
                Value::from(self)
            }

            fn from_value(value: Value) -> Result<Self, CoercionError> {
                let value = cast(value, FieldType::$field_type)?;
                if is_null(&value) {
                    return Err(CoercionError::Null {
                        target: FieldType::$field_type,
                    });
                }
                <$type as SeaValueType>::try_from(value).map_err(|_| CoercionError::Unsupported {
                    from: stringify!($field_type).to_string(),
                    target: FieldType::$field_type,
                })
            }
        }
    };
}

impl_field_value!(bool, Bool);
impl_field_value!(i8, TinyInt);
impl_field_value!(i16, SmallInt);
impl_field_value!(i32, Int);
impl_field_value!(i64, BigInt);
impl_field_value!(u8, TinyUnsigned);
impl_field_value!(u16, SmallUnsigned);
impl_field_value!(u32, Unsigned);
impl_field_value!(u64, BigUnsigned);
impl_field_value!(f32, Float);
impl_field_value!(f64, Double);
impl_field_value!(String, String);
impl_field_value!(char, Char);
impl_field_value!(Vec<u8>, Bytes);
impl_field_value!(serde_json::Value, Json);
impl_field_value!(NaiveDate, Date);
impl_field_value!(NaiveTime, Time);
impl_field_value!(NaiveDateTime, DateTime);
impl_field_value!(DateTime<Utc>, DateTimeUtc);
impl_field_value!(Uuid, Uuid);
impl_field_value!(Decimal, Decimal);

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => T::field_type().null_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        if is_null(&value) {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_field_value() {
        let value = 42i32.into_value();
        assert!(matches!(value, Value::Int(Some(42))));
        assert_eq!(i32::from_value(value), Ok(42));
    }

    #[test]
    fn test_string_field_value() {
        let value = "hello".to_string().into_value();
        assert!(matches!(value, Value::String(Some(ref s)) if s == "hello"));
        assert_eq!(String::from_value(value), Ok("hello".to_string()));
    }

    #[test]
    fn test_option_field_value() {
        let value = Some(42i64).into_value();
        assert!(matches!(value, Value::BigInt(Some(42))));
        assert_eq!(<Option<i64>>::from_value(value), Ok(Some(42)));

        let none_value = None::<i64>.into_value();
        assert_eq!(none_value, Value::BigInt(None));
        assert_eq!(<Option<i64>>::from_value(none_value), Ok(None));
    }

    #[test]
    fn test_null_rejected_by_plain_type() {
        let result = i32::from_value(Value::Int(None));
        assert_eq!(result, Err(CoercionError::Null { target: FieldType::Int }));
    }

    #[test]
    fn test_from_value_coerces_compatible_variant() {
        assert_eq!(i64::from_value(Value::Int(Some(5))), Ok(5));
        assert_eq!(String::from_value(Value::BigInt(Some(5))), Ok("5".to_string()));
        assert_eq!(u8::from_value(Value::String(Some("12".to_string()))), Ok(12));
    }

    #[test]
    fn test_field_type_of() {
        assert_eq!(FieldType::of(&Value::Double(Some(1.5))), Some(FieldType::Double));
        assert_eq!(FieldType::of(&Value::ChronoDate(None)), Some(FieldType::Date));
        assert_eq!(FieldType::of(&Value::Uuid(None)), Some(FieldType::Uuid));
    }

    #[test]
    fn test_is_null() {
        assert!(is_null(&Value::String(None)));
        assert!(is_null(&Value::Decimal(None)));
        assert!(!is_null(&Value::Int(Some(0))));
        assert!(!is_null(&Value::String(Some(String::new()))));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&Value::BigInt(Some(5))), Some("5".to_string()));
        assert_eq!(
            value_to_string(&Value::String(Some("5".to_string()))),
            Some("5".to_string())
        );
        assert_eq!(value_to_string(&Value::Bool(Some(true))), Some("true".to_string()));
        assert_eq!(value_to_string(&Value::Int(None)), None);

        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(value_to_string(&date.into_value()), Some("2024-02-29".to_string()));
    }
}
