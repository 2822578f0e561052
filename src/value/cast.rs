//! Type coercion between `sea_query::Value` variants
//!
//! [`cast`] converts a value into the variant a field declares. Values read
//! from a driver rarely carry the exact variant a Rust field stores (a MySQL
//! `INT UNSIGNED` arrives as `BigInt`, a `DECIMAL` as a string, ...), so every
//! field write goes through here. Conversions that would lose information
//! (out-of-range integers, fractional floats into integers, unparsable
//! strings) fail with [`CoercionError`] instead of truncating.

use crate::value::types::{is_null, value_to_string, FieldType};
use crate::value::CoercionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_query::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Largest integer magnitudes the float variants hold exactly
const F32_EXACT_INT: u128 = 1 << 24;
const F64_EXACT_INT: u128 = 1 << 53;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Intermediate form every non-null source value is decomposed into
#[derive(Debug, Clone)]
enum Scalar {
    Bool(bool),
    Int(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    Uuid(Uuid),
    Decimal(Decimal),
}

/// Convert `value` into the variant `target` requires.
///
/// - Same variant: returned unchanged.
/// - Null of any variant: re-tagged as the null of `target`.
/// - Otherwise the value is widened, narrowed, parsed or formatted when that
///   can be done without losing information.
///
/// # Errors
///
/// Returns [`CoercionError`] when the conversion is not supported or would
/// truncate the value.
///
/// # Example
///
/// ```rust
/// use relmap::value::{cast, FieldType};
/// use sea_query::Value;
///
/// assert_eq!(cast(Value::BigInt(Some(5)), FieldType::Int).unwrap(), Value::Int(Some(5)));
/// assert_eq!(
///     cast(Value::Int(Some(5)), FieldType::String).unwrap(),
///     Value::String(Some("5".to_string()))
/// );
/// assert!(cast(Value::BigInt(Some(300)), FieldType::TinyUnsigned).is_err());
/// ```
pub fn cast(value: Value, target: FieldType) -> Result<Value, CoercionError> {
    let source = FieldType::of(&value).ok_or_else(|| CoercionError::Unsupported {
        from: format!("{value:?}"),
        target,
    })?;
    if source == target {
        return Ok(value);
    }
    if is_null(&value) {
        return Ok(target.null_value());
    }

    let scalar = Scalar::decompose(value, source, target)?;
    scalar.into_target(source, target)
}

impl Scalar {
    fn decompose(value: Value, source: FieldType, target: FieldType) -> Result<Scalar, CoercionError> {
        let unsupported = || CoercionError::Unsupported {
            from: source.to_string(),
            target,
        };
        let scalar = match value {
            Value::Bool(Some(b)) => Scalar::Bool(b),
            Value::TinyInt(Some(i)) => Scalar::Int(i as i128),
            Value::SmallInt(Some(i)) => Scalar::Int(i as i128),
            Value::Int(Some(i)) => Scalar::Int(i as i128),
            Value::BigInt(Some(i)) => Scalar::Int(i as i128),
            Value::TinyUnsigned(Some(u)) => Scalar::Int(u as i128),
            Value::SmallUnsigned(Some(u)) => Scalar::Int(u as i128),
            Value::Unsigned(Some(u)) => Scalar::Int(u as i128),
            Value::BigUnsigned(Some(u)) => Scalar::Int(u as i128),
            Value::Float(Some(f)) => Scalar::Float(f as f64),
            Value::Double(Some(d)) => Scalar::Float(d),
            Value::Char(Some(c)) => Scalar::Text(c.to_string()),
            other => match source {
                FieldType::String => Scalar::Text(
                    <String as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                FieldType::Bytes => Scalar::Bytes(
                    <Vec<u8> as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                FieldType::Json => Scalar::Json(
                    <serde_json::Value as sea_query::ValueType>::try_from(other)
                        .map_err(|_| unsupported())?,
                ),
                FieldType::Date => Scalar::Date(
                    <NaiveDate as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                FieldType::Time => Scalar::Time(
                    <NaiveTime as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                FieldType::DateTime => Scalar::DateTime(
                    <NaiveDateTime as sea_query::ValueType>::try_from(other)
                        .map_err(|_| unsupported())?,
                ),
                FieldType::DateTimeUtc => Scalar::DateTimeUtc(
                    <DateTime<Utc> as sea_query::ValueType>::try_from(other)
                        .map_err(|_| unsupported())?,
                ),
                FieldType::Uuid => Scalar::Uuid(
                    <Uuid as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                FieldType::Decimal => Scalar::Decimal(
                    <Decimal as sea_query::ValueType>::try_from(other).map_err(|_| unsupported())?,
                ),
                _ => return Err(unsupported()),
            },
        };
        Ok(scalar)
    }

    /// Display form, shared by string targets and parse-based conversions
    fn text(&self) -> Option<String> {
        let text = match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Bytes(b) => String::from_utf8(b.clone()).ok()?,
            Scalar::Json(j) => match j {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            Scalar::Date(d) => d.to_string(),
            Scalar::Time(t) => t.to_string(),
            Scalar::DateTime(dt) => dt.to_string(),
            Scalar::DateTimeUtc(dt) => dt.to_rfc3339(),
            Scalar::Uuid(u) => u.to_string(),
            Scalar::Decimal(d) => d.to_string(),
        };
        Some(text)
    }

    fn into_target(self, source: FieldType, target: FieldType) -> Result<Value, CoercionError> {
        let invalid = |value: &Scalar| CoercionError::Invalid {
            value: value.text().unwrap_or_else(|| format!("{value:?}")),
            target,
        };
        let unsupported = || CoercionError::Unsupported {
            from: source.to_string(),
            target,
        };

        if target.is_integer() {
            let wide = self.to_i128().ok_or_else(|| invalid(&self))?;
            return integer_value(wide, target).ok_or(CoercionError::OutOfRange {
                value: wide.to_string(),
                target,
            });
        }

        let value = match target {
            FieldType::Bool => match &self {
                Scalar::Bool(b) => Value::from(*b),
                Scalar::Int(0) => Value::from(false),
                Scalar::Int(1) => Value::from(true),
                Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Value::from(true),
                    "false" | "0" => Value::from(false),
                    _ => return Err(invalid(&self)),
                },
                Scalar::Int(_) => return Err(invalid(&self)),
                _ => return Err(unsupported()),
            },
            FieldType::Float | FieldType::Double => {
                let exact = if target == FieldType::Float {
                    F32_EXACT_INT
                } else {
                    F64_EXACT_INT
                };
                let out_of_range = |value: String| CoercionError::OutOfRange { value, target };
                let float = match &self {
                    Scalar::Int(i) => {
                        if i.unsigned_abs() > exact {
                            return Err(out_of_range(i.to_string()));
                        }
                        *i as f64
                    }
                    Scalar::Float(f) => *f,
                    Scalar::Decimal(d) => d.to_f64().ok_or_else(|| invalid(&self))?,
                    Scalar::Text(s) => match s.trim().parse::<f64>() {
                        Ok(f) if f.is_finite() => f,
                        _ => return Err(invalid(&self)),
                    },
                    _ => return Err(unsupported()),
                };
                if target == FieldType::Float {
                    let narrow = float as f32;
                    if float.is_finite() && !narrow.is_finite() {
                        return Err(out_of_range(float.to_string()));
                    }
                    Value::from(narrow)
                } else {
                    Value::from(float)
                }
            }
            FieldType::String => Value::from(self.text().ok_or_else(|| invalid(&self))?),
            FieldType::Char => {
                let text = self.text().ok_or_else(|| invalid(&self))?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::from(c),
                    _ => return Err(invalid(&self)),
                }
            }
            FieldType::Bytes => match self {
                Scalar::Text(s) => Value::from(s.into_bytes()),
                Scalar::Uuid(u) => Value::from(u.as_bytes().to_vec()),
                _ => return Err(unsupported()),
            },
            FieldType::Json => {
                let json = match &self {
                    Scalar::Text(s) => {
                        serde_json::from_str::<serde_json::Value>(s).map_err(|_| invalid(&self))?
                    }
                    Scalar::Bool(b) => serde_json::Value::from(*b),
                    Scalar::Int(i) => match i64::try_from(*i) {
                        Ok(i) => serde_json::Value::from(i),
                        Err(_) => return Err(invalid(&self)),
                    },
                    Scalar::Float(f) => serde_json::Value::from(*f),
                    _ => return Err(unsupported()),
                };
                Value::from(json)
            }
            FieldType::Date => match &self {
                Scalar::DateTime(dt) => Value::from(dt.date()),
                Scalar::DateTimeUtc(dt) => Value::from(dt.date_naive()),
                Scalar::Text(s) => Value::from(
                    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| invalid(&self))?,
                ),
                _ => return Err(unsupported()),
            },
            FieldType::Time => match &self {
                Scalar::DateTime(dt) => Value::from(dt.time()),
                Scalar::Text(s) => Value::from(
                    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                        .map_err(|_| invalid(&self))?,
                ),
                _ => return Err(unsupported()),
            },
            FieldType::DateTime => match &self {
                Scalar::Date(d) => Value::from(midnight(d).ok_or_else(|| invalid(&self))?),
                Scalar::DateTimeUtc(dt) => Value::from(dt.naive_utc()),
                Scalar::Text(s) => Value::from(parse_date_time(s).ok_or_else(|| invalid(&self))?),
                _ => return Err(unsupported()),
            },
            FieldType::DateTimeUtc => match &self {
                Scalar::DateTime(dt) => Value::from(dt.and_utc()),
                Scalar::Date(d) => Value::from(midnight(d).ok_or_else(|| invalid(&self))?.and_utc()),
                Scalar::Text(s) => {
                    let parsed = DateTime::parse_from_rfc3339(s.trim())
                        .map(|dt| dt.with_timezone(&Utc))
                        .ok()
                        .or_else(|| parse_date_time(s).map(|dt| dt.and_utc()))
                        .ok_or_else(|| invalid(&self))?;
                    Value::from(parsed)
                }
                _ => return Err(unsupported()),
            },
            FieldType::Uuid => match &self {
                Scalar::Text(s) => Value::from(Uuid::parse_str(s.trim()).map_err(|_| invalid(&self))?),
                Scalar::Bytes(b) => Value::from(Uuid::from_slice(b).map_err(|_| invalid(&self))?),
                _ => return Err(unsupported()),
            },
            FieldType::Decimal => {
                let decimal = match &self {
                    Scalar::Int(i) => {
                        Decimal::try_from_i128_with_scale(*i, 0).map_err(|_| invalid(&self))?
                    }
                    Scalar::Float(f) => Decimal::try_from(*f).map_err(|_| invalid(&self))?,
                    Scalar::Text(s) => Decimal::from_str(s.trim()).map_err(|_| invalid(&self))?,
                    _ => return Err(unsupported()),
                };
                Value::from(decimal)
            }
            _ => return Err(unsupported()),
        };
        Ok(value)
    }

    /// Integral reading of the scalar, `None` when it has a fractional part
    /// or cannot be read as a number
    fn to_i128(&self) -> Option<i128> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Bool(b) => Some(i128::from(*b)),
            Scalar::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1.7e38 {
                    Some(*f as i128)
                } else {
                    None
                }
            }
            Scalar::Decimal(d) => {
                if d.fract().is_zero() {
                    d.to_i128()
                } else {
                    None
                }
            }
            Scalar::Text(s) => s.trim().parse::<i128>().ok(),
            _ => None,
        }
    }
}

fn integer_value(wide: i128, target: FieldType) -> Option<Value> {
    let value = match target {
        FieldType::TinyInt => Value::from(i8::try_from(wide).ok()?),
        FieldType::SmallInt => Value::from(i16::try_from(wide).ok()?),
        FieldType::Int => Value::from(i32::try_from(wide).ok()?),
        FieldType::BigInt => Value::from(i64::try_from(wide).ok()?),
        FieldType::TinyUnsigned => Value::from(u8::try_from(wide).ok()?),
        FieldType::SmallUnsigned => Value::from(u16::try_from(wide).ok()?),
        FieldType::Unsigned => Value::from(u32::try_from(wide).ok()?),
        FieldType::BigUnsigned => Value::from(u64::try_from(wide).ok()?),
        _ => return None,
    };
    Some(value)
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| midnight(&d))
        })
}

fn midnight(date: &NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

/// Compare a local and a remote value the way related fields are matched.
///
/// Returns `(matched, cross_type)`. Values of the same variant use value
/// equality; values of different variants fall back to their string forms and
/// report `cross_type = true` so the caller can flag the likely schema
/// mismatch. Nulls never match.
pub fn loose_eq(local: &Value, remote: &Value) -> (bool, bool) {
    if is_null(local) || is_null(remote) {
        return (false, false);
    }
    let same_type = match (FieldType::of(local), FieldType::of(remote)) {
        (Some(a), Some(b)) => a == b,
        _ => std::mem::discriminant(local) == std::mem::discriminant(remote),
    };
    if same_type {
        return (local == remote, false);
    }
    let matched = match (value_to_string(local), value_to_string(remote)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    (matched, true)
}
