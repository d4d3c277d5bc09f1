//! Typed filter values.
//!
//! Request values arrive as strings. Before a value reaches an executor it is
//! converted to the native type of the column it is compared against, so a
//! numeric `gt` is a typed range predicate and never a string comparison.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rowgate_core::{ColumnSchema, DataCategory};
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoercionError;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric kept in its textual form (`numeric`, `decimal`, `NUMBER`).
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Uuid(Uuid),
}

impl TypedValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Null => "null",
            TypedValue::Bool(_) => "bool",
            TypedValue::Int(_) => "int",
            TypedValue::Float(_) => "float",
            TypedValue::Decimal(_) => "decimal",
            TypedValue::Text(_) => "text",
            TypedValue::Date(_) => "date",
            TypedValue::Time(_) => "time",
            TypedValue::Timestamp(_) => "timestamp",
            TypedValue::Uuid(_) => "uuid",
        }
    }

    /// JSON form, used by document queries and client-side evaluation.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::Int(n) => Value::from(*n),
            TypedValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Decimal(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(s.clone())),
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            TypedValue::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
            TypedValue::Timestamp(ts) => {
                Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            TypedValue::Uuid(u) => Value::String(u.to_string()),
        }
    }
}

const EXACT_NUMERIC: &[&str] = &[
    "numeric", "decimal", "dec", "number", "money", "smallmoney", "decfloat", "varint",
    "decimal128",
];

const FLOATING: &[&str] = &[
    "real", "float", "float4", "float8", "double", "double precision", "binary_float",
    "binary_double",
];

fn base_type(data_type: &str) -> String {
    data_type
        .trim()
        .to_ascii_lowercase()
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches(" unsigned")
        .to_string()
}

/// Convert `raw` to the native type of `column`.
///
/// This is the engine-neutral part of coercion; dialects refine it where an
/// engine stores a category differently.
pub fn coerce_for_column(column: &ColumnSchema, raw: &str) -> Result<TypedValue, CoercionError> {
    let trimmed = raw.trim();
    let err = |expected: &'static str| CoercionError::new(&column.name, raw, expected);
    let base = base_type(&column.data_type);

    match column.category() {
        DataCategory::Numeric => {
            if trimmed.is_empty() {
                return Err(err("a number"));
            }
            if EXACT_NUMERIC.contains(&base.as_str()) {
                return parse_decimal(trimmed).ok_or_else(|| err("a decimal number"));
            }
            if FLOATING.contains(&base.as_str()) {
                return trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(TypedValue::Float)
                    .ok_or_else(|| err("a floating point number"));
            }
            trimmed
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|_| err("an integer"))
        }
        DataCategory::Boolean => parse_bool(trimmed)
            .map(TypedValue::Bool)
            .ok_or_else(|| err("a boolean")),
        DataCategory::Temporal => parse_temporal(&base, trimmed).ok_or_else(|| err("a date or time")),
        DataCategory::Identifier => {
            if base == "objectid" {
                let valid = trimmed.len() == 24 && trimmed.chars().all(|c| c.is_ascii_hexdigit());
                return valid
                    .then(|| TypedValue::Text(trimmed.to_ascii_lowercase()))
                    .ok_or_else(|| err("a 24-character hex object id"));
            }
            Uuid::parse_str(trimmed)
                .map(TypedValue::Uuid)
                .map_err(|_| err("a uuid"))
        }
        DataCategory::Text | DataCategory::Json | DataCategory::Binary | DataCategory::Other => {
            Ok(TypedValue::Text(raw.to_string()))
        }
    }
}

fn parse_decimal(raw: &str) -> Option<TypedValue> {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next().unwrap_or_default();
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    well_formed.then(|| TypedValue::Decimal(raw.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_temporal(base: &str, raw: &str) -> Option<TypedValue> {
    if base == "year" {
        return raw.parse::<i64>().ok().map(TypedValue::Int);
    }
    let time_only = base == "time" || (base.starts_with("time ") && !base.starts_with("timestamp"));
    if time_only {
        return NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
            .map(TypedValue::Time);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(TypedValue::Timestamp(dt.naive_utc()));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(TypedValue::Timestamp(dt));
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    if base == "date" {
        Some(TypedValue::Date(date))
    } else {
        date.and_hms_opt(0, 0, 0).map(TypedValue::Timestamp)
    }
}
