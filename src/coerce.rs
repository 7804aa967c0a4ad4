//! Scalar types and value coercion
//!
//! Coercion never panics and never throws: it returns either the converted
//! value or a short reason that the evaluator turns into an
//! `"is invalid: <reason>"` error.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Declared type of a scalar attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// Accepted as given, no coercion
    Any,
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    /// ISO calendar date, `YYYY-MM-DD`
    Date,
    /// RFC 3339 timestamp
    DateTime,
}

impl ScalarType {
    /// The tag used in declaration documents
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarType::Any => "any",
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
            ScalarType::DateTime => "datetime",
        }
    }

    /// Convert a present, non-null value to this type.
    ///
    /// `Ok(Value::Null)` is returned for an empty string given to a
    /// non-string type, and for an empty array or object given to any typed
    /// attribute, so blank form fields behave like absent ones.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if *self != ScalarType::Any && empty_container(value) {
            return Ok(Value::Null);
        }

        match self {
            ScalarType::Any => Ok(value.clone()),
            ScalarType::String => coerce_string(value),
            ScalarType::Integer => coerce_integer(value),
            ScalarType::Float => coerce_float(value),
            ScalarType::Boolean => coerce_boolean(value),
            ScalarType::Date => coerce_date(value),
            ScalarType::DateTime => coerce_datetime(value),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(ScalarType::Any),
            "string" => Ok(ScalarType::String),
            "integer" => Ok(ScalarType::Integer),
            "float" => Ok(ScalarType::Float),
            "boolean" => Ok(ScalarType::Boolean),
            "date" => Ok(ScalarType::Date),
            "datetime" => Ok(ScalarType::DateTime),
            other => Err(format!("unknown scalar type '{}'", other)),
        }
    }
}

/// Short description of a value's JSON type for error reasons
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a scalar as the string a format check matches against
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn blank_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

fn coerce_string(value: &Value) -> Result<Value, String> {
    match as_text(value) {
        Some(s) => Ok(Value::String(s)),
        None => Err(format!("expected a string, got {}", type_name(value))),
    }
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    if blank_string(value) {
        return Ok(Value::Null);
    }

    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => integral(n.as_f64().unwrap_or(f64::NAN))
            .ok_or_else(|| format!("{} is not an integer", n)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(integral)
                .ok_or_else(|| format!("'{}' is not an integer", s))
        }
        other => Err(format!("expected an integer, got {}", type_name(other))),
    }
}

fn integral(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    if blank_string(value) {
        return Ok(Value::Null);
    }

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => return Err(format!("expected a number, got {}", type_name(other))),
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("{} is not a number", value))
}

fn coerce_boolean(value: &Value) -> Result<Value, String> {
    if blank_string(value) {
        return Ok(Value::Null);
    }

    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "f" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            other => Err(format!("'{}' is not a boolean", other)),
        },
        other => Err(format!("expected a boolean, got {}", type_name(other))),
    }
}

fn coerce_date(value: &Value) -> Result<Value, String> {
    if blank_string(value) {
        return Ok(Value::Null);
    }

    let Value::String(s) = value else {
        return Err(format!("expected a date string, got {}", type_name(value)));
    };

    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .map_err(|e| format!("'{}' is not a date ({})", s, e))
}

fn coerce_datetime(value: &Value) -> Result<Value, String> {
    if blank_string(value) {
        return Ok(Value::Null);
    }

    let Value::String(s) = value else {
        return Err(format!("expected a timestamp string, got {}", type_name(value)));
    };

    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| Value::String(dt.to_rfc3339()))
        .map_err(|e| format!("'{}' is not a timestamp ({})", s, e))
}
