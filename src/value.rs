use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{color::Color, error::ConversionError};

/// Text form of datetime values, in UTC.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value produced by evaluation or held by a variable.
///
/// The set of variants is closed; every operator and function matches on it
/// explicitly. Integers and numbers are kept apart: integer arithmetic stays
/// integer (and fails on overflow) while any number operand promotes the
/// result to a number.
///
/// # Examples
///
/// ```
/// use divkit_expr::Value;
/// use std::collections::BTreeMap;
///
/// let count = Value::Integer(3);
/// let ratio = Value::Number(0.5);
/// let title = Value::String("Inbox".to_string());
///
/// let mut dict = BTreeMap::new();
/// dict.insert("count".to_string(), count.clone());
/// let dict = Value::Dict(dict);
///
/// assert_eq!(ratio.to_string(), "0.5");
/// assert_eq!(dict.to_string(), r#"{"count":3}"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),

    /// Double precision floating point number
    Number(f64),

    /// UTF-8 string
    String(String),

    /// Boolean (true/false)
    Boolean(bool),

    /// ARGB color
    Color(Color),

    /// URL, kept as written
    Url(String),

    /// Instant in time
    DateTime(DateTime<Utc>),

    /// Array of values (heterogeneous)
    Array(Vec<Value>),

    /// Dict with string keys, ordered by key
    Dict(BTreeMap<String, Value>),
}

/// Type tag of a [`Value`], also used for declared variable types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Number,
    String,
    Boolean,
    Color,
    Url,
    DateTime,
    Array,
    Dict,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Color => "color",
            ValueType::Url => "url",
            ValueType::DateTime => "datetime",
            ValueType::Array => "array",
            ValueType::Dict => "dict",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Color(_) => ValueType::Color,
            Value::Url(_) => ValueType::Url,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Array(_) => ValueType::Array,
            Value::Dict(_) => ValueType::Dict,
        }
    }

    /// Get as float, widening integers
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts to `ty` when that needs no more than the integer to number
    /// widening; `None` for any other type change.
    pub fn conform_to(self, ty: ValueType) -> Option<Value> {
        match (self, ty) {
            (Value::Integer(n), ValueType::Number) => Some(Value::Number(n as f64)),
            (value, ty) if value.value_type() == ty => Some(value),
            _ => None,
        }
    }

    /// Reads a JSON value as a value of the declared type.
    ///
    /// Colors, URLs and datetimes are read from strings. Integers are accepted
    /// where numbers are expected.
    pub fn from_json_typed(json: serde_json::Value, ty: ValueType) -> Result<Value, ConversionError> {
        let mismatch = |json: &serde_json::Value| ConversionError {
            expected: ty,
            found: json.to_string(),
        };

        match (ty, json) {
            (ValueType::Integer, serde_json::Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => Err(mismatch(&serde_json::Value::Number(n))),
            },
            (ValueType::Number, serde_json::Value::Number(n)) => match n.as_f64() {
                Some(f) => Ok(Value::Number(f)),
                None => Err(mismatch(&serde_json::Value::Number(n))),
            },
            (ValueType::String, serde_json::Value::String(s)) => Ok(Value::String(s)),
            (ValueType::Boolean, serde_json::Value::Bool(b)) => Ok(Value::Boolean(b)),
            // Card JSON commonly encodes booleans as 0/1
            (ValueType::Boolean, serde_json::Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Value::Boolean(false)),
                Some(1) => Ok(Value::Boolean(true)),
                _ => Err(mismatch(&serde_json::Value::Number(n))),
            },
            (ValueType::Color, serde_json::Value::String(s)) => match Color::parse(&s) {
                Ok(color) => Ok(Value::Color(color)),
                Err(_) => Err(mismatch(&serde_json::Value::String(s))),
            },
            (ValueType::Url, serde_json::Value::String(s)) => Ok(Value::Url(s)),
            (ValueType::DateTime, serde_json::Value::String(s)) => match parse_datetime(&s) {
                Some(dt) => Ok(Value::DateTime(dt)),
                None => Err(mismatch(&serde_json::Value::String(s))),
            },
            (ValueType::Array, serde_json::Value::Array(items)) => items
                .into_iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (ValueType::Dict, serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| Value::from_json(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Dict),
            (_, json) => Err(mismatch(&json)),
        }
    }

    /// Reads a JSON value, inferring the type from its shape.
    ///
    /// `null` has no counterpart and is rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Value, ConversionError> {
        let ty = match &json {
            serde_json::Value::Null => {
                return Err(ConversionError {
                    expected: ValueType::Dict,
                    found: "null".to_string(),
                });
            }
            serde_json::Value::Bool(_) => ValueType::Boolean,
            serde_json::Value::Number(n) if n.is_i64() => ValueType::Integer,
            serde_json::Value::Number(_) => ValueType::Number,
            serde_json::Value::String(_) => ValueType::String,
            serde_json::Value::Array(_) => ValueType::Array,
            serde_json::Value::Object(_) => ValueType::Dict,
        };
        Value::from_json_typed(json, ty)
    }

    /// Converts to JSON; colors, URLs and datetimes become strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Number(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Url(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Color(c) => serde_json::Value::String(c.to_string()),
            Value::DateTime(dt) => serde_json::Value::String(dt.format(DATETIME_FORMAT).to_string()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Dict(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Formats a number the way templates print it: whole values keep a `.0`
/// suffix so they stay distinguishable from integers.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}

/// Parses `yyyy-MM-dd HH:mm:ss` as a UTC instant.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) | Value::Url(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Color(c) => write!(f, "{}", c),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Array(_) | Value::Dict(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}
