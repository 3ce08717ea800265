// Field values as seen by validators, documents, and stores

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ulid::Ulid;

/// A document field value.
///
/// `Undefined` marks an absent value. Inside a `Sequence` it is a hole, which is
/// what makes an array sparse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Text(String),
    Numeric(f64),
    Temporal(DateTime<Utc>),
    Binary(Vec<u8>),
    Identifier(Ulid),
    Sequence(Vec<Value>),
    Structured(BTreeMap<String, Value>),
}

impl Value {
    /// True for `Undefined` and `Null`, the two "no value" states.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Structured(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of a `Structured` value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_structured().and_then(|map| map.get(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "string",
            Value::Numeric(_) => "number",
            Value::Temporal(_) => "date",
            Value::Binary(_) => "binary",
            Value::Identifier(_) => "identifier",
            Value::Sequence(_) => "array",
            Value::Structured(_) => "object",
        }
    }

    /// Lossy JSON rendering, used for filters and display.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Numeric(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Temporal(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Binary(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            ),
            Value::Identifier(id) => serde_json::Value::String(id.to_string()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Structured(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Render a number the way messages expect: integral values without a fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
            Value::Numeric(n) => f.write_str(&format_number(*n)),
            Value::Temporal(d) => f.write_str(&d.to_rfc3339()),
            Value::Binary(bytes) => write!(f, "<Binary {} bytes>", bytes.len()),
            Value::Identifier(id) => write!(f, "{id}"),
            Value::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(","))
            }
            Value::Structured(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Numeric(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Structured(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

macro_rules! numeric_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Numeric(n as f64)
                }
            }
        )*
    };
}

numeric_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Temporal(d)
    }
}

impl From<Ulid> for Value {
    fn from(id: Ulid) -> Self {
        Value::Identifier(id)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Structured(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Structured(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The parameter of an ordering rule (`minimum`, `maximum`, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Numeric(f64),
    Temporal(DateTime<Utc>),
}

impl Bound {
    /// Numeric view of the bound. Dates are measured in milliseconds since the epoch.
    pub fn as_f64(&self) -> f64 {
        match self {
            Bound::Numeric(n) => *n,
            Bound::Temporal(d) => d.timestamp_millis() as f64,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Numeric(n) => f.write_str(&format_number(*n)),
            Bound::Temporal(d) => f.write_str(&d.to_rfc3339()),
        }
    }
}

macro_rules! bound_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Bound {
                fn from(n: $t) -> Self {
                    Bound::Numeric(n as f64)
                }
            }
        )*
    };
}

bound_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<DateTime<Utc>> for Bound {
    fn from(d: DateTime<Utc>) -> Self {
        Bound::Temporal(d)
    }
}

/// Milliseconds since the epoch to a date, if in range.
pub(crate) fn temporal_from_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}
