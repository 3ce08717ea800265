use crate::value::{format_number, temporal_from_millis, Value};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// A shared callable compared by identity, so descriptors holding closures can
/// still be compared and cloned.
pub struct Func<F: ?Sized>(pub(crate) Arc<F>);

impl<F: ?Sized> Func<F> {
    pub fn new(f: Arc<F>) -> Self {
        Func(f)
    }
}

impl<F: ?Sized> Clone for Func<F> {
    fn clone(&self) -> Self {
        Func(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> PartialEq for Func<F> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl<F: ?Sized> fmt::Debug for Func<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Func(..)")
    }
}

pub type Predicate = Func<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Transform = Func<dyn Fn(Value) -> Value + Send + Sync>;
pub type Generator = Func<dyn Fn() -> Value + Send + Sync>;

/// The primitive kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Binary,
    Mixed,
    ObjectId,
    Array(Option<Box<FieldType>>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Number => f.write_str("number"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Date => f.write_str("date"),
            FieldType::Binary => f.write_str("binary"),
            FieldType::Mixed => f.write_str("mixed"),
            FieldType::ObjectId => f.write_str("object_id"),
            FieldType::Array(None) => f.write_str("array"),
            FieldType::Array(Some(item)) => write!(f, "array<{item}>"),
        }
    }
}

impl FieldType {
    /// Coerce `value` into this type. On failure the original value is handed
    /// back so it can be reported. Absent values are never cast.
    pub fn cast(&self, value: Value) -> Result<Value, Value> {
        if value.is_nullish() {
            return Ok(value);
        }

        match self {
            FieldType::Mixed => Ok(value),
            FieldType::String => match value {
                Value::Text(_) => Ok(value),
                Value::Numeric(n) => Ok(Value::Text(format_number(n))),
                Value::Boolean(b) => Ok(Value::Text(b.to_string())),
                Value::Temporal(d) => Ok(Value::Text(d.to_rfc3339())),
                Value::Identifier(id) => Ok(Value::Text(id.to_string())),
                other => Err(other),
            },
            FieldType::Number => match value {
                Value::Numeric(_) => Ok(value),
                Value::Boolean(b) => Ok(Value::Numeric(if b { 1.0 } else { 0.0 })),
                Value::Temporal(d) => Ok(Value::Numeric(d.timestamp_millis() as f64)),
                Value::Text(ref s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return Ok(Value::Null);
                    }
                    match trimmed.parse::<f64>() {
                        Ok(n) if n.is_finite() => Ok(Value::Numeric(n)),
                        _ => Err(value),
                    }
                }
                other => Err(other),
            },
            FieldType::Boolean => match value {
                Value::Boolean(_) => Ok(value),
                Value::Numeric(n) if n == 1.0 => Ok(Value::Boolean(true)),
                Value::Numeric(n) if n == 0.0 => Ok(Value::Boolean(false)),
                Value::Text(ref s) => match s.as_str() {
                    "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                    "false" | "0" | "no" => Ok(Value::Boolean(false)),
                    _ => Err(value),
                },
                other => Err(other),
            },
            FieldType::Date => match value {
                Value::Temporal(_) => Ok(value),
                Value::Numeric(ms) => temporal_from_millis(ms)
                    .map(Value::Temporal)
                    .ok_or(value),
                Value::Text(ref s) => parse_date(s).map(Value::Temporal).ok_or(value),
                other => Err(other),
            },
            FieldType::Binary => match value {
                Value::Binary(_) => Ok(value),
                Value::Text(s) => Ok(Value::Binary(s.into_bytes())),
                Value::Sequence(ref items) => {
                    let bytes: Option<Vec<u8>> = items
                        .iter()
                        .map(|item| match item {
                            Value::Numeric(n) if (0.0..=255.0).contains(n) && n.fract() == 0.0 => {
                                Some(*n as u8)
                            }
                            _ => None,
                        })
                        .collect();
                    bytes.map(Value::Binary).ok_or(value)
                }
                other => Err(other),
            },
            FieldType::ObjectId => match value {
                Value::Identifier(_) => Ok(value),
                Value::Text(ref s) => Ulid::from_string(s)
                    .map(Value::Identifier)
                    .map_err(|_| value.clone()),
                other => Err(other),
            },
            FieldType::Array(item) => {
                let items = match value {
                    Value::Sequence(items) => items,
                    scalar => vec![scalar],
                };
                let Some(item_type) = item else {
                    return Ok(Value::Sequence(items));
                };

                let mut cast = Vec::with_capacity(items.len());
                for element in &items {
                    match item_type.cast(element.clone()) {
                        Ok(v) => cast.push(v),
                        Err(_) => return Err(Value::Sequence(items)),
                    }
                }
                Ok(Value::Sequence(cast))
            }
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// A field default: a fixed value or a generator evaluated per document.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Value(Value),
    Generator(Generator),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Generator(f) => (f.0)(),
        }
    }
}

/// Allowed values and the message template used when a value is not one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Enumeration {
    pub values: Vec<Value>,
    pub message: String,
}

/// Per-field index hints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexHints {
    pub index: bool,
    pub unique: bool,
    pub sparse: bool,
    pub hints: BTreeMap<String, Value>,
}

/// One attached check.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    pub rule: &'static str,
    pub message: String,
    pub predicate: Predicate,
}

impl Validator {
    pub fn check(&self, value: &Value) -> bool {
        (self.predicate.0)(value)
    }
}

/// The frozen configuration of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: Option<String>,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub enumeration: Option<Enumeration>,
    pub index: Option<IndexHints>,
    pub getter: Option<Transform>,
    pub setter: Option<Transform>,
    pub validators: Vec<Validator>,
}

impl FieldDescriptor {
    pub fn is_unique(&self) -> bool {
        self.index.as_ref().is_some_and(|idx| idx.unique)
    }

    /// Validators rejecting `value`, in attachment order.
    pub fn failing_validators<'a>(
        &'a self,
        value: &'a Value,
    ) -> impl Iterator<Item = &'a Validator> + 'a {
        self.validators.iter().filter(move |v| !v.check(value))
    }

    pub(crate) fn apply_getter(&self, value: Value) -> Value {
        match &self.getter {
            Some(f) => (f.0)(value),
            None => value,
        }
    }

    pub(crate) fn apply_setter(&self, value: Value) -> Value {
        match &self.setter {
            Some(f) => (f.0)(value),
            None => value,
        }
    }
}

/// Substitute `{VALUE}` and `{PATH}` in a message template.
pub fn render_message(template: &str, path: &str, value: &Value) -> String {
    template
        .replace("{VALUE}", &value.to_string())
        .replace("{PATH}", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cast_string() {
        assert_eq!(FieldType::String.cast(Value::from(4)), Ok(Value::from("4")));
        assert_eq!(FieldType::String.cast(Value::from("a")), Ok(Value::from("a")));
        assert!(FieldType::String.cast(Value::Sequence(vec![])).is_err());
    }

    #[test]
    fn test_cast_number() {
        assert_eq!(FieldType::Number.cast(Value::from(" 42 ")), Ok(Value::from(42)));
        assert_eq!(FieldType::Number.cast(Value::from("")), Ok(Value::Null));
        assert_eq!(
            FieldType::Number.cast(Value::from("abc")),
            Err(Value::from("abc"))
        );
    }

    #[test]
    fn test_cast_date() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            FieldType::Date.cast(Value::from("2026-01-01")),
            Ok(Value::Temporal(expected))
        );
        assert_eq!(
            FieldType::Date.cast(Value::from("2026-01-01T00:00:00Z")),
            Ok(Value::Temporal(expected))
        );
        assert!(FieldType::Date.cast(Value::from("yesterday")).is_err());
    }

    #[test]
    fn test_cast_array_wraps_and_casts_items() {
        let ty = FieldType::Array(Some(Box::new(FieldType::Number)));
        assert_eq!(
            ty.cast(Value::from("5")),
            Ok(Value::Sequence(vec![Value::from(5)]))
        );
        // Holes survive casting
        assert_eq!(
            ty.cast(Value::Sequence(vec![Value::from(1), Value::Undefined])),
            Ok(Value::Sequence(vec![Value::from(1), Value::Undefined]))
        );
        assert!(ty.cast(Value::Sequence(vec![Value::from("x")])).is_err());
    }

    #[test]
    fn test_cast_nullish_passthrough() {
        assert_eq!(FieldType::Boolean.cast(Value::Null), Ok(Value::Null));
        assert_eq!(FieldType::ObjectId.cast(Value::Undefined), Ok(Value::Undefined));
    }

    #[test]
    fn test_render_message() {
        assert_eq!(
            render_message("{PATH} does not support `{VALUE}`", "role", &Value::from("x")),
            "role does not support `x`"
        );
    }

    #[test]
    fn test_func_identity() {
        let f: Transform = Func::new(Arc::new(|v| v));
        let g = f.clone();
        let h: Transform = Func::new(Arc::new(|v| v));
        assert_eq!(f, g);
        assert_ne!(f, h);
    }
}
