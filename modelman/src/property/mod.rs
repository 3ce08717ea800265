//! Fluent per-field builder.
//!
//! Every configuration call mutates the builder and returns it, so a field is
//! described in one chain ending in [`PropertyBuilder::finalize`]:
//!
//! ```
//! use modelman::{Config, PropertyBuilder};
//!
//! let config = Config::default();
//! let email = PropertyBuilder::named("Email", &config)
//!     .string()
//!     .required(true)
//!     .unique(true)
//!     .valid_email(None)
//!     .finalize()
//!     .unwrap();
//! assert!(email.required);
//! ```

pub mod descriptor;

pub use descriptor::{
    render_message, DefaultValue, Enumeration, FieldDescriptor, FieldType, Func, Generator,
    IndexHints, Predicate, Transform, Validator,
};

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::utils::{is_array, is_number, is_string, regex_set};
use crate::value::{Bound, Value};
use regex::Regex;
use std::sync::Arc;

/// Accumulates the configuration of one field.
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    name: Option<String>,
    strict: bool,
    reject_conflicting_types: bool,
    field_type: Option<FieldType>,
    type_conflict: Option<(FieldType, FieldType)>,
    required: bool,
    default: Option<DefaultValue>,
    enumeration: Option<Enumeration>,
    index: Option<IndexHints>,
    getter: Option<Transform>,
    setter: Option<Transform>,
    validators: Vec<Validator>,
}

impl PropertyBuilder {
    /// An unlabeled builder; default messages are generic.
    pub fn new(config: &Config) -> Self {
        PropertyBuilder {
            name: None,
            strict: config.strict,
            reject_conflicting_types: config.reject_conflicting_types,
            field_type: None,
            type_conflict: None,
            required: false,
            default: None,
            enumeration: None,
            index: None,
            getter: None,
            setter: None,
            validators: Vec::new(),
        }
    }

    /// A builder whose default messages mention `name`.
    pub fn named(name: impl Into<String>, config: &Config) -> Self {
        let mut builder = Self::new(config);
        builder.name = Some(name.into());
        builder
    }

    pub fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    // ── Types ───────────────────────────────────────────────────────

    pub fn string(&mut self) -> &mut Self {
        self.set_type(FieldType::String)
    }

    pub fn number(&mut self) -> &mut Self {
        self.set_type(FieldType::Number)
    }

    pub fn boolean(&mut self) -> &mut Self {
        self.set_type(FieldType::Boolean)
    }

    pub fn date(&mut self) -> &mut Self {
        self.set_type(FieldType::Date)
    }

    pub fn binary(&mut self) -> &mut Self {
        self.set_type(FieldType::Binary)
    }

    /// Untyped field: any value is accepted as is.
    pub fn generic_value(&mut self) -> &mut Self {
        self.set_type(FieldType::Mixed)
    }

    pub fn identifier_reference(&mut self) -> &mut Self {
        self.set_type(FieldType::ObjectId)
    }

    pub fn array(&mut self) -> &mut Self {
        self.array_of(None)
    }

    pub fn array_of(&mut self, element: impl Into<Option<FieldType>>) -> &mut Self {
        let element = element.into().map(Box::new);
        self.set_type(FieldType::Array(element))
    }

    pub fn field_type(&mut self, field_type: FieldType) -> &mut Self {
        self.set_type(field_type)
    }

    fn set_type(&mut self, field_type: FieldType) -> &mut Self {
        if let Some(previous) = &self.field_type {
            if *previous != field_type && self.type_conflict.is_none() {
                self.type_conflict = Some((previous.clone(), field_type.clone()));
            }
        }
        self.field_type = Some(field_type);
        self
    }

    // ── Constraints ─────────────────────────────────────────────────

    pub fn required(&mut self, required: bool) -> &mut Self {
        self.required = required;
        self
    }

    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Default produced per document, e.g. `Utc::now`.
    pub fn default_with<F, V>(&mut self, generator: F) -> &mut Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.default = Some(DefaultValue::Generator(Func::new(Arc::new(move || {
            generator().into()
        }))));
        self
    }

    /// Restrict the field to `values`. The message may use `{VALUE}` and `{PATH}`.
    pub fn enumeration<'m, I, V>(
        &mut self,
        values: I,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let message = match (message.into(), &self.name) {
            (Some(custom), _) => custom.to_string(),
            (None, Some(name)) => format!("{name} does not support `{{VALUE}}`"),
            (None, None) => "`{VALUE}` is not supported".to_string(),
        };
        self.enumeration = Some(Enumeration {
            values: values.into_iter().map(Into::into).collect(),
            message,
        });
        self
    }

    pub fn unique(&mut self, unique: bool) -> &mut Self {
        self.index_hints().unique = unique;
        self
    }

    pub fn index(&mut self, index: bool) -> &mut Self {
        self.index_hints().index = index;
        self
    }

    pub fn sparse_index(&mut self, sparse: bool) -> &mut Self {
        self.index_hints().sparse = sparse;
        self
    }

    pub fn index_hint(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.index_hints().hints.insert(key.into(), value.into());
        self
    }

    fn index_hints(&mut self) -> &mut IndexHints {
        self.index.get_or_insert_with(IndexHints::default)
    }

    /// Transform applied when the field is read from a document.
    pub fn getter<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Func::new(Arc::new(f)));
        self
    }

    /// Transform applied when the field is assigned on a document.
    pub fn setter<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.setter = Some(Func::new(Arc::new(f)));
        self
    }

    // ── Validators ──────────────────────────────────────────────────

    /// Attach an arbitrary check.
    pub fn custom_validator<F>(&mut self, predicate: F, message: impl Into<String>) -> &mut Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validate_with("custom", message.into(), predicate)
    }

    /// Length, count, or magnitude must be at least `bound`.
    pub fn minimum<'m>(
        &mut self,
        bound: impl Into<Bound>,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let bound = bound.into();
        let message = self.message(message.into(), &format!("must be at least {bound}"), None);
        let strict = self.strict;
        self.validate_with("minimum", message, move |value| {
            measure(value).map_or(!strict, |m| m >= bound.as_f64())
        })
    }

    /// Length, count, or magnitude must be no more than `bound`.
    pub fn maximum<'m>(
        &mut self,
        bound: impl Into<Bound>,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let bound = bound.into();
        let message = self.message(message.into(), &format!("must be no more than {bound}"), None);
        let strict = self.strict;
        self.validate_with("maximum", message, move |value| {
            measure(value).map_or(!strict, |m| m <= bound.as_f64())
        })
    }

    pub fn exact_length<'m>(
        &mut self,
        length: impl Into<Bound>,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let length = length.into();
        let message = self.message(message.into(), &format!("must be exactly {length}"), None);
        let strict = self.strict;
        self.validate_with("exact_length", message, move |value| {
            measure(value).map_or(!strict, |m| m == length.as_f64())
        })
    }

    /// With `allow_sparse` the check always passes; otherwise arrays with holes fail.
    pub fn array_not_sparse<'m>(
        &mut self,
        allow_sparse: bool,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let message = self.message(
            message.into(),
            "cannot have undefined values",
            Some("undefined values not allowed"),
        );
        let strict = self.strict;
        self.validate_with("array_not_sparse", message, move |value| {
            if allow_sparse {
                return true;
            }
            if !is_array(value) {
                return !strict;
            }
            value
                .as_sequence()
                .is_some_and(|items| !items.iter().any(Value::is_undefined))
        })
    }

    pub fn alphanumeric_only<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(
            message.into(),
            "should contain alpha-numeric characters only",
            Some("alpha-numeric characters only"),
        );
        self.text_rule("alphanumeric_only", message, |s| {
            regex_set().alphanumeric.is_match(s)
        })
    }

    pub fn matches_pattern<'m>(
        &mut self,
        pattern: Regex,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let message = self.message(message.into(), "is invalid", Some("invalid value"));
        self.text_rule("matches_pattern", message, move |s| pattern.is_match(s))
    }

    pub fn valid_email<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "is not a valid email", Some("invalid email"));
        self.text_rule("valid_email", message, |s| regex_set().email.is_match(s))
    }

    pub fn valid_token<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "is not a valid token", Some("invalid token"));
        self.text_rule("valid_token", message, |s| regex_set().token.is_match(s))
    }

    pub fn valid_guid<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "is not a valid GUID", Some("invalid GUID"));
        self.text_rule("valid_guid", message, |s| regex_set().guid.is_match(s))
    }

    pub fn valid_hostname<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(
            message.into(),
            "is not a valid host name",
            Some("invalid host name"),
        );
        self.text_rule("valid_hostname", message, |s| {
            regex_set().hostname.is_match(s)
        })
    }

    pub fn valid_url<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "is not a valid URL", Some("invalid URL"));
        self.text_rule("valid_url", message, |s| regex_set().url.is_match(s))
    }

    pub fn is_uppercase<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "must be upper case", None);
        self.text_rule("is_uppercase", message, |s| s == s.to_uppercase())
    }

    pub fn is_lowercase<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "must be lower case", None);
        self.text_rule("is_lowercase", message, |s| s == s.to_lowercase())
    }

    pub fn numeric_greater_than<'m>(
        &mut self,
        bound: impl Into<Bound>,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let bound = bound.into();
        let message = self.message(message.into(), &format!("must be greater than {bound}"), None);
        self.numeric_rule("numeric_greater_than", message, move |n| n > bound.as_f64())
    }

    pub fn numeric_less_than<'m>(
        &mut self,
        bound: impl Into<Bound>,
        message: impl Into<Option<&'m str>>,
    ) -> &mut Self {
        let bound = bound.into();
        let message = self.message(message.into(), &format!("must be less than {bound}"), None);
        self.numeric_rule("numeric_less_than", message, move |n| n < bound.as_f64())
    }

    pub fn must_be_integer<'m>(&mut self, message: impl Into<Option<&'m str>>) -> &mut Self {
        let message = self.message(message.into(), "must be an integer", None);
        self.numeric_rule("must_be_integer", message, |n| {
            n.is_finite() && n.fract() == 0.0
        })
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Every validator, named or custom, is attached here.
    fn validate_with<F>(&mut self, rule: &'static str, message: String, predicate: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Validator {
            rule,
            message,
            predicate: Func::new(Arc::new(predicate)),
        });
        self
    }

    fn text_rule<F>(&mut self, rule: &'static str, message: String, check: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let strict = self.strict;
        self.validate_with(rule, message, move |value| {
            if !is_string(value) {
                return !strict;
            }
            value.as_str().is_some_and(&check)
        })
    }

    fn numeric_rule<F>(&mut self, rule: &'static str, message: String, check: F) -> &mut Self
    where
        F: Fn(f64) -> bool + Send + Sync + 'static,
    {
        let strict = self.strict;
        self.validate_with(rule, message, move |value| {
            if !is_number(value) {
                return !strict;
            }
            value.as_f64().is_some_and(&check)
        })
    }

    /// Pick the caller's message, else `"<name> <labeled>"`, else the bare form
    /// (which defaults to `labeled` itself).
    fn message(&self, custom: Option<&str>, labeled: &str, bare: Option<&str>) -> String {
        match (custom, &self.name) {
            (Some(custom), _) => custom.to_string(),
            (None, Some(name)) => format!("{name} {labeled}"),
            (None, None) => bare.unwrap_or(labeled).to_string(),
        }
    }

    // ── Compile ─────────────────────────────────────────────────────

    /// Freeze the accumulated configuration. Fails when no type was selected,
    /// or when two different types were selected and the configuration rejects
    /// conflicts.
    pub fn finalize(&self) -> Result<FieldDescriptor> {
        let field = self.name.as_deref().unwrap_or("(unnamed)");
        self.finalize_as(field)
    }

    pub(crate) fn finalize_as(&self, field: &str) -> Result<FieldDescriptor> {
        let Some(field_type) = self.field_type.clone() else {
            return Err(ModelError::schema(field, "no type set"));
        };

        if self.reject_conflicting_types {
            if let Some((first, second)) = &self.type_conflict {
                return Err(ModelError::schema(
                    field,
                    format!("conflicting types `{first}` and `{second}`"),
                ));
            }
        }

        Ok(FieldDescriptor {
            name: self.name.clone(),
            field_type,
            required: self.required,
            default: self.default.clone(),
            enumeration: self.enumeration.clone(),
            index: self.index.clone(),
            getter: self.getter.clone(),
            setter: self.setter.clone(),
            validators: self.validators.clone(),
        })
    }
}

/// The quantity ordering rules compare: characters, elements, bytes, keys,
/// the number itself, or milliseconds since the epoch. `None` for shapes
/// without one.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => Some(s.chars().count() as f64),
        Value::Sequence(items) => Some(items.len() as f64),
        Value::Binary(bytes) => Some(bytes.len() as f64),
        Value::Numeric(n) => Some(*n),
        Value::Temporal(d) => Some(d.timestamp_millis() as f64),
        Value::Structured(map) => Some(map.len() as f64),
        Value::Undefined
        | Value::Null
        | Value::Boolean(_)
        | Value::Identifier(_) => None,
    }
}
