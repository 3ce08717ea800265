use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Schema error for property {field}: {reason}")]
    SchemaDefinition { field: String, reason: String },

    #[error("{0}")]
    Validation(ValidationError),

    #[error("Schema hasn't been registered for model \"{0}\"")]
    NotRegistered(String),

    #[error("Duplicate key in {collection}: unique index on [{index}] already holds this value")]
    DuplicateKey { collection: String, index: String },

    #[error("Middleware error: {0}")]
    Hook(String),

    #[error("Model {model} has no method `{method}`")]
    UnknownMethod { model: String, method: String },

    #[error("Model {model} has no static `{name}`")]
    UnknownStatic { model: String, name: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid connection URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl ModelError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::SchemaDefinition {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The aggregated validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ModelError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ModelError {
    fn from(err: ValidationError) -> Self {
        ModelError::Validation(err)
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// What kind of check rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Required,
    Enum,
    Cast,
    Custom,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Required => "required",
            ValidationKind::Enum => "enum",
            ValidationKind::Cast => "cast",
            ValidationKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check on one path.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorError {
    pub kind: ValidationKind,
    pub path: String,
    pub message: String,
    pub value: Value,
}

/// Every field-level failure of one document, keyed by path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationError {
    pub model: String,
    pub errors: BTreeMap<String, Vec<ValidatorError>>,
}

impl ValidationError {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, err: ValidatorError) {
        self.errors.entry(err.path.clone()).or_default().push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First reported failure for `path`.
    pub fn error(&self, path: &str) -> Option<&ValidatorError> {
        self.errors.get(path).and_then(|errs| errs.first())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed", self.model)?;
        let mut sep = ": ";
        for errs in self.errors.values() {
            for err in errs {
                write!(f, "{sep}{}: {}", err.path, err.message)?;
                sep = ", ";
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
