// Declarative model definitions loaded from YAML files

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::property::{FieldType, PropertyBuilder};
use crate::schema::options::{IndexOrder, IndexSpec, SchemaOptions};
use crate::value::{Bound, Value};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One model, as written in a `*.yaml` definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

/// Definition of a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type", default)]
    pub field_type: Option<TypeName>,
    #[serde(default)]
    pub items: Option<TypeName>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<serde_yaml::Value>>,
    #[serde(default)]
    pub enum_message: Option<String>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub validate: Vec<RuleDefinition>,
}

/// Field type names accepted in definition files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    String,
    Number,
    Boolean,
    Date,
    Binary,
    Mixed,
    ObjectId,
    Array,
}

impl TypeName {
    fn scalar(self) -> Option<FieldType> {
        match self {
            TypeName::String => Some(FieldType::String),
            TypeName::Number => Some(FieldType::Number),
            TypeName::Boolean => Some(FieldType::Boolean),
            TypeName::Date => Some(FieldType::Date),
            TypeName::Binary => Some(FieldType::Binary),
            TypeName::Mixed => Some(FieldType::Mixed),
            TypeName::ObjectId => Some(FieldType::ObjectId),
            TypeName::Array => None,
        }
    }
}

/// A validator entry, tagged by `rule`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleDefinition {
    Min {
        value: BoundDefinition,
        #[serde(default)]
        message: Option<String>,
    },
    Max {
        value: BoundDefinition,
        #[serde(default)]
        message: Option<String>,
    },
    Length {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Sparse {
        #[serde(default)]
        allow: bool,
        #[serde(default)]
        message: Option<String>,
    },
    Alphanumeric {
        #[serde(default)]
        message: Option<String>,
    },
    Matches {
        pattern: String,
        #[serde(default)]
        message: Option<String>,
    },
    Email {
        #[serde(default)]
        message: Option<String>,
    },
    Token {
        #[serde(default)]
        message: Option<String>,
    },
    Guid {
        #[serde(default)]
        message: Option<String>,
    },
    Hostname {
        #[serde(default)]
        message: Option<String>,
    },
    Url {
        #[serde(default)]
        message: Option<String>,
    },
    Uppercase {
        #[serde(default)]
        message: Option<String>,
    },
    Lowercase {
        #[serde(default)]
        message: Option<String>,
    },
    Greater {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Less {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    Integer {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundDefinition {
    Number(f64),
    Date(DateTime<Utc>),
}

impl From<BoundDefinition> for Bound {
    fn from(def: BoundDefinition) -> Self {
        match def {
            BoundDefinition::Number(n) => Bound::Numeric(n),
            BoundDefinition::Date(d) => Bound::Temporal(d),
        }
    }
}

/// Compound index entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub descending: Vec<String>,
}

impl ModelDefinition {
    /// Parse a model definition YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let model: ModelDefinition = serde_yaml::from_str(content)?;
        Ok(model)
    }

    /// Parse a model definition file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Replay every field through a property builder.
    pub fn builders(&self, config: &Config) -> Result<Vec<(String, PropertyBuilder)>> {
        self.fields
            .iter()
            .map(|(name, def)| Ok((name.clone(), def.builder(name, config)?)))
            .collect()
    }

    pub fn options(&self) -> SchemaOptions {
        let mut options = SchemaOptions::new();
        options.strict = self.strict;
        options.collection = self.collection.clone();
        for index in &self.indexes {
            let mut spec = IndexSpec::on(index.fields.iter().cloned())
                .unique(index.unique)
                .sparse(index.sparse);
            for (path, order) in spec.fields.iter_mut() {
                if index.descending.contains(path) {
                    *order = IndexOrder::Descending;
                }
            }
            options = options.index(spec);
        }
        options
    }
}

impl FieldDefinition {
    fn builder(&self, name: &str, config: &Config) -> Result<PropertyBuilder> {
        let mut builder = match &self.label {
            Some(label) => PropertyBuilder::named(label.clone(), config),
            None => PropertyBuilder::new(config),
        };

        match self.field_type {
            Some(TypeName::Array) => {
                builder.array_of(self.items.and_then(TypeName::scalar));
            }
            Some(scalar) => {
                if let Some(field_type) = scalar.scalar() {
                    builder.field_type(field_type);
                }
            }
            // Left untyped: compilation reports the missing type
            None => {}
        }

        builder.required(self.required);
        if self.unique {
            builder.unique(true);
        }
        if self.index {
            builder.index(true);
        }
        if self.sparse {
            builder.sparse_index(true);
        }

        if let Some(default) = &self.default {
            builder.default_value(yaml_to_value(default)?);
        }
        if let Some(values) = &self.enum_values {
            let values = values.iter().map(yaml_to_value).collect::<Result<Vec<_>>>()?;
            builder.enumeration(values, self.enum_message.as_deref());
        }

        for rule in &self.validate {
            apply_rule(&mut builder, name, rule)?;
        }

        Ok(builder)
    }
}

fn apply_rule(builder: &mut PropertyBuilder, field: &str, rule: &RuleDefinition) -> Result<()> {
    match rule {
        RuleDefinition::Min { value, message } => {
            builder.minimum(*value, message.as_deref());
        }
        RuleDefinition::Max { value, message } => {
            builder.maximum(*value, message.as_deref());
        }
        RuleDefinition::Length { value, message } => {
            builder.exact_length(*value, message.as_deref());
        }
        RuleDefinition::Sparse { allow, message } => {
            builder.array_not_sparse(*allow, message.as_deref());
        }
        RuleDefinition::Alphanumeric { message } => {
            builder.alphanumeric_only(message.as_deref());
        }
        RuleDefinition::Matches { pattern, message } => {
            let regex = Regex::new(pattern).map_err(|e| {
                ModelError::schema(field, format!("invalid pattern `{pattern}`: {e}"))
            })?;
            builder.matches_pattern(regex, message.as_deref());
        }
        RuleDefinition::Email { message } => {
            builder.valid_email(message.as_deref());
        }
        RuleDefinition::Token { message } => {
            builder.valid_token(message.as_deref());
        }
        RuleDefinition::Guid { message } => {
            builder.valid_guid(message.as_deref());
        }
        RuleDefinition::Hostname { message } => {
            builder.valid_hostname(message.as_deref());
        }
        RuleDefinition::Url { message } => {
            builder.valid_url(message.as_deref());
        }
        RuleDefinition::Uppercase { message } => {
            builder.is_uppercase(message.as_deref());
        }
        RuleDefinition::Lowercase { message } => {
            builder.is_lowercase(message.as_deref());
        }
        RuleDefinition::Greater { value, message } => {
            builder.numeric_greater_than(*value, message.as_deref());
        }
        RuleDefinition::Less { value, message } => {
            builder.numeric_less_than(*value, message.as_deref());
        }
        RuleDefinition::Integer { message } => {
            builder.must_be_integer(message.as_deref());
        }
    }
    Ok(())
}

fn yaml_to_value(value: &serde_yaml::Value) -> Result<Value> {
    let json: serde_json::Value = serde_yaml::from_value(value.clone())?;
    Ok(Value::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CompiledSchema;

    const ACCOUNT: &str = r#"
name: account
fields:
  email:
    type: string
    label: Email
    required: true
    unique: true
    validate:
      - rule: email
  nickname:
    type: string
    label: Nickname
    validate:
      - { rule: alphanumeric }
      - { rule: min, value: 3 }
      - { rule: max, value: 50, message: "too long" }
  tags:
    type: array
    items: string
    validate:
      - { rule: sparse, allow: false }
  role:
    type: string
    enum: [admin, member]
    default: member
  registered:
    type: date
indexes:
  - fields: [email, nickname]
    unique: true
    descending: [nickname]
"#;

    #[test]
    fn test_parse_definition() {
        let def = ModelDefinition::from_yaml_str(ACCOUNT).unwrap();
        assert_eq!(def.name.as_deref(), Some("account"));
        assert_eq!(def.fields.len(), 5);
        assert_eq!(def.fields["nickname"].validate.len(), 3);
        assert_eq!(def.indexes.len(), 1);
    }

    #[test]
    fn test_definition_compiles() {
        let config = Config::default();
        let def = ModelDefinition::from_yaml_str(ACCOUNT).unwrap();
        let schema =
            CompiledSchema::compile("account", def.builders(&config).unwrap(), def.options())
                .unwrap();

        let nickname = schema.field("nickname").unwrap();
        let messages: Vec<&str> = nickname.validators.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Nickname should contain alpha-numeric characters only",
                "Nickname must be at least 3",
                "too long",
            ]
        );

        assert_eq!(
            schema.field("tags").unwrap().field_type,
            FieldType::Array(Some(Box::new(FieldType::String)))
        );
        // unique field index plus the compound one
        assert_eq!(schema.indexes().len(), 2);
        assert_eq!(
            schema.indexes()[1].fields[1],
            ("nickname".to_string(), IndexOrder::Descending)
        );
    }

    #[test]
    fn test_missing_type_is_reported() {
        let config = Config::default();
        let def = ModelDefinition::from_yaml_str("fields:\n  secret: { required: true }\n").unwrap();
        let err = CompiledSchema::compile("x", def.builders(&config).unwrap(), def.options())
            .unwrap_err();
        match err {
            ModelError::SchemaDefinition { field, .. } => assert_eq!(field, "secret"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let config = Config::default();
        let def = ModelDefinition::from_yaml_str(
            "fields:\n  code: { type: string, validate: [ { rule: matches, pattern: '(' } ] }\n",
        )
        .unwrap();
        assert!(def.builders(&config).is_err());
    }

    #[test]
    fn test_unknown_rule_fails_to_parse() {
        let result = ModelDefinition::from_yaml_str(
            "fields:\n  code: { type: string, validate: [ { rule: telepathy } ] }\n",
        );
        assert!(result.is_err());
    }
}
