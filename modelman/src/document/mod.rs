// Model instances: field values plus the bookkeeping persistence needs

use crate::error::{ModelError, Result};
use crate::registry::Model;
use crate::schema::CompiledSchema;
use crate::validation::apply_defaults;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use ulid::Ulid;

/// One instance of a registered model.
#[derive(Debug, Clone)]
pub struct Document {
    model: Model,
    id: Ulid,
    fields: BTreeMap<String, Value>,
    modified: BTreeSet<String>,
    is_new: bool,
}

impl Document {
    /// A new, unsaved document seeded with `initial`. Every seeded path
    /// counts as modified; defaults then fill the gaps without marking them.
    pub(crate) fn new(model: Model, initial: Value) -> Self {
        let mut doc = Document {
            model,
            id: Ulid::new(),
            fields: BTreeMap::new(),
            modified: BTreeSet::new(),
            is_new: true,
        };

        match initial {
            Value::Structured(values) => {
                for (path, value) in values {
                    doc.set(&path, value);
                }
            }
            Value::Undefined | Value::Null => {}
            other => log::warn!(
                "Ignoring {} initial value for {}: expected a structured value",
                other.type_name(),
                doc.model.name()
            ),
        }
        apply_defaults(doc.model.schema(), &mut doc.fields);
        doc
    }

    /// A document loaded from the store: not new, nothing modified.
    pub(crate) fn hydrate(model: Model, id: Ulid, fields: BTreeMap<String, Value>) -> Self {
        Document {
            model,
            id,
            fields,
            modified: BTreeSet::new(),
            is_new: false,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn schema(&self) -> &CompiledSchema {
        self.model.schema()
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self, path: &str) -> bool {
        self.modified.contains(path)
    }

    /// Read a path: declared fields go through their getter, virtuals are
    /// computed, `_id` is the document id.
    pub fn get(&self, path: &str) -> Option<Value> {
        if path == "_id" {
            return Some(Value::Identifier(self.id));
        }
        let schema = self.model.schema();
        if let Some(descriptor) = schema.field(path) {
            return self
                .fields
                .get(path)
                .map(|value| descriptor.apply_getter(value.clone()));
        }
        if let Some(get) = schema.virtual_field(path).and_then(|v| v.get.as_ref()) {
            return Some((get.0)(self));
        }
        self.fields.get(path).cloned()
    }

    /// The stored value of a path, without getters.
    pub fn raw(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Write a path. Virtual setters take precedence; declared fields go
    /// through their setter. Undeclared paths are discarded when the schema
    /// is strict.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if path == "_id" {
            log::debug!("Ignoring write to `_id` on {}", self.model.name());
            return self;
        }

        let schema = self.model.schema();
        if let Some(set) = schema.virtual_field(path).and_then(|v| v.set.clone()) {
            (set.0)(self, value);
            return self;
        }

        let value = match schema.field(path) {
            Some(descriptor) => descriptor.apply_setter(value),
            None if schema.is_strict() => {
                log::debug!(
                    "Discarding undeclared path `{path}` on strict model {}",
                    schema.name()
                );
                return self;
            }
            None => value,
        };

        self.fields.insert(path.to_string(), value);
        self.modified.insert(path.to_string());
        self
    }

    pub fn unset(&mut self, path: &str) -> &mut Self {
        if self.fields.remove(path).is_some() {
            self.modified.insert(path.to_string());
        }
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.fields
    }

    /// The persisted shape: stored fields plus `_id`.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("_id".to_string(), Value::Identifier(self.id));
        Value::Structured(map)
    }

    /// Invoke an instance method declared in the schema options.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let Some(f) = self.model.schema().method(method).cloned() else {
            return Err(ModelError::UnknownMethod {
                model: self.model.name().to_string(),
                method: method.to_string(),
            });
        };
        (f.0)(self, args)
    }

    /// Persist through the owning model.
    pub async fn save(&mut self) -> Result<Value> {
        let model = self.model.clone();
        model.persist(self).await
    }

    pub(crate) fn mark_saved(&mut self) {
        self.modified.clear();
        self.is_new = false;
    }
}
