pub mod definition;
pub mod options;

pub use definition::{FieldDefinition, IndexDefinition, ModelDefinition, RuleDefinition, TypeName};
pub use options::{
    IndexOrder, IndexSpec, Method, Middleware, PostHook, PreHook, SchemaOptions, Static, Trigger,
    Virtual, VirtualGetter, VirtualSetter,
};

use crate::error::{ModelError, Result};
use crate::property::{DefaultValue, FieldDescriptor, PropertyBuilder};
use std::collections::BTreeMap;

/// Anything the compiler can turn into a finalized field: a descriptor, or a
/// builder that is finalized on the spot.
pub trait IntoFieldDescriptor {
    fn into_field_descriptor(self, field: &str) -> Result<FieldDescriptor>;
}

impl IntoFieldDescriptor for FieldDescriptor {
    fn into_field_descriptor(self, _field: &str) -> Result<FieldDescriptor> {
        Ok(self)
    }
}

impl IntoFieldDescriptor for PropertyBuilder {
    fn into_field_descriptor(self, field: &str) -> Result<FieldDescriptor> {
        self.finalize_as(field)
    }
}

impl IntoFieldDescriptor for &PropertyBuilder {
    fn into_field_descriptor(self, field: &str) -> Result<FieldDescriptor> {
        self.finalize_as(field)
    }
}

impl IntoFieldDescriptor for &mut PropertyBuilder {
    fn into_field_descriptor(self, field: &str) -> Result<FieldDescriptor> {
        self.finalize_as(field)
    }
}

/// Field descriptors and options merged into one named schema.
#[derive(Debug)]
pub struct CompiledSchema {
    name: String,
    collection: String,
    fields: BTreeMap<String, FieldDescriptor>,
    indexes: Vec<IndexSpec>,
    virtuals: BTreeMap<String, Virtual>,
    middleware: BTreeMap<Trigger, Middleware>,
    methods: BTreeMap<String, Method>,
    statics: BTreeMap<String, Static>,
    strict: bool,
}

impl CompiledSchema {
    /// Compile `fields` and `options` under `name`. Either the whole schema
    /// compiles or an error naming the offending field is returned.
    pub fn compile<I, K, F>(name: &str, fields: I, options: SchemaOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoFieldDescriptor,
    {
        if name.trim().is_empty() {
            return Err(ModelError::schema("(model)", "model name must not be empty"));
        }

        let mut compiled = BTreeMap::new();
        for (key, field) in fields {
            let key: String = key.into();
            if key.is_empty() {
                return Err(ModelError::schema("(empty)", "field name must not be empty"));
            }
            if key == "_id" {
                return Err(ModelError::schema(key, "`_id` is reserved"));
            }
            let descriptor = field.into_field_descriptor(&key)?;
            check_descriptor(&key, &descriptor)?;
            compiled.insert(key, descriptor);
        }

        let mut indexes = Vec::new();
        for (key, descriptor) in &compiled {
            if let Some(hints) = descriptor.index.as_ref().filter(|h| h.unique) {
                indexes.push(IndexSpec::on([key.as_str()]).unique(true).sparse(hints.sparse));
            }
        }
        for spec in &options.index {
            if spec.fields.is_empty() {
                return Err(ModelError::schema("(index)", "index must name at least one path"));
            }
            for path in spec.paths() {
                if path != "_id" && !compiled.contains_key(path) {
                    return Err(ModelError::schema(
                        path,
                        format!("index [{}] names an undeclared path", spec.label()),
                    ));
                }
            }
            indexes.push(spec.clone());
        }

        let virtuals = options.bound_virtuals();
        if let Some(shadowed) = virtuals.keys().find(|v| compiled.contains_key(*v)) {
            return Err(ModelError::schema(
                shadowed.as_str(),
                "virtual shadows a declared field",
            ));
        }

        let mut middleware = BTreeMap::new();
        for (trigger, hooks) in &options.middleware {
            if hooks.is_empty() {
                log::debug!("Ignoring middleware for '{trigger}' on {name}: no hooks");
                continue;
            }
            match trigger.parse::<Trigger>() {
                Ok(trigger) => {
                    middleware.insert(trigger, hooks.clone());
                }
                Err(e) => log::warn!("Skipping middleware on {name}: {e}"),
            }
        }

        let collection = match &options.collection {
            Some(collection) => collection.clone(),
            None => default_collection_name(name),
        };

        log::debug!(
            "Compiled schema {name} ({} fields, {} indexes) for collection {collection}",
            compiled.len(),
            indexes.len()
        );

        Ok(CompiledSchema {
            name: name.to_string(),
            collection,
            fields: compiled,
            indexes,
            virtuals,
            middleware,
            methods: options.methods,
            statics: options.statics,
            strict: options.strict.unwrap_or(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn virtual_field(&self, name: &str) -> Option<&Virtual> {
        self.virtuals.get(name)
    }

    pub fn middleware(&self, trigger: Trigger) -> Option<&Middleware> {
        self.middleware.get(&trigger)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn static_fn(&self, name: &str) -> Option<&Static> {
        self.statics.get(name)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Defaults and enum values must be expressible in the field's type.
fn check_descriptor(key: &str, descriptor: &FieldDescriptor) -> Result<()> {
    let field_type = &descriptor.field_type;

    if let Some(DefaultValue::Value(value)) = &descriptor.default {
        if let Err(bad) = field_type.cast(value.clone()) {
            return Err(ModelError::schema(
                key,
                format!("default value `{bad}` is not a valid {field_type}"),
            ));
        }
    }

    if let Some(enumeration) = &descriptor.enumeration {
        let item_type = match field_type {
            crate::property::FieldType::Array(Some(item)) => item.as_ref(),
            other => other,
        };
        for value in &enumeration.values {
            if let Err(bad) = item_type.cast(value.clone()) {
                return Err(ModelError::schema(
                    key,
                    format!("enum value `{bad}` is not a valid {item_type}"),
                ));
            }
        }
    }

    Ok(())
}

/// `Person` -> `people`, `ArrayModel` -> `arraymodels`.
pub fn default_collection_name(model: &str) -> String {
    pluralizer::pluralize(&model.to_lowercase(), 2, false)
}
