use crate::config::Config;
use crate::document::Document;
use crate::error::{ModelError, Result, ValidationError, ValidationKind, ValidatorError};
use crate::schema::{CompiledSchema, Trigger};
use crate::store::{DocumentStore, StoredDocument};
use crate::validation::{apply_defaults, validate_document};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use ulid::Ulid;

/// Runtime handle for one registered schema.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<CompiledSchema>,
    store: Arc<dyn DocumentStore>,
    config: Arc<Config>,
}

impl Model {
    pub(crate) fn new(
        schema: Arc<CompiledSchema>,
        store: Arc<dyn DocumentStore>,
        config: Arc<Config>,
    ) -> Self {
        Model {
            schema,
            store,
            config,
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        self.schema.collection()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A new, unsaved document seeded with `values`.
    pub fn instantiate(&self, values: impl Into<Value>) -> Document {
        Document::new(self.clone(), values.into())
    }

    /// Invoke a static declared in the schema options.
    pub fn call_static(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(f) = self.schema.static_fn(name) else {
            return Err(ModelError::UnknownStatic {
                model: self.name().to_string(),
                name: name.to_string(),
            });
        };
        (f.0)(self, args)
    }

    /// Validate and store `doc`, running middleware around both steps.
    ///
    /// Resolves once, with either the saved document or a single error.
    /// Field failures are aggregated into one [`ModelError::Validation`].
    pub async fn persist(&self, doc: &mut Document) -> Result<Value> {
        apply_defaults(&self.schema, doc.fields_mut());

        self.run_pre(Trigger::Validate, doc)?;
        let errors = validate_document(&self.schema, doc.fields_mut(), self.config.aggregation);
        if !errors.is_empty() {
            return Err(errors.into());
        }
        self.run_post(Trigger::Validate, doc);

        self.run_pre(Trigger::Save, doc)?;
        self.check_unique(doc).await?;

        let id = doc.id().to_string();
        self.store
            .save(self.collection(), &id, doc.fields())
            .await?;
        log::debug!("Saved {} {id} to {}", self.name(), self.collection());
        doc.mark_saved();

        self.run_post(Trigger::Save, doc);
        Ok(doc.to_value())
    }

    /// Delete `doc` from the store, running `remove` middleware.
    pub async fn remove(&self, doc: &mut Document) -> Result<bool> {
        self.run_pre(Trigger::Remove, doc)?;
        let removed = self
            .store
            .remove(self.collection(), &doc.id().to_string())
            .await?;
        self.run_post(Trigger::Remove, doc);
        Ok(removed)
    }

    /// Documents whose top-level paths equal `filter`. Filter values are cast
    /// to the declared field types first.
    pub async fn find(&self, filter: impl Into<Value>) -> Result<Vec<Document>> {
        let filter = self.cast_filter(filter.into())?;
        let stored = self.store.find(self.collection(), &filter).await?;
        stored.into_iter().map(|doc| self.hydrate(doc)).collect()
    }

    pub async fn find_one(&self, filter: impl Into<Value>) -> Result<Option<Document>> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, id: Ulid) -> Result<Option<Document>> {
        let filter: BTreeMap<String, Value> =
            [("_id".to_string(), Value::Identifier(id))].into_iter().collect();
        let stored = self.store.find(self.collection(), &filter).await?;
        stored.into_iter().next().map(|doc| self.hydrate(doc)).transpose()
    }

    pub async fn count(&self, filter: impl Into<Value>) -> Result<usize> {
        let filter = self.cast_filter(filter.into())?;
        Ok(self.store.find(self.collection(), &filter).await?.len())
    }

    fn run_pre(&self, trigger: Trigger, doc: &mut Document) -> Result<()> {
        if let Some(pre) = self.schema.middleware(trigger).and_then(|m| m.pre.as_ref()) {
            (pre.0)(doc).map_err(|e| {
                log::warn!("{trigger} hook on {} failed: {e}", self.name());
                e
            })?;
        }
        Ok(())
    }

    fn run_post(&self, trigger: Trigger, doc: &Document) {
        if let Some(post) = self.schema.middleware(trigger).and_then(|m| m.post.as_ref()) {
            (post.0)(doc);
        }
    }

    async fn check_unique(&self, doc: &Document) -> Result<()> {
        for index in self.schema.indexes().iter().filter(|idx| idx.unique) {
            let filter: BTreeMap<String, Value> = index
                .paths()
                .map(|path| {
                    let value = match path {
                        "_id" => Value::Identifier(doc.id()),
                        _ => doc.raw(path).cloned().unwrap_or(Value::Null),
                    };
                    (path.to_string(), value)
                })
                .collect();
            if index.sparse && filter.values().all(Value::is_nullish) {
                continue;
            }

            let own_id = doc.id().to_string();
            let clash = self
                .store
                .find(self.collection(), &filter)
                .await?
                .into_iter()
                .any(|other| other.id != own_id);
            if clash {
                return Err(ModelError::DuplicateKey {
                    collection: self.collection().to_string(),
                    index: index.label(),
                });
            }
        }
        Ok(())
    }

    fn cast_filter(&self, filter: Value) -> Result<BTreeMap<String, Value>> {
        let entries = match filter {
            Value::Structured(entries) => entries,
            Value::Undefined | Value::Null => return Ok(BTreeMap::new()),
            other => {
                return Err(ModelError::Other(format!(
                    "query filter for {} must be structured, got {}",
                    self.name(),
                    other.type_name()
                )))
            }
        };

        let mut cast = BTreeMap::new();
        let mut errors = ValidationError::new(self.name());
        for (path, value) in entries {
            let value = match self.schema.field(&path) {
                Some(descriptor) => match descriptor.field_type.cast(value) {
                    Ok(value) => value,
                    Err(bad) => {
                        errors.push(ValidatorError {
                            kind: ValidationKind::Cast,
                            message: format!(
                                "Cast to {} failed for value \"{bad}\" at path \"{path}\"",
                                descriptor.field_type
                            ),
                            path: path.clone(),
                            value: bad,
                        });
                        continue;
                    }
                },
                None => value,
            };
            cast.insert(path, value);
        }

        if errors.is_empty() {
            Ok(cast)
        } else {
            Err(errors.into())
        }
    }

    fn hydrate(&self, stored: StoredDocument) -> Result<Document> {
        let id = Ulid::from_string(&stored.id).map_err(|e| {
            ModelError::Store(format!(
                "invalid document id `{}` in {}: {e}",
                stored.id,
                self.collection()
            ))
        })?;
        Ok(Document::hydrate(self.clone(), id, stored.fields))
    }
}
