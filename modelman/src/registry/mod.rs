// Named registry of compiled schemas, bound to one document store

mod model;

pub use model::Model;

use crate::config::Config;
use crate::document::Document;
use crate::error::{ModelError, Result};
use crate::property::PropertyBuilder;
use crate::schema::{CompiledSchema, IntoFieldDescriptor, ModelDefinition, SchemaOptions};
use crate::store::{connect_default, DocumentStore, MemoryStore};
use crate::value::Value;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Entry point: builds properties, compiles and registers schemas, and hands
/// out [`Model`] handles bound to the registry's store.
#[derive(Debug)]
pub struct ModelRegistry {
    config: Arc<Config>,
    store: Arc<dyn DocumentStore>,
    models: RwLock<HashMap<String, Model>>,
}

impl ModelRegistry {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        ModelRegistry {
            config: Arc::new(config),
            store,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// A registry over a fresh [`MemoryStore`].
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// A registry over the store named by `config.connection`.
    pub fn connect(config: Config) -> Result<Self> {
        let store = connect_default(&config)?;
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// A property builder carrying this registry's configuration.
    pub fn property(&self) -> PropertyBuilder {
        PropertyBuilder::new(&self.config)
    }

    /// Like [`property`](Self::property), with a label used in default messages.
    pub fn named(&self, name: impl Into<String>) -> PropertyBuilder {
        PropertyBuilder::named(name, &self.config)
    }

    /// Compile a schema without registering it.
    pub fn schema<I, K, F>(
        &self,
        name: &str,
        fields: I,
        options: impl Into<Option<SchemaOptions>>,
    ) -> Result<CompiledSchema>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoFieldDescriptor,
    {
        CompiledSchema::compile(name, fields, options.into().unwrap_or_default())
    }

    /// Compile `fields` and `options` and register the result under `name`.
    /// Registering a name again replaces the earlier schema.
    pub fn register<I, K, F>(
        &self,
        name: &str,
        fields: I,
        options: impl Into<Option<SchemaOptions>>,
    ) -> Result<Model>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: IntoFieldDescriptor,
    {
        let schema = self.schema(name, fields, options)?;
        let model = Model::new(
            Arc::new(schema),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        );

        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if models.insert(name.to_string(), model.clone()).is_some() {
            log::warn!("Model {name} was already registered; replacing its schema");
        } else {
            log::info!("Registered model {name} ({})", model.collection());
        }
        Ok(model)
    }

    /// Look up a registered model.
    pub fn model(&self, name: &str) -> Result<Model> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::NotRegistered(name.to_string()))
    }

    /// Registered model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// A new, unsaved document of model `name`.
    pub fn instantiate(&self, name: &str, values: impl Into<Value>) -> Result<Document> {
        Ok(self.model(name)?.instantiate(values))
    }

    /// Persist `doc` through its model.
    pub async fn persist(&self, doc: &mut Document) -> Result<Value> {
        let model = doc.model().clone();
        model.persist(doc).await
    }

    /// Instantiate and persist in one step.
    pub async fn save(&self, name: &str, values: impl Into<Value>) -> Result<Value> {
        let mut doc = self.instantiate(name, values)?;
        self.persist(&mut doc).await
    }

    /// Drop a collection. A collection that does not exist is not an error.
    pub async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let dropped = self.store.drop_collection(collection).await?;
        if dropped {
            log::info!("Dropped collection {collection}");
        } else {
            log::debug!("Collection {collection} does not exist; nothing to drop");
        }
        Ok(dropped)
    }

    /// Register every `.yaml`/`.yml` model definition under `root`,
    /// recursively. With `filter`, only files whose name matches it are
    /// loaded. Files are visited in path order; the model name is the
    /// definition's `name` or the file stem.
    pub fn register_all(&self, root: impl AsRef<Path>, filter: Option<&Regex>) -> Result<Vec<Model>> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ModelError::Other(format!(
                "Model directory does not exist: {}",
                root.display()
            )));
        }

        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&root.display().to_string())
        );
        let mut files: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| ModelError::Other(format!("Glob error: {e}")))?
            .filter_map(|r| r.ok())
            .filter(|path| path.is_file() && is_definition_file(path, filter))
            .collect();
        files.sort();

        let mut registered = Vec::with_capacity(files.len());
        for path in &files {
            let definition = ModelDefinition::from_path(path)?;
            let name = match (&definition.name, path.file_stem()) {
                (Some(name), _) => name.clone(),
                (None, Some(stem)) => stem.to_string_lossy().into_owned(),
                (None, None) => continue,
            };
            log::debug!("Loading model {name} from {}", path.display());
            let fields = definition.builders(&self.config)?;
            registered.push(self.register(&name, fields, definition.options())?);
        }
        Ok(registered)
    }
}

fn is_definition_file(path: &Path, filter: Option<&Regex>) -> bool {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if !is_yaml {
        return false;
    }
    match (filter, path.file_name().and_then(|n| n.to_str())) {
        (Some(filter), Some(file_name)) => filter.is_match(file_name),
        (Some(_), None) => false,
        (None, _) => true,
    }
}
