// Document stores: the persistence collaborator behind every model

mod sqlite;

pub use sqlite::SqliteStore;

use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use url::Url;

/// A document as held by a store: its id and its persisted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

impl StoredDocument {
    /// Equality on top-level paths. `_id` matches the document id; a missing
    /// field matches a null filter value.
    pub fn matches(&self, filter: &BTreeMap<String, Value>) -> bool {
        filter.iter().all(|(path, expected)| {
            if path == "_id" {
                return match expected {
                    Value::Identifier(id) => id.to_string() == self.id,
                    Value::Text(id) => *id == self.id,
                    _ => false,
                };
            }
            match self.fields.get(path) {
                Some(actual) if actual.is_nullish() => expected.is_nullish(),
                Some(actual) => actual == expected,
                None => expected.is_nullish(),
            }
        })
    }
}

/// Storage backend contract. Every operation is keyed by collection name.
#[async_trait]
pub trait DocumentStore: fmt::Debug + Send + Sync {
    /// Insert or replace the document with `id`.
    async fn save(&self, collection: &str, id: &str, fields: &BTreeMap<String, Value>)
        -> Result<()>;

    /// Documents whose top-level paths equal `filter`; an empty filter
    /// matches everything.
    async fn find(
        &self,
        collection: &str,
        filter: &BTreeMap<String, Value>,
    ) -> Result<Vec<StoredDocument>>;

    async fn remove(&self, collection: &str, id: &str) -> Result<bool>;

    /// Drop a whole collection. Unknown collections are not an error.
    async fn drop_collection(&self, collection: &str) -> Result<bool>;

    async fn has_collection(&self, collection: &str) -> Result<bool>;
}

/// Process-local store keeping every collection in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> ModelError {
        ModelError::Store("memory store lock poisoned".into())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(
        &self,
        collection: &str,
        id: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields.clone());
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &BTreeMap<String, Value>,
    ) -> Result<Vec<StoredDocument>> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .map(|(id, fields)| StoredDocument {
                id: id.clone(),
                fields: fields.clone(),
            })
            .filter(|doc| doc.matches(filter))
            .collect())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get_mut(collection)
            .is_some_and(|documents| documents.remove(id).is_some()))
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;
        Ok(collections.remove(collection).is_some())
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections.contains_key(collection))
    }
}

/// Open a store from a connection URL.
///
/// * `memory:` - a fresh [`MemoryStore`]
/// * `sqlite::memory:` - an in-memory SQLite database
/// * `sqlite:<path>` - a SQLite database file
pub fn connect(url: &str) -> Result<Arc<dyn DocumentStore>> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let store = if parsed.path() == ":memory:" {
                SqliteStore::open_in_memory()?
            } else {
                SqliteStore::open(parsed.path())?
            };
            Ok(Arc::new(store))
        }
        other => Err(ModelError::Store(format!(
            "unsupported store `{other}`; url={url}"
        ))),
    }
}

/// Open the store named by `config.connection`.
pub fn connect_default(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    log::debug!("Connecting to {}", config.connection);
    connect(&config.connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store
            .save("users", "1", &fields(&[("name", Value::from("Alice"))]))
            .await
            .unwrap();
        store
            .save("users", "2", &fields(&[("name", Value::from("Bob"))]))
            .await
            .unwrap();

        let all = store.find("users", &BTreeMap::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let bob = store
            .find("users", &fields(&[("name", Value::from("Bob"))]))
            .await
            .unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].id, "2");

        assert!(store.remove("users", "2").await.unwrap());
        assert!(!store.remove("users", "2").await.unwrap());
        assert_eq!(store.find("users", &BTreeMap::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_missing_collection() {
        let store = MemoryStore::new();
        assert!(!store.drop_collection("ghosts").await.unwrap());
        store.save("ghosts", "1", &BTreeMap::new()).await.unwrap();
        assert!(store.has_collection("ghosts").await.unwrap());
        assert!(store.drop_collection("ghosts").await.unwrap());
        assert!(!store.has_collection("ghosts").await.unwrap());
    }

    #[test]
    fn test_matches_null_and_id() {
        let doc = StoredDocument {
            id: "abc".into(),
            fields: fields(&[("a", Value::from(1)), ("b", Value::Null)]),
        };
        assert!(doc.matches(&fields(&[("a", Value::from(1))])));
        assert!(doc.matches(&fields(&[("b", Value::Null), ("c", Value::Null)])));
        assert!(doc.matches(&fields(&[("_id", Value::from("abc"))])));
        assert!(!doc.matches(&fields(&[("a", Value::from(2))])));
    }

    #[test]
    fn test_connect_schemes() {
        assert!(connect("memory:").is_ok());
        assert!(connect("sqlite::memory:").is_ok());
        match connect("postgres://localhost/db") {
            Err(ModelError::Store(msg)) => assert!(msg.contains("postgres")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(connect("not a url"), Err(ModelError::Url(_))));
    }
}
