use crate::error::{ModelError, Result};
use crate::store::{DocumentStore, StoredDocument};
use crate::value::Value;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed store. Every collection shares one `documents` table and
/// each document's fields are kept as JSON.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            ",
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ModelError::Store("sqlite connection lock poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn save(
        &self,
        collection: &str,
        id: &str,
        fields: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let data_json = serde_json::to_string(fields)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO documents (collection, id, data_json) VALUES (?1, ?2, ?3)",
            params![collection, id, data_json],
        )?;
        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &BTreeMap<String, Value>,
    ) -> Result<Vec<StoredDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, data_json FROM documents WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, data_json) = row?;
            let doc = StoredDocument {
                id,
                fields: serde_json::from_str(&data_json)?,
            };
            if doc.matches(filter) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(removed > 0)
    }

    async fn drop_collection(&self, collection: &str) -> Result<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![collection],
        )?;
        Ok(removed > 0)
    }

    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    #[tokio::test]
    async fn test_values_survive_json() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = Ulid::new();
        let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let fields: BTreeMap<String, Value> = [
            ("name".to_string(), Value::from("Alice")),
            ("joined".to_string(), Value::from(when)),
            ("friend".to_string(), Value::from(id)),
            (
                "tags".to_string(),
                Value::from(vec![Value::from("a"), Value::Undefined]),
            ),
        ]
        .into_iter()
        .collect();

        store.save("users", "1", &fields).await.unwrap();
        let found = store.find("users", &BTreeMap::new()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fields, fields);
    }

    #[tokio::test]
    async fn test_filter_remove_and_drop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice: BTreeMap<String, Value> =
            [("name".to_string(), Value::from("Alice"))].into_iter().collect();
        let bob: BTreeMap<String, Value> =
            [("name".to_string(), Value::from("Bob"))].into_iter().collect();
        store.save("users", "1", &alice).await.unwrap();
        store.save("users", "2", &bob).await.unwrap();

        let found = store.find("users", &bob).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");

        assert!(store.remove("users", "1").await.unwrap());
        assert!(store.has_collection("users").await.unwrap());
        assert!(store.drop_collection("users").await.unwrap());
        assert!(!store.drop_collection("users").await.unwrap());
        assert!(!store.has_collection("users").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save("things", "1", &BTreeMap::new()).await.unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.has_collection("things").await.unwrap());
    }
}
