use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use tokio::sync::Mutex;

use super::KvStore;

/// Key-value store backed by a local sqlite database.
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path)?;
        db.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_del_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("kv.db")).expect("open");

        assert_eq!(store.get("missing").await.expect("get"), None);

        store.set("summary:data", "{}").await.expect("set");
        assert_eq!(
            store.get("summary:data").await.expect("get"),
            Some("{}".to_string())
        );

        store.set("summary:data", "{\"a\":1}").await.expect("overwrite");
        assert_eq!(
            store.get("summary:data").await.expect("get"),
            Some("{\"a\":1}".to_string())
        );

        store.del("summary:data").await.expect("del");
        assert_eq!(store.get("summary:data").await.expect("get"), None);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("kv.db")).expect("open");

        store.set("a", "1").await.expect("set");
        store.set("b", "2").await.expect("set");
        store.del("a").await.expect("del");

        assert_eq!(store.get("a").await.expect("get"), None);
        assert_eq!(store.get("b").await.expect("get"), Some("2".to_string()));
    }
}
