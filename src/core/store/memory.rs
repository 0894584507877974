use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::KvStore;

/// In-memory key-value store used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn behaves_like_a_map() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.expect("get"), None);
        store.set("k", "v").await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some("v".to_string()));
        store.del("k").await.expect("del");
        assert_eq!(store.get("k").await.expect("get"), None);
    }
}
