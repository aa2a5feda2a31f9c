use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

use super::KeyValueStore;

/// Volatile store. Nothing written here survives a restart.
#[derive(Default)]
pub struct MemoryStore(RwLock<HashMap<String, String>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let map = self
            .0
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.0
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.0
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?
            .remove(key);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let map = self
            .0
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(map.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        assert!(store.contains("k").await.unwrap());

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.contains("k").await.unwrap());

        // Removing a missing key is not an error
        store.remove("k").await.unwrap();
    }
}
