use anyhow::{Error, Result};
use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::KeyValueStore;

/// Durable store backed by the `kv` table. Each write is a single
/// statement so a reader never sees a partially written value.
#[derive(Clone)]
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_owned();
        let value = self
            .db
            .call(move |conn| {
                let value: Option<String> = conn
                    .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_owned();
        let value = value.to_owned();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    [key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_owned();
        let found = self
            .db
            .call(move |conn| {
                let found: Option<i64> = conn
                    .query_row("SELECT 1 FROM kv WHERE key = ?", [key], |row| row.get(0))
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(found)
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let key = key.to_owned();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::async_db;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("kv.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::new(async_db(path).await?);
            store.set("greeting", "hello").await?;
            store.set("greeting", "hello again").await?;
            store.set("doomed", "bye").await?;
            store.remove("doomed").await?;
        }

        let store = SqliteStore::new(async_db(path).await?);
        assert_eq!(store.get("greeting").await?.as_deref(), Some("hello again"));
        assert_eq!(store.get("doomed").await?, None);
        assert!(store.contains("greeting").await?);
        assert!(!store.contains("doomed").await?);
        assert_eq!(store.get("missing").await?, None);
        Ok(())
    }
}
