//! Key-value storage used for everything the client persists.
//!
//! Two implementations share the `KeyValueStore` trait: `SqliteStore`
//! is durable across restarts, `MemoryStore` lives only as long as the
//! process and stands in for per-session storage.
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    async fn remove(&self, key: &str) -> Result<(), Error>;

    /// Whether `key` holds a value. Stores should override this when
    /// they can answer without reading the value.
    async fn contains(&self, key: &str) -> Result<bool, Error> {
        Ok(self.get(key).await?.is_some())
    }
}

pub type SharedStore = Arc<dyn KeyValueStore>;
