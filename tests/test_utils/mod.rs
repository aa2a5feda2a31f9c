//! Test utilities for integration tests
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

use imptech::chat::ChatClient;
use imptech::core::AppConfig;
use imptech::core::db::async_db;
use imptech::session::{LoadStatus, MediaPolicy};
use imptech::storage::{KeyValueStore, MemoryStore, SharedStore, SqliteStore};
use serde_json::json;
use tempfile::TempDir;

/// Config pointing the client at `api_hostname` with everything else
/// set to the stock defaults.
pub fn test_config(storage: &TempDir, api_hostname: &str, api_key: Option<&str>) -> AppConfig {
    let storage_path = storage.path().to_string_lossy().to_string();
    AppConfig {
        db_path: format!("{}/imptech.db", storage_path),
        storage_path,
        openai_api_hostname: api_hostname.to_string(),
        openai_api_key: api_key.map(String::from),
        openai_model: "gpt-3.5-turbo".to_string(),
        system_message: "You are a helpful assistant.".to_string(),
        context_window: 8,
        max_tokens: 250,
        temperature: 0.7,
        request_timeout_secs: 10,
        media: MediaPolicy::default(),
    }
}

/// Open a client on an in-memory durable store.
pub async fn memory_client(config: &AppConfig) -> ChatClient {
    let durable: SharedStore = Arc::new(MemoryStore::new());
    let (client, _) = ChatClient::open_with_store(config, durable)
        .await
        .expect("Failed to open client");
    client
}

/// Open a client on the sqlite database at `config.db_path`. Calling
/// it again with the same config simulates a restart.
pub async fn sqlite_client(config: &AppConfig) -> (ChatClient, LoadStatus) {
    let db = async_db(&config.db_path)
        .await
        .expect("Failed to open database");
    ChatClient::open_with_store(config, Arc::new(SqliteStore::new(db)))
        .await
        .expect("Failed to open client")
}

/// A chat completion response body with a single choice.
pub fn completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

/// Durable store whose writes start failing after `ok_writes`
/// successful ones.
pub struct FailingStore {
    inner: MemoryStore,
    ok_writes: usize,
    writes: AtomicUsize,
}

impl FailingStore {
    pub fn new(ok_writes: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            ok_writes,
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.ok_writes {
            return Err(anyhow!("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.inner.remove(key).await
    }
}

/// Open a client whose durable writes fail after `ok_writes`.
pub async fn failing_client(config: &AppConfig, ok_writes: usize) -> ChatClient {
    let durable: SharedStore = Arc::new(FailingStore::new(ok_writes));
    let (client, _) = ChatClient::open_with_store(config, durable)
        .await
        .expect("Failed to open client");
    client
}
