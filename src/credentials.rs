//! API key handling. The key is kept in plaintext and never validated;
//! it only ever leaves the machine as a bearer token.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Error, Result};

use crate::storage::SharedStore;

/// Key the credential is stored under in both stores.
pub const CREDENTIAL_KEY: &str = "imptech_openai_key";

#[derive(Debug, PartialEq)]
pub enum CredentialChange {
    Stored,
    Cleared,
}

#[derive(Clone)]
pub struct CredentialManager {
    durable: SharedStore,
    volatile: SharedStore,
    prompt_visible: Arc<AtomicBool>,
}

impl CredentialManager {
    pub fn new(durable: SharedStore, volatile: SharedStore) -> Self {
        Self {
            durable,
            volatile,
            prompt_visible: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Put a key in the volatile store only, e.g. one handed over
    /// through the environment. It is forgotten on exit.
    pub async fn seed_volatile(&self, key: &str) -> Result<(), Error> {
        self.volatile.set(CREDENTIAL_KEY, key).await
    }

    /// Open the entry prompt. Returns the durable key to prefill it with.
    pub async fn show(&self) -> Result<Option<String>, Error> {
        self.prompt_visible.store(true, Ordering::SeqCst);
        self.durable.get(CREDENTIAL_KEY).await
    }

    pub fn hide(&self) {
        self.prompt_visible.store(false, Ordering::SeqCst);
    }

    pub fn is_prompt_visible(&self) -> bool {
        self.prompt_visible.load(Ordering::SeqCst)
    }

    /// Empty input forgets the key everywhere, anything else is
    /// written to the durable store as is.
    pub async fn save(&self, key: &str) -> Result<CredentialChange, Error> {
        let key = key.trim();
        let change = if key.is_empty() {
            self.durable.remove(CREDENTIAL_KEY).await?;
            self.volatile.remove(CREDENTIAL_KEY).await?;
            CredentialChange::Cleared
        } else {
            self.durable.set(CREDENTIAL_KEY, key).await?;
            CredentialChange::Stored
        };
        self.hide();
        tracing::info!("API key {:?}", change);
        Ok(change)
    }

    /// The key to use for the next request, preferring the volatile
    /// store.
    pub async fn resolve(&self) -> Result<Option<String>, Error> {
        if let Some(key) = self.volatile.get(CREDENTIAL_KEY).await? {
            return Ok(Some(key));
        }
        self.durable.get(CREDENTIAL_KEY).await
    }
}
