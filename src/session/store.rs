use anyhow::{Error, Result};
use thiserror::Error;

use super::models::Session;
use crate::storage::SharedStore;

/// Key holding the serialized session blob.
pub const SESSION_KEY: &str = "imptech_chat_v1";

#[derive(Debug, Error)]
pub enum SessionLoadError {
    #[error("No saved session")]
    NotFound,
    #[error("Saved session is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
    #[error("Failed to read saved session: {0}")]
    Storage(Error),
}

/// How a session came to be after `load_or_default`.
#[derive(Debug)]
pub enum LoadStatus {
    /// Nothing was saved before
    Fresh,
    Restored,
    /// Something was saved but couldn't be read back, so the session
    /// started over empty
    Recovered(SessionLoadError),
}

/// Reads and writes the whole session as one JSON blob under
/// `SESSION_KEY`.
#[derive(Clone)]
pub struct SessionStore {
    kv: SharedStore,
}

impl SessionStore {
    pub fn new(kv: SharedStore) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> Result<Session, SessionLoadError> {
        let raw = self
            .kv
            .get(SESSION_KEY)
            .await
            .map_err(SessionLoadError::Storage)?
            .ok_or(SessionLoadError::NotFound)?;
        let session = serde_json::from_str(&raw)?;
        Ok(session)
    }

    /// Load the saved session, starting over with an empty one when
    /// there is none or it is corrupted. Storage failures are still
    /// returned as errors.
    pub async fn load_or_default(&self) -> Result<(Session, LoadStatus), Error> {
        match self.load().await {
            Ok(session) => Ok((session, LoadStatus::Restored)),
            Err(SessionLoadError::NotFound) => Ok((Session::new(), LoadStatus::Fresh)),
            Err(SessionLoadError::Storage(e)) => Err(e),
            Err(e @ SessionLoadError::Corrupted(_)) => {
                tracing::warn!("Starting with an empty session: {}", e);
                Ok((Session::new(), LoadStatus::Recovered(e)))
            }
        }
    }

    /// Overwrite the saved blob. In-flight placeholders are left out.
    pub async fn save(&self, session: &Session) -> Result<(), Error> {
        let data = serde_json::to_string(&session.persistable())?;
        self.kv.set(SESSION_KEY, &data).await
    }
}
