use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Error, Result};
use thiserror::Error;

use crate::ai::{AiBridge, BridgeConfig, Outcome};
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::credentials::CredentialManager;
use crate::render::{RenderContext, Renderer};
use crate::session::{LoadStatus, MediaStore, Message, SessionHandle, SessionStore};
use crate::storage::{MemoryStore, SharedStore, SqliteStore};

#[derive(Debug, Error, PartialEq)]
pub enum ChatError {
    #[error("Enter a display name")]
    EmptyDisplayName,
    #[error("Join the chat with a display name first")]
    NotJoined,
    #[error("Type a message to ask AI")]
    EmptyPrompt,
    #[error("There is no message #{0}")]
    NoSuchMessage(usize),
    #[error("Message #{0} has no attachment")]
    NoAttachment(usize),
}

/// A user message and what the assistant did about it.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub sent: Message,
    pub outcome: Outcome,
}

/// Everything a user can do in the chat, wired to one session.
///
/// Cloning is cheap; clones share the session, so several sends may
/// be in flight at once.
#[derive(Clone)]
pub struct ChatClient {
    session: SessionHandle,
    bridge: AiBridge,
    credentials: CredentialManager,
}

impl ChatClient {
    pub fn new(session: SessionHandle, bridge: AiBridge, credentials: CredentialManager) -> Self {
        Self {
            session,
            bridge,
            credentials,
        }
    }

    /// Open the client on the database at `config.db_path`.
    pub async fn open(config: &AppConfig) -> Result<(Self, LoadStatus), Error> {
        let db = async_db(&config.db_path).await?;
        Self::open_with_store(config, Arc::new(SqliteStore::new(db))).await
    }

    /// Open the client on an existing durable store. A fresh volatile
    /// store is created every time, the same as a restart.
    pub async fn open_with_store(
        config: &AppConfig,
        durable: SharedStore,
    ) -> Result<(Self, LoadStatus), Error> {
        let volatile: SharedStore = Arc::new(MemoryStore::new());

        let credentials = CredentialManager::new(durable.clone(), volatile.clone());
        if let Some(key) = &config.openai_api_key {
            credentials.seed_volatile(key).await?;
        }

        let store = SessionStore::new(durable.clone());
        let (session, status) = store.load_or_default().await?;
        tracing::debug!(
            "Loaded session with {} messages ({:?})",
            session.messages().len(),
            status
        );

        let media = MediaStore::new(durable, volatile, config.media.clone());
        let session = SessionHandle::new(session, store, media);
        let bridge = AiBridge::new(BridgeConfig::from(config), credentials.clone());

        Ok((Self::new(session, bridge, credentials), status))
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn display_name(&self) -> Option<String> {
        self.session.display_name().await
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.session.messages().await
    }

    pub async fn join(&self, name: &str) -> Result<(), Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::EmptyDisplayName.into());
        }
        self.session.set_name(Some(name.to_string())).await?;
        tracing::info!("Joined as {}", name);
        Ok(())
    }

    /// Forget the display name. Messages stay.
    pub async fn logout(&self) -> Result<(), Error> {
        self.session.set_name(None).await
    }

    async fn author(&self) -> Result<String, Error> {
        Ok(self.session.display_name().await.ok_or(ChatError::NotJoined)?)
    }

    /// Post a message and wait for the assistant's answer. Returns
    /// `None` without touching the session when there is neither text
    /// nor an attachment.
    pub async fn send(&self, text: &str, attachment: Option<&Path>) -> Result<Option<Exchange>, Error> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Ok(None);
        }

        let author = self.author().await?;
        let media = match attachment {
            Some(path) => Some(self.session.media().attach(path).await?),
            None => None,
        };
        let msg = Message::compose(&author, text, media)?;
        Ok(Some(self.post(msg).await?))
    }

    /// Like `send` but text only, and empty text is an error.
    pub async fn ask(&self, text: &str) -> Result<Exchange, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyPrompt.into());
        }
        let author = self.author().await?;
        let msg = Message::compose(&author, text, None)?;
        self.post(msg).await
    }

    async fn post(&self, msg: Message) -> Result<Exchange, Error> {
        self.session.append(msg.clone()).await?;
        let outcome = self.bridge.respond(&self.session, &msg).await?;
        Ok(Exchange { sent: msg, outcome })
    }

    /// Remove every message once `confirm` agrees. The display name is
    /// kept.
    pub async fn clear_chat<F>(&self, confirm: F) -> Result<bool, Error>
    where
        F: FnOnce() -> bool,
    {
        self.session.clear(confirm).await
    }

    pub async fn render(&self, viewport_rows: Option<usize>) -> Result<String, Error> {
        let session = self.session.snapshot().await;

        let mut missing_media = HashSet::new();
        for media in session.messages().iter().filter_map(|m| m.media.as_ref()) {
            if !self.session.media().is_available(media).await? {
                missing_media.insert(media.data.clone());
            }
        }

        let ctx = RenderContext {
            display_name: session.display_name(),
            missing_media,
            viewport_rows,
            numbered: true,
        };
        Ok(Renderer::new().to_terminal(session.messages(), &ctx))
    }

    /// Write the attachment of message `position` (1-based, as shown in
    /// the history) to `dest`. A directory destination gets the
    /// attachment's own file name.
    pub async fn export_media(&self, position: usize, dest: &Path) -> Result<PathBuf, Error> {
        let messages = self.session.messages().await;
        let msg = position
            .checked_sub(1)
            .and_then(|i| messages.get(i))
            .ok_or(ChatError::NoSuchMessage(position))?;
        let media = msg
            .media
            .as_ref()
            .ok_or(ChatError::NoAttachment(position))?;

        let bytes = self.session.media().decode(media).await?;
        let path = if dest.is_dir() {
            dest.join(&media.name)
        } else {
            dest.to_path_buf()
        };
        tokio::fs::write(&path, bytes).await?;
        tracing::info!("Exported {} to {}", media.name, path.display());
        Ok(path)
    }
}
