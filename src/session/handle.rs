use std::sync::Arc;

use anyhow::{Error, Result};
use tokio::sync::Mutex;

use super::media::MediaStore;
use super::models::{Message, RequestId, Session};
use super::store::SessionStore;

/// Single owner of the live session. Every mutation goes through here
/// and is persisted before the lock is released, so concurrent callers
/// never write stale snapshots over each other.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    store: SessionStore,
    media: MediaStore,
}

impl SessionHandle {
    pub fn new(session: Session, store: SessionStore, media: MediaStore) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            store,
            media,
        }
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.session.lock().await.messages().to_vec()
    }

    pub async fn display_name(&self) -> Option<String> {
        self.session.lock().await.display_name().map(String::from)
    }

    /// Apply `change` to a copy of the session and swap it in only once
    /// the copy is saved. A failed save leaves memory untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut session = self.session.lock().await;
        let mut next = session.clone();
        let out = change(&mut next);
        self.store.save(&next).await?;
        *session = next;
        Ok(out)
    }

    pub async fn set_name(&self, name: Option<String>) -> Result<(), Error> {
        self.commit(|session| session.set_name(name)).await
    }

    pub async fn append(&self, msg: Message) -> Result<(), Error> {
        self.commit(|session| session.append(msg)).await
    }

    /// Swap the placeholder tagged `id` for `msg` in one step. The
    /// message is appended even if the placeholder is already gone.
    pub async fn replace_placeholder(&self, id: RequestId, msg: Message) -> Result<bool, Error> {
        let found = self
            .commit(|session| {
                let found = session.remove_placeholder(id);
                session.append(msg);
                found
            })
            .await?;
        if !found {
            tracing::warn!("Placeholder for {} was already removed", id);
        }
        Ok(found)
    }

    /// Drop the placeholder tagged `id` without a replacement. Only
    /// memory changes since placeholders are never saved.
    pub async fn discard_placeholder(&self, id: RequestId) -> bool {
        self.session.lock().await.remove_placeholder(id)
    }

    /// Empty the message list once `confirm` agrees. Out-of-line media
    /// owned by the removed messages is evicted. Returns whether
    /// anything was cleared.
    pub async fn clear<F>(&self, confirm: F) -> Result<bool, Error>
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return Ok(false);
        }

        let removed = self.commit(|session| session.clear()).await?;

        for media in removed.iter().filter_map(|m| m.media.as_ref()) {
            if let Err(e) = self.media.evict(media).await {
                tracing::warn!("Failed to evict attachment {}: {}", media.name, e);
            }
        }
        tracing::info!("Cleared {} messages", removed.len());
        Ok(true)
    }
}
