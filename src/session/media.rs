//! Media attachments: conversion of local files to data URLs and a
//! size-budgeted store that keeps large payloads out of the session
//! blob.
use std::path::Path;
use std::str::FromStr;

use anyhow::{Error, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use uuid::Uuid;

use super::models::Media;
use crate::storage::SharedStore;

/// Prefix of the `data` field of media held out of line.
pub const MEDIA_HANDLE_PREFIX: &str = "imptech-media:";
const MEDIA_KEY_PREFIX: &str = "imptech_media:";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{name} is {size} bytes which exceeds the {limit} byte attachment limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("Attachment {0} is no longer available")]
    Unavailable(String),
    #[error("Malformed data URL")]
    MalformedDataUrl,
    #[error("Unknown media persistence mode: {0}")]
    UnknownPersistence(String),
}

/// Where attachment payloads live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaPersistence {
    /// Small payloads inline in the message, large ones out of line in
    /// the durable store. Everything survives a restart.
    Durable,
    /// Payloads only in the volatile store. Previews are gone after a
    /// restart.
    Transient,
}

impl FromStr for MediaPersistence {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "durable" => Ok(Self::Durable),
            "transient" => Ok(Self::Transient),
            other => Err(MediaError::UnknownPersistence(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaPolicy {
    /// Payloads up to this many bytes are embedded in the message
    pub inline_limit: u64,
    /// Attachments over this many bytes are refused
    pub max_bytes: u64,
    pub persistence: MediaPersistence,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            inline_limit: 256 * 1024,
            max_bytes: 20 * 1024 * 1024,
            persistence: MediaPersistence::Durable,
        }
    }
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and decoded bytes.
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), MediaError> {
    let rest = url.strip_prefix("data:").ok_or(MediaError::MalformedDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(MediaError::MalformedDataUrl)?;
    let mime_type = meta
        .strip_suffix(";base64")
        .ok_or(MediaError::MalformedDataUrl)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| MediaError::MalformedDataUrl)?;
    Ok((mime_type.to_string(), bytes))
}

fn handle_of(media: &Media) -> Option<&str> {
    media.data.strip_prefix(MEDIA_HANDLE_PREFIX)
}

fn storage_key(handle: &str) -> String {
    format!("{}{}", MEDIA_KEY_PREFIX, handle)
}

#[derive(Clone)]
pub struct MediaStore {
    durable: SharedStore,
    volatile: SharedStore,
    policy: MediaPolicy,
}

impl MediaStore {
    pub fn new(durable: SharedStore, volatile: SharedStore, policy: MediaPolicy) -> Self {
        Self {
            durable,
            volatile,
            policy,
        }
    }

    pub fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    /// Read a local file and turn it into an attachment. The MIME type
    /// is guessed from the extension.
    pub async fn attach(&self, path: &Path) -> Result<Media, Error> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or(anyhow!("Not a file: {}", path.display()))?;

        // Check the size before reading the whole thing into memory
        let size = tokio::fs::metadata(path).await?.len();
        if size > self.policy.max_bytes {
            return Err(MediaError::TooLarge {
                name,
                size,
                limit: self.policy.max_bytes,
            }
            .into());
        }

        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        self.ingest(&name, &mime_type, &bytes).await
    }

    pub async fn ingest(&self, name: &str, mime_type: &str, bytes: &[u8]) -> Result<Media, Error> {
        let size = bytes.len() as u64;
        if size > self.policy.max_bytes {
            return Err(MediaError::TooLarge {
                name: name.to_string(),
                size,
                limit: self.policy.max_bytes,
            }
            .into());
        }

        let data_url = to_data_url(mime_type, bytes);
        let data = match self.policy.persistence {
            MediaPersistence::Durable if size <= self.policy.inline_limit => data_url,
            MediaPersistence::Durable => {
                let handle = Uuid::new_v4().to_string();
                self.durable.set(&storage_key(&handle), &data_url).await?;
                tracing::debug!("Stored {} ({} bytes) out of line as {}", name, size, handle);
                format!("{}{}", MEDIA_HANDLE_PREFIX, handle)
            }
            MediaPersistence::Transient => {
                let handle = Uuid::new_v4().to_string();
                self.volatile.set(&storage_key(&handle), &data_url).await?;
                format!("{}{}", MEDIA_HANDLE_PREFIX, handle)
            }
        };

        Ok(Media {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            byte_size: size,
            data,
        })
    }

    async fn lookup(&self, handle: &str) -> Result<Option<String>, Error> {
        let key = storage_key(handle);
        if let Some(url) = self.durable.get(&key).await? {
            return Ok(Some(url));
        }
        self.volatile.get(&key).await
    }

    /// The data URL for an attachment, following handles.
    pub async fn resolve(&self, media: &Media) -> Result<String, Error> {
        match handle_of(media) {
            None => Ok(media.data.clone()),
            Some(handle) => self
                .lookup(handle)
                .await?
                .ok_or_else(|| MediaError::Unavailable(media.name.clone()).into()),
        }
    }

    pub async fn is_available(&self, media: &Media) -> Result<bool, Error> {
        match handle_of(media) {
            None => Ok(true),
            Some(handle) => {
                let key = storage_key(handle);
                Ok(self.durable.contains(&key).await? || self.volatile.contains(&key).await?)
            }
        }
    }

    /// Raw bytes of an attachment.
    pub async fn decode(&self, media: &Media) -> Result<Vec<u8>, Error> {
        let url = self.resolve(media).await?;
        let (_, bytes) = parse_data_url(&url)?;
        Ok(bytes)
    }

    /// Drop an out-of-line payload. Inline payloads go away with their
    /// message so there is nothing to do for them.
    pub async fn evict(&self, media: &Media) -> Result<(), Error> {
        if let Some(handle) = handle_of(media) {
            let key = storage_key(handle);
            self.durable.remove(&key).await?;
            self.volatile.remove(&key).await?;
        }
        Ok(())
    }
}
