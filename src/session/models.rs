//! The core models for a chat session: the session itself, its
//! messages and their media attachments.
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author name reserved for assistant generated messages.
pub const AI_AUTHOR: &str = "AI";

/// Identifies one in-flight AI request so its placeholder can be
/// found and swapped out. Allocated from a monotonic counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ComposeError {
    #[error("A message needs text or an attachment")]
    Empty,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Media {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(rename = "size")]
    pub byte_size: u64,
    /// Either a data URL or a handle to a payload stored out of line
    pub data: String,
}

impl Media {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    #[serde(rename = "user")]
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    // Only placeholders carry one and they are never persisted
    #[serde(skip)]
    pub correlation_id: Option<RequestId>,
}

impl Message {
    /// Build a message, rejecting one that has neither text nor media.
    pub fn compose(author: &str, text: &str, media: Option<Media>) -> Result<Self, ComposeError> {
        if text.trim().is_empty() && media.is_none() {
            return Err(ComposeError::Empty);
        }
        Ok(Message {
            author: author.to_string(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            media,
            correlation_id: None,
        })
    }

    /// A message from the assistant. Callers are expected to pass
    /// non-empty text.
    pub fn ai(text: &str) -> Self {
        Message {
            author: AI_AUTHOR.to_string(),
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            media: None,
            correlation_id: None,
        }
    }

    pub fn placeholder(id: RequestId, text: &str) -> Self {
        Message {
            correlation_id: Some(id),
            ..Message::ai(text)
        }
    }

    pub fn is_ai(&self) -> bool {
        self.author == AI_AUTHOR
    }

    pub fn is_placeholder(&self) -> bool {
        self.correlation_id.is_some()
    }
}

/// The state of one chat: who is talking and everything said so far,
/// in append order.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Session {
    username: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.username = name;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append(&mut self, msg: Message) {
        self.messages.push(msg)
    }

    /// Empties the message list and hands back what was removed. The
    /// display name is untouched.
    pub fn clear(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Removes the placeholder tagged with `id`. Returns whether one
    /// was found.
    pub fn remove_placeholder(&mut self, id: RequestId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.correlation_id != Some(id));
        self.messages.len() != before
    }

    pub fn pending_placeholders(&self) -> usize {
        self.messages.iter().filter(|m| m.is_placeholder()).count()
    }

    /// Copy of the session without in-flight placeholders, which is
    /// what gets written to storage.
    pub fn persistable(&self) -> Session {
        Session {
            username: self.username.clone(),
            messages: self
                .messages
                .iter()
                .filter(|m| !m.is_placeholder())
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_rejects_empty() {
        assert_eq!(
            Message::compose("alice", "   ", None).unwrap_err(),
            ComposeError::Empty
        );
    }

    #[test]
    fn test_compose_allows_media_only() {
        let media = Media {
            name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            byte_size: 3,
            data: "data:image/png;base64,AAAA".to_string(),
        };
        let msg = Message::compose("alice", "", Some(media)).unwrap();
        assert_eq!(msg.text, "");
        assert!(msg.media.unwrap().is_image());
    }

    #[test]
    fn test_message_serialization_uses_blob_field_names() {
        let mut msg = Message::compose("alice", "hello", None).unwrap();
        msg.timestamp = 1700000000000;
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"user":"alice","text":"hello","ts":1700000000000}"#
        );
    }

    #[test]
    fn test_placeholder_id_is_not_serialized() {
        let msg = Message::placeholder(RequestId::new(7), "AI is thinking...");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("metaId").is_none());
        assert!(msg.is_placeholder());
        assert!(msg.is_ai());
    }

    #[test]
    fn test_session_deserializes_missing_fields() {
        let session: Session =
            serde_json::from_str(r#"{"username":null,"messages":[{"user":"bob","ts":1}]}"#)
                .unwrap();
        assert_eq!(session.display_name(), None);
        assert_eq!(session.messages()[0].text, "");

        let session: Session = serde_json::from_str(r#"{"username":"bob"}"#).unwrap();
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_remove_placeholder_only_touches_matching_id() {
        let mut session = Session::new();
        session.append(Message::placeholder(RequestId::new(1), "thinking"));
        session.append(Message::placeholder(RequestId::new(2), "thinking"));

        assert!(session.remove_placeholder(RequestId::new(1)));
        assert!(!session.remove_placeholder(RequestId::new(1)));
        assert_eq!(session.pending_placeholders(), 1);
        assert_eq!(
            session.messages()[0].correlation_id,
            Some(RequestId::new(2))
        );
    }

    #[test]
    fn test_clear_keeps_name() {
        let mut session = Session::new();
        session.set_name(Some("alice".to_string()));
        session.append(Message::compose("alice", "hi", None).unwrap());

        let removed = session.clear();
        assert_eq!(removed.len(), 1);
        assert!(session.messages().is_empty());
        assert_eq!(session.display_name(), Some("alice"));
    }

    #[test]
    fn test_persistable_drops_placeholders() {
        let mut session = Session::new();
        session.append(Message::compose("alice", "hi", None).unwrap());
        session.append(Message::placeholder(RequestId::new(1), "thinking"));

        let saved = session.persistable();
        assert_eq!(saved.messages().len(), 1);
        assert_eq!(saved.messages()[0].text, "hi");
    }
}
