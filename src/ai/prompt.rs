//! Fixed texts the assistant side of the chat uses.

use crate::session::Message;

/// Posted instead of calling the API when no key is configured.
pub const DISABLED_ADVISORY: &str =
    "AI is disabled - set your OpenAI key with `imptech key set` (or /key in chat).";

/// Shown while a request is in flight.
pub const THINKING: &str = "AI is thinking...";

/// Used when the API answers without any completion text.
pub const NO_RESPONSE_FALLBACK: &str = "Sorry, I couldn't generate a response.";

/// Stands in for the text of a message that is only an attachment.
pub const DESCRIBE_MEDIA: &str = "Describe this media";

pub fn error_reply(description: &str) -> String {
    format!("AI error: {}", description)
}

/// How a chat message is presented to the model. Assistant messages
/// go as is, everything else is prefixed with its author.
pub fn context_line(msg: &Message) -> String {
    if msg.is_ai() {
        return msg.text.clone();
    }
    let text = if msg.text.trim().is_empty() && msg.media.is_some() {
        DESCRIBE_MEDIA
    } else {
        msg.text.as_str()
    };
    let mut line = format!("{}: {}", msg.author, text);
    if let Some(media) = &msg.media {
        line.push_str(&format!(" [attachment: {} ({})]", media.name, media.mime_type));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Media;

    #[test]
    fn test_context_line() {
        let msg = Message::compose("alice", "hello", None).unwrap();
        assert_eq!(context_line(&msg), "alice: hello");

        let msg = Message::ai("hi alice");
        assert_eq!(context_line(&msg), "hi alice");

        let media = Media {
            name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            byte_size: 1,
            data: String::new(),
        };
        let msg = Message::compose("alice", "look", Some(media)).unwrap();
        assert_eq!(context_line(&msg), "alice: look [attachment: cat.png (image/png)]");

        let msg = Message::compose("alice", "", msg.media.clone()).unwrap();
        assert_eq!(
            context_line(&msg),
            "alice: Describe this media [attachment: cat.png (image/png)]"
        );
    }

    #[test]
    fn test_error_reply() {
        assert_eq!(error_reply("boom"), "AI error: boom");
    }
}
