//! Turns the message list into something a terminal can show. The
//! whole list is rendered from scratch every time; there is no diffing
//! and no pagination.
use std::collections::HashSet;
use std::fmt::Write;

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::session::{AI_AUTHOR, Media, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageStyle {
    /// Written by the current display name
    Mine,
    Ai,
    Other,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaView {
    Image { alt: String },
    Video { name: String },
    Audio { name: String },
    Download { name: String },
    /// Out of line payload that can no longer be found
    Unavailable { name: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedMessage {
    pub style: MessageStyle,
    pub header: String,
    pub text: String,
    pub media: Option<MediaView>,
    /// Size shown next to the attachment
    pub media_size: Option<u64>,
}

/// Everything besides the messages that affects rendering.
#[derive(Default)]
pub struct RenderContext<'a> {
    pub display_name: Option<&'a str>,
    /// Handles of attachments whose payload is gone
    pub missing_media: HashSet<String>,
    /// Keep only this many of the newest rows when set
    pub viewport_rows: Option<usize>,
    /// Prefix each header with the 1-based position of the message
    pub numbered: bool,
}

pub fn classify(msg: &Message, display_name: Option<&str>) -> MessageStyle {
    if display_name == Some(msg.author.as_str()) {
        MessageStyle::Mine
    } else if msg.author == AI_AUTHOR {
        MessageStyle::Ai
    } else {
        MessageStyle::Other
    }
}

pub fn media_view(media: &Media, missing: &HashSet<String>) -> MediaView {
    if missing.contains(&media.data) {
        return MediaView::Unavailable {
            name: media.name.clone(),
        };
    }
    if media.is_image() {
        MediaView::Image {
            alt: if media.name.is_empty() {
                "image".to_string()
            } else {
                media.name.clone()
            },
        }
    } else if media.is_video() {
        MediaView::Video {
            name: media.name.clone(),
        }
    } else if media.is_audio() {
        MediaView::Audio {
            name: media.name.clone(),
        }
    } else {
        MediaView::Download {
            name: if media.name.is_empty() {
                "download".to_string()
            } else {
                media.name.clone()
            },
        }
    }
}

pub fn format_timestamp(ts: i64) -> String {
    match DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown time".to_string(),
    }
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

#[derive(Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    /// One entry per message, in list order.
    pub fn render(&self, messages: &[Message], ctx: &RenderContext) -> Vec<RenderedMessage> {
        messages
            .iter()
            .map(|m| RenderedMessage {
                style: classify(m, ctx.display_name),
                header: format!("{} • {}", m.author, format_timestamp(m.timestamp)),
                text: m.text.clone(),
                media: m.media.as_ref().map(|media| media_view(media, &ctx.missing_media)),
                media_size: m.media.as_ref().map(|media| media.byte_size),
            })
            .collect()
    }

    fn lines(rendered: &RenderedMessage, position: Option<usize>) -> Vec<String> {
        let header = match position {
            Some(n) => format!("#{} {}", n, rendered.header),
            None => rendered.header.clone(),
        };
        let header = match rendered.style {
            MessageStyle::Mine => header.green().bold(),
            MessageStyle::Ai => header.cyan().bold(),
            MessageStyle::Other => header.yellow().bold(),
        };
        let mut lines = vec![header.to_string()];
        if !rendered.text.is_empty() {
            lines.extend(rendered.text.lines().map(|l| format!("  {}", l)));
        }
        if let Some(media) = &rendered.media {
            let size = rendered.media_size.map(human_size).unwrap_or_default();
            let line = match media {
                MediaView::Image { alt } => format!("  [image: {}, {}]", alt, size),
                MediaView::Video { name } => format!("  [video: {}, {}]", name, size),
                MediaView::Audio { name } => format!("  [audio: {}, {}]", name, size),
                MediaView::Download { name } => {
                    format!("  [file: {}, {}] (use `export` to save it)", name, size)
                }
                MediaView::Unavailable { name } => format!("  [{} is no longer available]", name),
            };
            lines.push(line.dimmed().to_string());
        }
        lines
    }

    /// Terminal text for the whole list. With a viewport only the
    /// newest rows survive, so the latest message is always visible.
    pub fn to_terminal(&self, messages: &[Message], ctx: &RenderContext) -> String {
        let mut rows: Vec<String> = self
            .render(messages, ctx)
            .iter()
            .enumerate()
            .flat_map(|(i, r)| Self::lines(r, ctx.numbered.then_some(i + 1)))
            .collect();
        if let Some(max) = ctx.viewport_rows {
            let skip = rows.len().saturating_sub(max);
            rows.drain(..skip);
        }

        let mut out = String::new();
        for row in rows {
            let _ = writeln!(out, "{}", row);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RequestId;

    fn media(name: &str, mime: &str) -> Media {
        Media {
            name: name.to_string(),
            mime_type: mime.to_string(),
            byte_size: 2048,
            data: format!("data:{};base64,AAAA", mime),
        }
    }

    #[test]
    fn test_classify() {
        let mine = Message::compose("alice", "hi", None).unwrap();
        let ai = Message::ai("hello");
        let other = Message::compose("bob", "yo", None).unwrap();

        assert_eq!(classify(&mine, Some("alice")), MessageStyle::Mine);
        assert_eq!(classify(&ai, Some("alice")), MessageStyle::Ai);
        assert_eq!(classify(&other, Some("alice")), MessageStyle::Other);
        assert_eq!(classify(&mine, None), MessageStyle::Other);
    }

    #[test]
    fn test_media_dispatch_by_mime_prefix() {
        let missing = HashSet::new();
        assert_eq!(
            media_view(&media("cat.png", "image/png"), &missing),
            MediaView::Image {
                alt: "cat.png".to_string()
            }
        );
        assert_eq!(
            media_view(&media("clip.mp4", "video/mp4"), &missing),
            MediaView::Video {
                name: "clip.mp4".to_string()
            }
        );
        assert_eq!(
            media_view(&media("memo.ogg", "audio/ogg"), &missing),
            MediaView::Audio {
                name: "memo.ogg".to_string()
            }
        );
        assert_eq!(
            media_view(&media("", "application/pdf"), &missing),
            MediaView::Download {
                name: "download".to_string()
            }
        );
    }

    #[test]
    fn test_missing_media_is_flagged() {
        let mut m = media("clip.mp4", "video/mp4");
        m.data = "imptech-media:abc".to_string();
        let missing = HashSet::from(["imptech-media:abc".to_string()]);
        assert_eq!(
            media_view(&m, &missing),
            MediaView::Unavailable {
                name: "clip.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_render_preserves_order() {
        let messages: Vec<Message> = (0..5)
            .map(|i| Message::compose("alice", &format!("msg {}", i), None).unwrap())
            .collect();
        let rendered = Renderer::new().render(&messages, &RenderContext::default());
        let texts: Vec<&str> = rendered.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
        assert!(rendered[0].header.starts_with("alice • "));
    }

    #[test]
    fn test_viewport_keeps_newest_rows() {
        colored::control::set_override(false);
        let messages = vec![
            Message::compose("alice", "old", None).unwrap(),
            Message::placeholder(RequestId::new(1), "newest"),
        ];
        let ctx = RenderContext {
            viewport_rows: Some(2),
            ..RenderContext::default()
        };
        let out = Renderer::new().to_terminal(&messages, &ctx);
        assert!(!out.contains("old"));
        assert!(out.contains("AI • "));
        assert!(out.ends_with("  newest\n"));
    }

    #[test]
    fn test_numbered_headers() {
        colored::control::set_override(false);
        let messages = vec![
            Message::compose("alice", "one", None).unwrap(),
            Message::compose("bob", "two", None).unwrap(),
        ];
        let ctx = RenderContext {
            numbered: true,
            ..RenderContext::default()
        };
        let out = Renderer::new().to_terminal(&messages, &ctx);
        assert!(out.starts_with("#1 alice • "));
        assert!(out.contains("#2 bob • "));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(12), "12 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
