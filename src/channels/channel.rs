//! Inbound events, outbound messages, and the traits a transport implements.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// Numeric chat identifier (private chat or group).
pub type ChatId = i64;

/// Media attached to an inbound message, by transport file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Photo(String),
    Voice(String),
    Video(String),
    VideoNote(String),
}

impl Attachment {
    /// The transport reference id of the attached file.
    pub fn file_id(&self) -> &str {
        match self {
            Self::Photo(id) | Self::Voice(id) | Self::Video(id) | Self::VideoNote(id) => id,
        }
    }
}

/// A single inbound message from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Stable sender identifier (the participant's handle).
    pub sender: String,
    /// The sender's private chat, where replies to them go.
    pub sender_chat: ChatId,
    /// The chat the message arrived on.
    pub chat: ChatId,
    /// Message text, if any.
    pub text: Option<String>,
    /// Attached media, if any.
    pub attachment: Option<Attachment>,
}

impl InboundEvent {
    /// An empty event from `sender`, arriving on their private chat.
    pub fn new(sender: impl Into<String>, sender_chat: ChatId) -> Self {
        Self {
            sender: sender.into(),
            sender_chat,
            chat: sender_chat,
            text: None,
            attachment: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Mark the event as having arrived on `chat` instead of the private chat.
    pub fn in_chat(mut self, chat: ChatId) -> Self {
        self.chat = chat;
        self
    }

    /// Message text, with an absent text treated as empty.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Whether the event carries non-empty text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Photo {
        file: String,
        caption: Option<String>,
    },
    Voice {
        file: String,
    },
    Video {
        file: String,
        caption: Option<String>,
    },
    VideoNote {
        file: String,
    },
}

/// One outbound message: a payload addressed to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub chat: ChatId,
    pub payload: Payload,
}

impl Outbound {
    pub fn text(chat: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn photo(chat: ChatId, file: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            chat,
            payload: Payload::Photo {
                file: file.into(),
                caption,
            },
        }
    }

    pub fn voice(chat: ChatId, file: impl Into<String>) -> Self {
        Self {
            chat,
            payload: Payload::Voice { file: file.into() },
        }
    }

    pub fn video(chat: ChatId, file: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            chat,
            payload: Payload::Video {
                file: file.into(),
                caption,
            },
        }
    }

    pub fn video_note(chat: ChatId, file: impl Into<String>) -> Self {
        Self {
            chat,
            payload: Payload::VideoNote { file: file.into() },
        }
    }
}

/// Stream of inbound events produced by a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Outbound side of a transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), ChannelError>;

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    async fn send_voice(&self, chat: ChatId, voice: &str) -> Result<(), ChannelError>;

    async fn send_video(
        &self,
        chat: ChatId,
        video: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    async fn send_video_note(&self, chat: ChatId, video_note: &str) -> Result<(), ChannelError>;

    /// Send one outbound message using the matching primitive.
    async fn deliver(&self, msg: &Outbound) -> Result<(), ChannelError> {
        match &msg.payload {
            Payload::Text(text) => self.send_text(msg.chat, text).await,
            Payload::Photo { file, caption } => {
                self.send_photo(msg.chat, file, caption.as_deref()).await
            }
            Payload::Voice { file } => self.send_voice(msg.chat, file).await,
            Payload::Video { file, caption } => {
                self.send_video(msg.chat, file, caption.as_deref()).await
            }
            Payload::VideoNote { file } => self.send_video_note(msg.chat, file).await,
        }
    }
}

/// Inbound side of a transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start listening and return the stream of inbound events.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Verify the channel is reachable.
    async fn health_check(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_defaults_to_private_chat() {
        let ev = InboundEvent::new("alice", 555).with_text("hi");
        assert_eq!(ev.chat, 555);
        assert_eq!(ev.sender_chat, 555);
        assert!(ev.has_text());
    }

    #[test]
    fn empty_text_is_not_text() {
        let ev = InboundEvent::new("alice", 1).with_text("");
        assert!(!ev.has_text());
        assert_eq!(ev.text_or_empty(), "");

        let ev = InboundEvent::new("alice", 1);
        assert!(!ev.has_text());
    }

    #[test]
    fn in_chat_keeps_sender_chat() {
        let ev = InboundEvent::new("admin", 7).in_chat(-100);
        assert_eq!(ev.chat, -100);
        assert_eq!(ev.sender_chat, 7);
    }

    #[test]
    fn attachment_file_id() {
        assert_eq!(Attachment::Photo("p".into()).file_id(), "p");
        assert_eq!(Attachment::VideoNote("n".into()).file_id(), "n");
    }
}
