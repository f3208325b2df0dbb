//! Telegram channel over the Bot API, using long-polling for updates.
//!
//! Inbound messages become `InboundEvent`s; outbound primitives post JSON
//! bodies that reference media by Telegram file id or URL.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Attachment, Channel, ChatId, EventStream, InboundEvent, Messenger};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram Bot API client.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// POST a JSON body to a Bot API method and check the status.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} returned {status}: {err}"),
            });
        }

        Ok(())
    }
}

// ── Outbound ────────────────────────────────────────────────────────

#[async_trait]
impl Messenger for TelegramChannel {
    /// Send a text message, split into chunks under Telegram's limit.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat,
                    "text": chunk,
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat,
            "photo": photo,
        });
        if let Some(cap) = caption {
            body["caption"] = serde_json::Value::String(cap.to_string());
        }
        self.call("sendPhoto", body).await?;
        tracing::debug!(chat_id = chat, "Telegram photo sent");
        Ok(())
    }

    async fn send_voice(&self, chat: ChatId, voice: &str) -> Result<(), ChannelError> {
        self.call(
            "sendVoice",
            serde_json::json!({
                "chat_id": chat,
                "voice": voice,
            }),
        )
        .await?;
        tracing::debug!(chat_id = chat, "Telegram voice sent");
        Ok(())
    }

    async fn send_video(
        &self,
        chat: ChatId,
        video: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat,
            "video": video,
        });
        if let Some(cap) = caption {
            body["caption"] = serde_json::Value::String(cap.to_string());
        }
        self.call("sendVideo", body).await?;
        tracing::debug!(chat_id = chat, "Telegram video sent");
        Ok(())
    }

    async fn send_video_note(&self, chat: ChatId, video_note: &str) -> Result<(), ChannelError> {
        self.call(
            "sendVideoNote",
            serde_json::json!({
                "chat_id": chat,
                "video_note": video_note,
            }),
        )
        .await?;
        tracing::debug!(chat_id = chat, "Telegram video note sent");
        Ok(())
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    tracing::warn!(
                        description = data.get("description").and_then(serde_json::Value::as_str),
                        "Telegram poll returned no updates"
                    );
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(event) = update.get("message").and_then(parse_message) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|ev| (ev, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Convert a Bot API `Message` object into an inbound event.
///
/// The sender identifier is the username, falling back to the numeric user
/// id for accounts without one. Messages without a sender or chat are dropped.
fn parse_message(message: &serde_json::Value) -> Option<InboundEvent> {
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(serde_json::Value::as_i64)?;
    let sender = from
        .get("username")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| user_id.to_string());

    let chat = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let mut event = InboundEvent::new(sender, user_id).in_chat(chat);

    if let Some(text) = message.get("text").and_then(serde_json::Value::as_str) {
        event = event.with_text(text);
    }

    let file_id = |key: &str| {
        message
            .get(key)
            .and_then(|v| v.get("file_id"))
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    };

    // Photos arrive as an array of sizes, largest last.
    let photo = message
        .get("photo")
        .and_then(serde_json::Value::as_array)
        .and_then(|sizes| sizes.last())
        .and_then(|p| p.get("file_id"))
        .and_then(serde_json::Value::as_str)
        .map(|id| Attachment::Photo(id.to_string()));

    let attachment = photo
        .or_else(|| file_id("voice").map(Attachment::Voice))
        .or_else(|| file_id("video").map(Attachment::Video))
        .or_else(|| file_id("video_note").map(Attachment::VideoNote));

    if let Some(attachment) = attachment {
        event = event.with_attachment(attachment);
    }

    Some(event)
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
