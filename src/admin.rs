//! Operator commands and the group relay.
//!
//! Participants type commands into their private chat; the admin types relay
//! requests into the moderated group. Both are matched on exact message text.

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Attachment, ChatId, InboundEvent, Messenger, Outbound};
use crate::error::StoreError;
use crate::quest::ParticipantRecord;
use crate::store::ParticipantStore;

pub const START_COMMAND: &str = "/start";
/// Followed directly by the admin secret.
pub const ADMIN_COMMAND: &str = "/admin ";
pub const DUMP_COMMAND: &str = "/data";
pub const CHECK_COMMAND: &str = "/check";
pub const RESET_COMMAND: &str = "/reset";

pub const RELAY_KEYWORD: &str = "relay";

pub const PROMOTION_REPLY: &str = "Operator mode enabled.";
pub const UNKNOWN_PARTICIPANT: &str = "unknown participant: ";
pub const RELAY_SIGNATURE: &str = "\n\n(signed) Operator";

/// A top-level command typed by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin the quest.
    Start,
    /// Admin command with the correct secret.
    Promote,
    /// Dump the caller's own record.
    Dump,
    /// Send the caller a summary of every participant.
    Check,
    /// Delete the caller's record.
    Reset,
}

impl Command {
    /// Match a message against the command table, in priority order.
    ///
    /// The admin command only matches with the exact secret; anything else
    /// is not a command and goes to the stage engine.
    pub fn parse(text: &str, admin_secret: &SecretString) -> Option<Self> {
        match text {
            START_COMMAND => Some(Self::Start),
            _ if text.strip_prefix(ADMIN_COMMAND) == Some(admin_secret.expose_secret()) => {
                Some(Self::Promote)
            }
            DUMP_COMMAND => Some(Self::Dump),
            CHECK_COMMAND => Some(Self::Check),
            RESET_COMMAND => Some(Self::Reset),
            _ => None,
        }
    }
}

/// `relay <target> <message...>` typed by the admin in the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub target: String,
    pub body: String,
}

impl RelayRequest {
    /// Parse a relay request. Needs the keyword, a target, and at least one
    /// word of body; the body is rejoined with single spaces.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        if words.next()? != RELAY_KEYWORD {
            return None;
        }
        let target = words.next()?.to_string();
        let body = words.collect::<Vec<_>>().join(" ");
        if body.is_empty() {
            return None;
        }
        Some(Self { target, body })
    }
}

/// Resolve a relay request into the message to send.
///
/// Known targets get the body plus the signature in their private chat;
/// unknown targets produce a notice back in the group.
pub async fn relay(
    store: &dyn ParticipantStore,
    request: &RelayRequest,
    group_chat: ChatId,
) -> Result<Outbound, StoreError> {
    match store.load(&request.target).await? {
        Some(target) => Ok(Outbound::text(
            target.channel_id,
            format!("{}{RELAY_SIGNATURE}", request.body),
        )),
        None => Ok(Outbound::text(
            group_chat,
            format!("{UNKNOWN_PARTICIPANT}{}", request.target),
        )),
    }
}

/// The caller's own record, as text.
pub fn dump(record: &ParticipantRecord) -> Outbound {
    Outbound::text(record.channel_id, record.summary())
}

/// Echo the file id of a photo or voice note back to the admin.
///
/// Lets the admin collect file ids for use in quest scripts.
pub fn attachment_echo(event: &InboundEvent, admin_identifier: &str) -> Option<Outbound> {
    if event.sender != admin_identifier {
        return None;
    }
    match &event.attachment {
        Some(a @ (Attachment::Photo(_) | Attachment::Voice(_))) => {
            Some(Outbound::text(event.sender_chat, a.file_id()))
        }
        _ => None,
    }
}

/// Totals from a participant broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub listed: usize,
    pub unreadable: usize,
}

/// Send one summary per stored participant to `operator_chat`.
///
/// Records that fail to load are counted and skipped; if any were skipped,
/// a final line tells the operator how many.
pub async fn broadcast_summaries(
    store: &dyn ParticipantStore,
    messenger: &dyn Messenger,
    operator_chat: ChatId,
) -> CheckReport {
    let mut report = CheckReport::default();
    let mut records = store.enumerate();

    while let Some(item) = records.next().await {
        match item {
            Ok(record) => {
                report.listed += 1;
                if let Err(e) = messenger.send_text(operator_chat, &record.summary()).await {
                    tracing::warn!(chat_id = operator_chat, error = %e, "Summary delivery failed");
                }
            }
            Err(e) => {
                report.unreadable += 1;
                tracing::warn!(error = %e, "Skipping unreadable participant record");
            }
        }
    }

    if report.unreadable > 0 {
        let notice = format!("{} record(s) could not be read", report.unreadable);
        if let Err(e) = messenger.send_text(operator_chat, &notice).await {
            tracing::warn!(chat_id = operator_chat, error = %e, "Summary delivery failed");
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("hunter2".to_string())
    }

    #[test]
    fn parses_fixed_commands() {
        let s = secret();
        assert_eq!(Command::parse("/start", &s), Some(Command::Start));
        assert_eq!(Command::parse("/data", &s), Some(Command::Dump));
        assert_eq!(Command::parse("/check", &s), Some(Command::Check));
        assert_eq!(Command::parse("/reset", &s), Some(Command::Reset));
    }

    #[test]
    fn admin_command_needs_exact_secret() {
        let s = secret();
        assert_eq!(Command::parse("/admin hunter2", &s), Some(Command::Promote));
        assert_eq!(Command::parse("/admin hunter3", &s), None);
        assert_eq!(Command::parse("/admin Hunter2", &s), None);
        assert_eq!(Command::parse("/admin hunter2 ", &s), None);
        assert_eq!(Command::parse("/admin ", &s), None);
        assert_eq!(Command::parse("/adminhunter2", &s), None);
    }

    #[test]
    fn commands_are_exact_matches() {
        let s = secret();
        assert_eq!(Command::parse("/start now", &s), None);
        assert_eq!(Command::parse("/START", &s), None);
        assert_eq!(Command::parse(" /reset", &s), None);
        assert_eq!(Command::parse("hello", &s), None);
    }

    #[test]
    fn relay_request_parses_target_and_body() {
        let req = RelayRequest::parse("relay alice hello there").unwrap();
        assert_eq!(req.target, "alice");
        assert_eq!(req.body, "hello there");
    }

    #[test]
    fn relay_body_is_rejoined_with_single_spaces() {
        let req = RelayRequest::parse("  relay   bob  see\tyou   soon ").unwrap();
        assert_eq!(req.target, "bob");
        assert_eq!(req.body, "see you soon");
    }

    #[test]
    fn relay_needs_keyword_target_and_body() {
        assert!(RelayRequest::parse("relay alice").is_none());
        assert!(RelayRequest::parse("relay").is_none());
        assert!(RelayRequest::parse("").is_none());
        assert!(RelayRequest::parse("Relay alice hi").is_none());
        assert!(RelayRequest::parse("say alice hi").is_none());
    }

    #[test]
    fn echo_only_for_admin_photo_or_voice() {
        let photo = InboundEvent::new("gm", 9).with_attachment(Attachment::Photo("ph".into()));
        assert_eq!(
            attachment_echo(&photo, "gm"),
            Some(Outbound::text(9, "ph"))
        );

        let voice = InboundEvent::new("gm", 9).with_attachment(Attachment::Voice("vo".into()));
        assert_eq!(
            attachment_echo(&voice, "gm"),
            Some(Outbound::text(9, "vo"))
        );

        let video = InboundEvent::new("gm", 9).with_attachment(Attachment::Video("vi".into()));
        assert_eq!(attachment_echo(&video, "gm"), None);

        assert_eq!(attachment_echo(&photo, "someone_else"), None);
    }
}
