//! Stage engine: decides what an inbound event does to a participant.
//!
//! The engine is a pure function over the quest script: given a record and an
//! event it returns the next record and the messages to send. It never
//! touches storage or the network.

use crate::channels::{Attachment, ChatId, InboundEvent, Outbound};
use crate::error::ConfigError;

use super::model::ParticipantRecord;
use super::script::{Expectation, PromptMedia, QuestScript};

/// Outcome of running one event through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The record after the event.
    pub record: ParticipantRecord,
    /// Messages to send, in order.
    pub effects: Vec<Outbound>,
    /// Whether the participant moved to the next stage.
    pub advanced: bool,
}

/// Drives participants through a validated quest script.
#[derive(Debug, Clone)]
pub struct StageEngine {
    script: QuestScript,
    group_chat: ChatId,
    audio_asset: Option<String>,
}

impl StageEngine {
    /// Build an engine. Fails if the script does not validate.
    pub fn new(
        script: QuestScript,
        group_chat: ChatId,
        audio_asset: Option<String>,
    ) -> Result<Self, ConfigError> {
        script.validate()?;
        Ok(Self {
            script,
            group_chat,
            audio_asset,
        })
    }

    pub fn script(&self) -> &QuestScript {
        &self.script
    }

    /// Welcome sequence for a participant who just started.
    pub fn opening(&self, record: &ParticipantRecord) -> Vec<Outbound> {
        let welcome = format!("{}\n\nHi, @{}!", self.script.welcome, record.identifier);
        let mut effects = vec![Outbound::text(record.channel_id, welcome)];
        effects.extend(self.prompt(0, record.channel_id));
        effects
    }

    /// Messages that introduce stage `index` to `chat`.
    pub fn prompt(&self, index: usize, chat: ChatId) -> Vec<Outbound> {
        let Some(stage) = self.script.stage(index) else {
            return Vec::new();
        };
        let text = stage.prompt.text.clone();

        match &stage.prompt.media {
            None => vec![Outbound::text(chat, text)],
            Some(PromptMedia::Photo { file }) => {
                let caption = Some(text).filter(|t| !t.is_empty());
                vec![Outbound::photo(chat, file, caption)]
            }
            Some(PromptMedia::Voice { file }) => {
                let mut effects = vec![Outbound::text(chat, text)];
                match file.as_ref().or(self.audio_asset.as_ref()) {
                    Some(audio) => effects.push(Outbound::voice(chat, audio)),
                    None => tracing::warn!(
                        stage = index,
                        "Voice prompt has no file and no audio asset is configured"
                    ),
                }
                effects
            }
        }
    }

    /// Run one event through the participant's current stage.
    pub fn step(&self, record: &ParticipantRecord, event: &InboundEvent) -> Decision {
        let final_stage = self.script.final_stage();
        let index = record.stage.min(final_stage);
        let chat = record.channel_id;

        let Some(stage) = self.script.stage(index) else {
            return Decision {
                record: record.clone(),
                effects: Vec::new(),
                advanced: false,
            };
        };

        if index == final_stage {
            return Decision {
                record: record.clone(),
                effects: self.prompt(index, chat),
                advanced: false,
            };
        }

        if !accepts(&stage.expects, event) {
            return Decision {
                record: record.clone(),
                effects: vec![Outbound::text(chat, stage.retry.clone())],
                advanced: false,
            };
        }

        let mut effects = Vec::new();
        if let Some(confirmation) = &stage.confirmation {
            effects.push(Outbound::text(chat, confirmation.clone()));
        }
        if stage.relay {
            let tag = submission_tag(&record.identifier, index + 1);
            effects.extend(relay_submission(self.group_chat, event, &tag));
        }
        effects.extend(self.prompt(index + 1, chat));

        let mut next = record.clone();
        next.stage = index + 1;

        Decision {
            record: next,
            effects,
            advanced: true,
        }
    }
}

/// Whether `event` satisfies the stage expectation.
pub fn accepts(expects: &Expectation, event: &InboundEvent) -> bool {
    match expects {
        Expectation::Photo => matches!(event.attachment, Some(Attachment::Photo(_))),
        Expectation::Text => event.has_text(),
        Expectation::Keyword { answers } => {
            let text = event.text_or_empty().to_lowercase();
            event.has_text() && answers.iter().any(|a| a.to_lowercase() == text)
        }
        Expectation::Video => matches!(
            event.attachment,
            Some(Attachment::Video(_) | Attachment::VideoNote(_))
        ),
        Expectation::Nothing => false,
    }
}

/// Group-channel tag identifying who completed which stage (1-based).
pub fn submission_tag(identifier: &str, stage_number: usize) -> String {
    format!("#{identifier} (#{identifier})\n#Stage{stage_number}")
}

/// Forward an accepted submission to the group, tagged.
fn relay_submission(group: ChatId, event: &InboundEvent, tag: &str) -> Vec<Outbound> {
    match &event.attachment {
        Some(Attachment::Photo(file)) => vec![Outbound::photo(group, file, Some(tag.to_string()))],
        Some(Attachment::Video(file)) => vec![Outbound::video(group, file, Some(tag.to_string()))],
        // Video notes and voice notes cannot carry captions.
        Some(Attachment::VideoNote(file)) => vec![
            Outbound::video_note(group, file),
            Outbound::text(group, tag),
        ],
        Some(Attachment::Voice(file)) => {
            vec![Outbound::voice(group, file), Outbound::text(group, tag)]
        }
        None => vec![Outbound::text(
            group,
            format!("{tag}\n\n{}", event.text_or_empty()),
        )],
    }
}
