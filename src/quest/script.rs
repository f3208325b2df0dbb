//! Quest script: the declarative stage table.
//!
//! A script is an ordered list of stages. Each stage declares the prompt that
//! introduces it, what kind of answer it accepts, and what to say on accept
//! or reject. The last stage is terminal: it only repeats its prompt.
//!
//! Scripts can be loaded from TOML:
//!
//! ```toml
//! welcome = "Welcome to the quest!"
//!
//! [[stages]]
//! retry = "That doesn't look like a photo. Waiting for a photo..."
//! confirmation = "Accepted!"
//! relay = true
//! prompt = { text = "Task 1: send a photo of your team." }
//! expects = { kind = "photo" }
//!
//! [[stages]]
//! prompt = { text = "That's all, thanks for playing!" }
//! expects = { kind = "nothing" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Media attached to a stage prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptMedia {
    /// A photo sent with the prompt text as its caption.
    Photo { file: String },
    /// A voice note sent after the prompt text. Without a file, the
    /// deployment's configured audio asset is used.
    Voice {
        #[serde(default)]
        file: Option<String>,
    },
}

/// The message that introduces a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<PromptMedia>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }

    pub fn with_media(mut self, media: PromptMedia) -> Self {
        self.media = Some(media);
        self
    }
}

/// What a stage accepts as an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    Photo,
    /// Any non-empty text.
    Text,
    /// Text equal to one of the answers, ignoring case.
    Keyword { answers: Vec<String> },
    /// A video or a video note.
    Video,
    /// Terminal stage, nothing is accepted.
    Nothing,
}

/// One entry of the stage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub prompt: Prompt,
    pub expects: Expectation,
    /// Acknowledgement sent to the participant when the answer is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    /// Forward accepted submissions to the moderated group.
    #[serde(default)]
    pub relay: bool,
    /// Sent when the answer is rejected.
    #[serde(default)]
    pub retry: String,
}

impl Stage {
    pub fn new(prompt: Prompt, expects: Expectation, retry: impl Into<String>) -> Self {
        Self {
            prompt,
            expects,
            confirmation: None,
            relay: false,
            retry: retry.into(),
        }
    }

    /// A terminal stage that only repeats its prompt.
    pub fn terminal(prompt: Prompt) -> Self {
        Self::new(prompt, Expectation::Nothing, "")
    }

    pub fn confirm(mut self, text: impl Into<String>) -> Self {
        self.confirmation = Some(text.into());
        self
    }

    pub fn relayed(mut self) -> Self {
        self.relay = true;
        self
    }
}

/// The full quest: welcome text plus the ordered stage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestScript {
    pub welcome: String,
    pub stages: Vec<Stage>,
}

impl QuestScript {
    /// Parse and validate a TOML script.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let script: Self =
            toml::from_str(source).map_err(|e| ConfigError::Script(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    /// Read, parse, and validate a TOML script file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Index of the terminal stage.
    pub fn final_stage(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Check the structural rules every script must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::Script("script has no stages".into()));
        }

        let last = self.final_stage();
        for (i, stage) in self.stages.iter().enumerate() {
            // A photo prompt may go captionless; any other prompt is sent as text.
            match &stage.prompt.media {
                Some(PromptMedia::Photo { file }) if file.trim().is_empty() => {
                    return Err(ConfigError::Script(format!(
                        "stage {i}: prompt photo has no file"
                    )));
                }
                Some(PromptMedia::Photo { .. }) => {}
                _ if stage.prompt.text.trim().is_empty() => {
                    return Err(ConfigError::Script(format!("stage {i}: prompt text is empty")));
                }
                _ => {}
            }
            if stage
                .confirmation
                .as_deref()
                .is_some_and(|c| c.trim().is_empty())
            {
                return Err(ConfigError::Script(format!(
                    "stage {i}: confirmation text is empty"
                )));
            }

            if i == last {
                continue;
            }
            match &stage.expects {
                Expectation::Nothing => {
                    return Err(ConfigError::Script(format!(
                        "stage {i}: only the last stage may expect nothing"
                    )));
                }
                Expectation::Keyword { answers }
                    if answers.iter().all(|a| a.trim().is_empty()) =>
                {
                    return Err(ConfigError::Script(format!(
                        "stage {i}: keyword stage needs at least one answer"
                    )));
                }
                _ => {}
            }
            if stage.retry.trim().is_empty() {
                return Err(ConfigError::Script(format!("stage {i}: retry text is empty")));
            }
        }
        Ok(())
    }
}

impl Default for QuestScript {
    /// The built-in eight-stage quest.
    fn default() -> Self {
        Self {
            welcome: "Welcome to the quest! Eight stages stand between you and the finish. \
                      Answer each task right here in this chat."
                .into(),
            stages: vec![
                Stage::new(
                    Prompt::text("Task 1: take a photo of yourself at the starting point and send it here."),
                    Expectation::Photo,
                    "Hmm, that doesn't look like a photo!\nWaiting for a photo...",
                )
                .confirm("Accepted! Rooting for you!")
                .relayed(),
                Stage::new(
                    Prompt::text("Task 2: tell us the story of how you got here. One message, any length."),
                    Expectation::Text,
                    "Hmm, that doesn't look like a story!\nWaiting for a text message...",
                )
                .confirm("Accepted! Keep it up!")
                .relayed(),
                Stage::new(
                    Prompt::text("Task 3: solve the riddle. What foams, is poured at every party, and ends with an exclamation?"),
                    Expectation::Keyword {
                        answers: vec!["beer!".into()],
                    },
                    "Hmm, that doesn't look like the answer!\nWaiting for a text message...",
                ),
                Stage::new(
                    Prompt::text("Task 4: listen to the recording. Who is the spy?")
                        .with_media(PromptMedia::Voice { file: None }),
                    Expectation::Keyword {
                        answers: vec!["katya".into()],
                    },
                    "Hmm, that doesn't look like the answer!\nWaiting for the name of the spy...",
                ),
                Stage::new(
                    Prompt::text("Task 5: the spy left a note. Which city does it point to?"),
                    Expectation::Keyword {
                        answers: vec!["lisbon".into(), "lisboa".into()],
                    },
                    "Hmm, that doesn't look like the answer!\nWaiting for the name of a city...",
                ),
                Stage::new(
                    Prompt::text("Task 6: what is the password written under the lighthouse?"),
                    Expectation::Keyword {
                        answers: vec!["lighthouse keeper".into()],
                    },
                    "Hmm, that doesn't look like the password!\nWaiting for a text message...",
                ),
                Stage::new(
                    Prompt::text("Task 7: record a short video greeting for the organizers."),
                    Expectation::Video,
                    "Hmm, that doesn't look like a video!\nWaiting for a video or a video note...",
                )
                .confirm("Accepted! What a performance!")
                .relayed(),
                Stage::terminal(Prompt::text(
                    "That's all! You have completed every task. Thank you for playing!",
                )),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_is_valid() {
        let script = QuestScript::default();
        script.validate().unwrap();
        assert_eq!(script.stages.len(), 8);
        assert_eq!(script.final_stage(), 7);
        assert_eq!(script.stages[7].expects, Expectation::Nothing);
    }

    #[test]
    fn parses_toml_script() {
        let source = r#"
welcome = "Hello"

[[stages]]
retry = "Photo please"
confirmation = "Got it"
relay = true
prompt = { text = "Send a photo" }
expects = { kind = "photo" }

[[stages]]
retry = "Wrong"
prompt = { text = "Solve the rebus", media = { kind = "photo", file = "https://example.com/rebus.png" } }
expects = { kind = "keyword", answers = ["Beer!"] }

[[stages]]
retry = "Listen again"
prompt = { text = "Listen", media = { kind = "voice" } }
expects = { kind = "text" }

[[stages]]
prompt = { text = "Done" }
expects = { kind = "nothing" }
"#;
        let script = QuestScript::from_toml(source).unwrap();
        assert_eq!(script.welcome, "Hello");
        assert_eq!(script.stages.len(), 4);
        assert!(script.stages[0].relay);
        assert_eq!(script.stages[0].confirmation.as_deref(), Some("Got it"));
        assert_eq!(
            script.stages[1].prompt.media,
            Some(PromptMedia::Photo {
                file: "https://example.com/rebus.png".into()
            })
        );
        assert_eq!(
            script.stages[1].expects,
            Expectation::Keyword {
                answers: vec!["Beer!".into()]
            }
        );
        assert_eq!(
            script.stages[2].prompt.media,
            Some(PromptMedia::Voice { file: None })
        );
        assert!(!script.stages[2].relay);
    }

    #[test]
    fn rejects_empty_script() {
        let err = QuestScript::from_toml("welcome = \"hi\"\nstages = []").unwrap_err();
        assert!(matches!(err, ConfigError::Script(_)));
    }

    #[test]
    fn rejects_nothing_before_last_stage() {
        let script = QuestScript {
            welcome: String::new(),
            stages: vec![
                Stage::terminal(Prompt::text("a")),
                Stage::terminal(Prompt::text("b")),
            ],
        };
        assert!(script.validate().is_err());
    }

    #[test]
    fn rejects_keyword_without_answers() {
        let script = QuestScript {
            welcome: String::new(),
            stages: vec![
                Stage::new(
                    Prompt::text("a"),
                    Expectation::Keyword { answers: vec![] },
                    "retry",
                ),
                Stage::terminal(Prompt::text("b")),
            ],
        };
        assert!(script.validate().is_err());
    }

    #[test]
    fn rejects_missing_retry_text() {
        let script = QuestScript {
            welcome: String::new(),
            stages: vec![
                Stage::new(Prompt::text("a"), Expectation::Text, "  "),
                Stage::terminal(Prompt::text("b")),
            ],
        };
        assert!(script.validate().is_err());
    }

    #[test]
    fn rejects_empty_prompt_text() {
        let source = r#"
welcome = "Hello"

[[stages]]
retry = "Again"
prompt = { text = "" }
expects = { kind = "text" }

[[stages]]
prompt = { text = "Done" }
expects = { kind = "nothing" }
"#;
        let err = QuestScript::from_toml(source).unwrap_err();
        assert!(matches!(err, ConfigError::Script(ref m) if m.contains("prompt text")));

        let script = QuestScript {
            welcome: String::new(),
            stages: vec![
                Stage::new(Prompt::text("a"), Expectation::Text, "retry"),
                Stage::terminal(Prompt::text(" ")),
            ],
        };
        assert!(script.validate().is_err());

        let voice = QuestScript {
            welcome: String::new(),
            stages: vec![Stage::terminal(
                Prompt::text("").with_media(PromptMedia::Voice { file: None }),
            )],
        };
        assert!(voice.validate().is_err());
    }

    #[test]
    fn photo_prompt_may_omit_caption_but_not_file() {
        let captionless = QuestScript {
            welcome: String::new(),
            stages: vec![Stage::terminal(Prompt::text("").with_media(
                PromptMedia::Photo {
                    file: "rebus.png".into(),
                },
            ))],
        };
        captionless.validate().unwrap();

        let fileless = QuestScript {
            welcome: String::new(),
            stages: vec![Stage::terminal(
                Prompt::text("rebus").with_media(PromptMedia::Photo { file: "".into() }),
            )],
        };
        assert!(fileless.validate().is_err());
    }

    #[test]
    fn rejects_empty_confirmation() {
        let script = QuestScript {
            welcome: String::new(),
            stages: vec![
                Stage::new(Prompt::text("a"), Expectation::Text, "retry").confirm(""),
                Stage::terminal(Prompt::text("b")),
            ],
        };
        let err = script.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Script(ref m) if m.contains("confirmation")));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(QuestScript::from_toml("stages = 3").is_err());
    }

    #[test]
    fn example_script_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("quest.example.toml");
        let script = QuestScript::load(&path).unwrap();
        assert_eq!(script.stages.len(), 5);
        assert_eq!(
            script.stages[2].prompt.media,
            Some(PromptMedia::Voice { file: None })
        );
        assert_eq!(script.stages[4].expects, Expectation::Nothing);
    }
}
