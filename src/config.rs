//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::channels::ChatId;
use crate::error::ConfigError;

/// Process-wide settings, read once at startup.
#[derive(Debug)]
pub struct QuestConfig {
    /// Directory holding participant records.
    pub storage_path: PathBuf,
    /// Bot API token.
    pub telegram_token: SecretString,
    /// Phrase that promotes a participant to operator.
    pub admin_secret: SecretString,
    /// The moderated group chat.
    pub group_chat: ChatId,
    /// Identifier of the admin account.
    pub admin_identifier: String,
    /// Audio asset for voice prompts that name no file.
    pub audio_asset: Option<String>,
    /// Optional TOML quest script replacing the built-in one.
    pub script_path: Option<PathBuf>,
}

impl QuestConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let storage_path = PathBuf::from(required("STORAGE_PATH")?);
        let telegram_token = SecretString::from(required("TELEGRAM_TOKEN")?);
        let admin_secret = SecretString::from(required("ADMIN_PASS")?);

        let group_link = required("GROUP_LINK")?;
        let group_chat: ChatId =
            group_link
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: "GROUP_LINK".into(),
                    message: format!("expected a numeric chat id, got {group_link:?}: {e}"),
                })?;

        let admin_identifier = required("ADMIN_USERNAME")?;

        let audio_asset = lookup("AUDIO_LINK").filter(|v| !v.trim().is_empty());
        let script_path = lookup("QUEST_SCRIPT")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            storage_path,
            telegram_token,
            admin_secret,
            group_chat,
            admin_identifier,
            audio_asset,
            script_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("STORAGE_PATH", "/var/lib/quest"),
        ("TELEGRAM_TOKEN", "123:ABC"),
        ("ADMIN_PASS", "open sesame"),
        ("GROUP_LINK", "-100123456"),
        ("ADMIN_USERNAME", "gamemaster"),
    ];

    #[test]
    fn reads_required_settings() {
        let config = QuestConfig::from_lookup(env(FULL)).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/quest"));
        assert_eq!(config.telegram_token.expose_secret(), "123:ABC");
        assert_eq!(config.admin_secret.expose_secret(), "open sesame");
        assert_eq!(config.group_chat, -100123456);
        assert_eq!(config.admin_identifier, "gamemaster");
        assert!(config.audio_asset.is_none());
        assert!(config.script_path.is_none());
    }

    #[test]
    fn reads_optional_settings() {
        let mut pairs = FULL.to_vec();
        pairs.push(("AUDIO_LINK", "voice-file-id"));
        pairs.push(("QUEST_SCRIPT", "quest.toml"));
        let config = QuestConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.audio_asset.as_deref(), Some("voice-file-id"));
        assert_eq!(config.script_path, Some(PathBuf::from("quest.toml")));
    }

    #[test]
    fn missing_required_setting_is_reported_by_name() {
        for (missing, _) in FULL {
            let pairs: Vec<_> = FULL.iter().filter(|(k, _)| k != missing).copied().collect();
            match QuestConfig::from_lookup(env(&pairs)) {
                Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, *missing),
                other => panic!("expected MissingEnvVar({missing}), got {other:?}"),
            }
        }
    }

    #[test]
    fn non_numeric_group_is_invalid() {
        let pairs: Vec<_> = FULL
            .iter()
            .map(|&(k, v)| if k == "GROUP_LINK" { (k, "t.me/quest") } else { (k, v) })
            .collect();
        let err = QuestConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "GROUP_LINK"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = QuestConfig::from_lookup(env(FULL)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("open sesame"));
        assert!(!debug.contains("123:ABC"));
    }
}
