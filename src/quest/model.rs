//! The persisted per-participant state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::ChatId;

/// Privilege level of a participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Participant,
    Operator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Participant => write!(f, "participant"),
            Self::Operator => write!(f, "operator"),
        }
    }
}

/// One participant's progress through the quest.
///
/// Stored as JSON with named fields; fields added later must carry a serde
/// default so older records keep decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// The participant's handle. Immutable; the storage key derives from it.
    pub identifier: String,
    /// Private chat for messages addressed to this participant.
    pub channel_id: ChatId,
    /// Reserved, not used by quest logic.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    /// Index into the quest script's stage list.
    pub stage: usize,
    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

impl ParticipantRecord {
    /// A fresh record at stage 0 with participant role.
    pub fn new(identifier: impl Into<String>, channel_id: ChatId) -> Self {
        Self {
            identifier: identifier.into(),
            channel_id,
            display_name: String::new(),
            role: Role::Participant,
            stage: 0,
            joined_at: Utc::now(),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }

    /// Multi-line textual dump used by the operator commands.
    pub fn summary(&self) -> String {
        format!(
            "identifier: @{}\nchannel: {}\nname: {}\nrole: {}\nstage: {}\njoined: {}\n",
            self.identifier,
            self.channel_id,
            self.display_name,
            self.role,
            self.stage,
            self.joined_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_at_stage_zero() {
        let r = ParticipantRecord::new("alice", 555);
        assert_eq!(r.stage, 0);
        assert_eq!(r.role, Role::Participant);
        assert_eq!(r.channel_id, 555);
        assert!(r.display_name.is_empty());
        assert!(!r.is_operator());
    }

    #[test]
    fn role_serde_matches_display() {
        for role in [Role::Participant, Role::Operator] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn decodes_record_without_optional_fields() {
        let json = r#"{"identifier":"bob","channel_id":42,"stage":3}"#;
        let r: ParticipantRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.identifier, "bob");
        assert_eq!(r.stage, 3);
        assert_eq!(r.role, Role::Participant);
        assert!(r.display_name.is_empty());
    }

    #[test]
    fn decodes_regardless_of_field_order_and_ignores_unknown() {
        let json = r#"{"stage":1,"role":"operator","future_field":true,"channel_id":7,"identifier":"op"}"#;
        let r: ParticipantRecord = serde_json::from_str(json).unwrap();
        assert!(r.is_operator());
        assert_eq!(r.channel_id, 7);
    }

    #[test]
    fn summary_lists_fields() {
        let mut r = ParticipantRecord::new("alice", 555);
        r.stage = 4;
        r.role = Role::Operator;
        let s = r.summary();
        assert!(s.contains("identifier: @alice"));
        assert!(s.contains("channel: 555"));
        assert!(s.contains("role: operator"));
        assert!(s.contains("stage: 4"));
    }
}
