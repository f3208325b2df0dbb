//! The quest itself: participant records, the stage table, and the engine
//! that moves participants through it.
//!
//! Each participant walks the script's stages in order. A stage accepts one
//! kind of answer; anything else gets the stage's retry text. Accepted
//! answers may be relayed to the moderated group, tagged with the
//! participant and the stage number.

pub mod engine;
pub mod model;
pub mod script;

pub use engine::{Decision, StageEngine};
pub use model::{ParticipantRecord, Role};
pub use script::{Expectation, Prompt, PromptMedia, QuestScript, Stage};
