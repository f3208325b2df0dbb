//! Participant persistence.

pub mod files;
pub mod locks;
pub mod traits;

pub use files::FileStore;
pub use locks::KeyedLocks;
pub use traits::{ParticipantStore, RecordStream, storage_key};
