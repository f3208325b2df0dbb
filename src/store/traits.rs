//! Async interface for participant persistence.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sha1::{Digest, Sha1};

use crate::error::StoreError;
use crate::quest::ParticipantRecord;

/// Lazily produced records from [`ParticipantStore::enumerate`].
pub type RecordStream<'a> = BoxStream<'a, Result<ParticipantRecord, StoreError>>;

/// Storage key for an identifier: lowercase hex SHA-1, 40 characters.
///
/// Raw identifiers never appear in storage paths.
pub fn storage_key(identifier: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Keyed storage of participant records.
///
/// Implementations do no locking of their own; callers serialize
/// read-modify-write sequences per identifier.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Insert or fully overwrite the record for `record.identifier`.
    async fn save(&self, record: &ParticipantRecord) -> Result<(), StoreError>;

    /// Load a record. `Ok(None)` means absent; undecodable data is an error.
    async fn load(&self, identifier: &str) -> Result<Option<ParticipantRecord>, StoreError>;

    /// Whether a record is currently stored.
    async fn exists(&self, identifier: &str) -> Result<bool, StoreError>;

    /// Delete a record. Fails with `NotFound` if there is none.
    async fn remove(&self, identifier: &str) -> Result<(), StoreError>;

    /// Every stored record, in no particular order.
    ///
    /// The set of keys is taken when the stream is first polled; records
    /// written afterwards may be missed and records deleted meanwhile are
    /// skipped. Each undecodable record yields one `Err` item and the
    /// stream continues.
    fn enumerate(&self) -> RecordStream<'_>;
}
