//! File-backed participant store.
//!
//! One JSON file per participant, named `<sha1-hex>.json`, in a flat
//! directory. Writes go to a `.tmp` sibling and are renamed into place, so a
//! reader never sees a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::fs;

use crate::error::StoreError;
use crate::quest::ParticipantRecord;

use super::traits::{ParticipantStore, RecordStream, storage_key};

/// Extension of record files.
pub const RECORD_EXTENSION: &str = "json";

/// Participant store rooted at a directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the storage directory if it does not exist.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    /// Keys of all record files present right now, sorted.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source| StoreError::Io {
            key: self.base_path.display().to_string(),
            source,
        };

        let mut keys = Vec::new();
        let mut read_dir = fs::read_dir(&self.base_path).await.map_err(io_err)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(io_err)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(key) = name
                .strip_suffix(RECORD_EXTENSION)
                .and_then(|stem| stem.strip_suffix('.'))
            {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Load by storage key. Absent files are `Ok(None)`.
    async fn load_key(&self, key: String) -> Result<Option<ParticipantRecord>, StoreError> {
        let bytes = match fs::read(self.record_path(&key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { key, source }),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode { key, source })
    }
}

#[async_trait]
impl ParticipantStore for FileStore {
    async fn save(&self, record: &ParticipantRecord) -> Result<(), StoreError> {
        let key = storage_key(&record.identifier);
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;

        let path = self.record_path(&key);
        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));

        if let Err(source) = fs::write(&tmp, &bytes).await {
            return Err(StoreError::Io { key, source });
        }
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::Io { key, source });
        }

        tracing::debug!(key = %key, stage = record.stage, "Participant record saved");
        Ok(())
    }

    async fn load(&self, identifier: &str) -> Result<Option<ParticipantRecord>, StoreError> {
        self.load_key(storage_key(identifier)).await
    }

    async fn exists(&self, identifier: &str) -> Result<bool, StoreError> {
        let key = storage_key(identifier);
        fs::try_exists(self.record_path(&key))
            .await
            .map_err(|source| StoreError::Io { key, source })
    }

    async fn remove(&self, identifier: &str) -> Result<(), StoreError> {
        let key = storage_key(identifier);
        match fs::remove_file(self.record_path(&key)).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Participant record removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound { key }),
            Err(source) => Err(StoreError::Io { key, source }),
        }
    }

    fn enumerate(&self) -> RecordStream<'_> {
        stream::once(self.list_keys())
            .map(move |listing| match listing {
                Ok(keys) => stream::iter(keys)
                    .then(move |key| self.load_key(key))
                    .filter_map(|loaded| async move { loaded.transpose() })
                    .boxed(),
                Err(e) => stream::iter([Err(e)]).boxed(),
            })
            .flatten()
            .boxed()
    }
}
