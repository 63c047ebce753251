//! Durable per-service progress records.
//!
//! Each sub-indexer owns one key in the metadata namespace and stores a small JSON record under
//! it. An absent key reads as the default record; undecodable bytes are an error and are never
//! silently replaced.

mod errors;
mod metadata;

pub use self::errors::Error;
pub use self::metadata::{Checkpoint, MetadataRecord, BLOCKS_STANDARD_KEY, NOT_STARTED};

use chaindb::MetadataStore;
use slog::{debug, Logger};

/// Reads and writes progress records on top of a `MetadataStore`.
///
/// Writes under one key are expected to come from a single writer. The service does not enforce
/// monotonic progress; a caller that needs to rewind (e.g. after a reorg) simply writes the
/// smaller value.
pub struct CheckpointService<S> {
    store: S,
    log: Logger,
}

impl<S: MetadataStore> CheckpointService<S> {
    pub fn new(store: S, log: Logger) -> Self {
        Self { store, log }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the checkpoint under `key`, or the `latest_slot = -1` default if none was written.
    pub async fn get(&self, key: &str) -> Result<Checkpoint, Error> {
        self.get_record(key).await
    }

    /// Durably replaces the checkpoint under `key`.
    pub async fn set(&self, key: &str, checkpoint: &Checkpoint) -> Result<(), Error> {
        self.set_record(key, checkpoint).await
    }

    /// Replaces the checkpoint under `key` with the default, so the owner starts over.
    pub async fn reset(&self, key: &str) -> Result<(), Error> {
        self.set_record(key, &Checkpoint::default()).await
    }

    pub async fn get_record<T: MetadataRecord>(&self, key: &str) -> Result<T, Error> {
        let bytes = self
            .store
            .metadata(key)
            .await
            .map_err(|cause| Error::StorageReadFailed {
                key: key.to_string(),
                cause,
            })?;

        let Some(bytes) = bytes else {
            debug!(self.log, "No progress record stored"; "key" => key);
            return Ok(T::default());
        };

        let record: T =
            serde_json::from_slice(&bytes).map_err(|cause| Error::CorruptCheckpoint {
                key: key.to_string(),
                cause,
            })?;

        if let Some(reason) = record.invalid_reason() {
            return Err(Error::InvalidCheckpoint {
                key: key.to_string(),
                reason,
            });
        }

        Ok(record)
    }

    pub async fn set_record<T: MetadataRecord>(&self, key: &str, record: &T) -> Result<(), Error> {
        if let Some(reason) = record.invalid_reason() {
            return Err(Error::RejectedCheckpoint {
                key: key.to_string(),
                reason,
            });
        }

        let bytes = serde_json::to_vec(record).map_err(|cause| Error::EncodeFailed {
            key: key.to_string(),
            cause,
        })?;

        self.store
            .set_metadata(key, &bytes)
            .await
            .map_err(|cause| Error::StorageWriteFailed {
                key: key.to_string(),
                cause,
            })?;

        debug!(
            self.log,
            "Stored progress record";
            "key" => key,
            "bytes" => bytes.len(),
        );

        Ok(())
    }
}
