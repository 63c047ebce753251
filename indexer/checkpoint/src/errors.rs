use chaindb::ErrorKind;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The store could not be read. Safe to retry.
    StorageReadFailed {
        key: String,
        cause: chaindb::Error,
    },
    /// The store rejected the write; the previous record is still in place. Safe to retry.
    StorageWriteFailed {
        key: String,
        cause: chaindb::Error,
    },
    /// The stored bytes are not a valid record.
    CorruptCheckpoint {
        key: String,
        cause: serde_json::Error,
    },
    /// The stored record decoded but holds an impossible value.
    InvalidCheckpoint { key: String, reason: String },
    /// The caller tried to store an impossible value. Nothing was written.
    RejectedCheckpoint { key: String, reason: String },
    /// The record could not be serialized. Nothing was written.
    EncodeFailed {
        key: String,
        cause: serde_json::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StorageReadFailed { .. } => ErrorKind::StorageReadFailed,
            Error::StorageWriteFailed { .. } => ErrorKind::StorageWriteFailed,
            Error::CorruptCheckpoint { .. } | Error::InvalidCheckpoint { .. } => {
                ErrorKind::CorruptCheckpoint
            }
            Error::RejectedCheckpoint { .. } | Error::EncodeFailed { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }

    /// The service key the failing operation was addressing.
    pub fn key(&self) -> &str {
        match self {
            Error::StorageReadFailed { key, .. }
            | Error::StorageWriteFailed { key, .. }
            | Error::CorruptCheckpoint { key, .. }
            | Error::InvalidCheckpoint { key, .. }
            | Error::RejectedCheckpoint { key, .. }
            | Error::EncodeFailed { key, .. } => key,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StorageReadFailed { cause, .. } | Error::StorageWriteFailed { cause, .. } => {
                Some(cause)
            }
            Error::CorruptCheckpoint { cause, .. } | Error::EncodeFailed { cause, .. } => {
                Some(cause)
            }
            Error::InvalidCheckpoint { .. } | Error::RejectedCheckpoint { .. } => None,
        }
    }
}
