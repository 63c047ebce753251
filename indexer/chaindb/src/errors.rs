use crate::primitives::{Hash256, Slot};
use crate::tristate::Canonicality;
use std::fmt;

/// The failure taxonomy shared by every indexer component.
///
/// Callers decide between retrying and aborting by kind alone; the error values themselves carry
/// the context (key, endpoint, underlying cause).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StorageReadFailed,
    StorageWriteFailed,
    /// A stored progress record could not be decoded. Never replaced by a default.
    CorruptCheckpoint,
    /// The remote endpoint could not be reached or answered with a non-2xx status.
    Unreachable,
    /// The remote endpoint answered successfully but with a malformed response.
    ProtocolViolation,
    /// The remote endpoint serves a different chain. Fatal.
    ChainMismatch,
    /// A canonical-chain pass tried to flip an already classified block.
    CanonicalityConflict,
    /// The caller supplied input that does not match stored state.
    InvalidInput,
}

impl ErrorKind {
    /// Only transient I/O failures are worth retrying; everything else will fail the same way
    /// again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::StorageReadFailed | ErrorKind::StorageWriteFailed | ErrorKind::Unreachable
        )
    }

    pub fn is_fatal(self) -> bool {
        self == ErrorKind::ChainMismatch
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The backing store failed to serve a read.
    ReadFailed {
        operation: &'static str,
        reason: String,
    },
    /// The backing store failed to apply a write. Nothing was written.
    WriteFailed {
        operation: &'static str,
        reason: String,
    },
    /// No block with `root` is stored at `slot`.
    UnknownBlock { slot: Slot, root: Hash256 },
    /// The block is already classified and the requested classification differs.
    CanonicalityConflict {
        slot: Slot,
        root: Hash256,
        current: Canonicality,
        requested: Canonicality,
    },
    /// An update would leave more than one canonical block at `slot`.
    MultipleCanonical { slot: Slot, roots: Vec<Hash256> },
    /// The values passed to `operation` are inconsistent with each other.
    InvalidInput {
        operation: &'static str,
        reason: String,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ReadFailed { .. } => ErrorKind::StorageReadFailed,
            Error::WriteFailed { .. } => ErrorKind::StorageWriteFailed,
            Error::UnknownBlock { .. } | Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::CanonicalityConflict { .. } | Error::MultipleCanonical { .. } => {
                ErrorKind::CanonicalityConflict
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}
