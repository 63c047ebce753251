use crate::endpoint::EndpointError;
use chaindb::{ErrorKind, Hash256};
use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug)]
pub enum Error {
    /// The HTTP client could not be constructed.
    ClientBuild(reqwest::Error),
    /// The request never produced a response (connection refused, timeout, reset).
    RequestFailed {
        endpoint: String,
        method: &'static str,
        cause: reqwest::Error,
    },
    /// The endpoint answered with a status outside of 2xx. `body` is bounded.
    BadStatus {
        endpoint: String,
        method: &'static str,
        status: u16,
        body: String,
    },
    /// The endpoint answered with a JSON-RPC `error` object.
    ServerMessage {
        endpoint: String,
        method: &'static str,
        code: i64,
        message: String,
    },
    /// The 2xx response carried no usable `result`.
    MissingResult {
        endpoint: String,
        method: &'static str,
    },
    /// The 2xx response could not be decoded.
    InvalidResponse {
        endpoint: String,
        method: &'static str,
        reason: String,
    },
    /// The endpoint serves a different chain than the one configured.
    ChainMismatch {
        endpoint: String,
        expected: u64,
        actual: u64,
    },
    /// A log behind the follow distance was reported as removed by a reorg.
    RemovedLog { block_hash: Hash256, log_index: u64 },
    /// A log outside of the requested block range was returned.
    LogOutOfRange {
        block_number: u64,
        range: RangeInclusive<u64>,
    },
    FailedToParseDepositLog {
        block_hash: Hash256,
        log_index: u64,
        error: String,
    },
    Endpoint(EndpointError),
    InvalidConfig(String),
    Checkpoint(checkpoint::Error),
    Store(chaindb::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RequestFailed { .. } | Error::BadStatus { .. } => ErrorKind::Unreachable,
            Error::ServerMessage { .. }
            | Error::MissingResult { .. }
            | Error::InvalidResponse { .. }
            | Error::RemovedLog { .. }
            | Error::LogOutOfRange { .. }
            | Error::FailedToParseDepositLog { .. } => ErrorKind::ProtocolViolation,
            Error::ChainMismatch { .. } => ErrorKind::ChainMismatch,
            Error::ClientBuild(_) | Error::Endpoint(_) | Error::InvalidConfig(_) => {
                ErrorKind::InvalidInput
            }
            Error::Checkpoint(e) => e.kind(),
            Error::Store(e) => e.kind(),
        }
    }
}

impl From<checkpoint::Error> for Error {
    fn from(e: checkpoint::Error) -> Self {
        Error::Checkpoint(e)
    }
}

impl From<chaindb::Error> for Error {
    fn from(e: chaindb::Error) -> Self {
        Error::Store(e)
    }
}

impl From<EndpointError> for Error {
    fn from(e: EndpointError) -> Self {
        Error::Endpoint(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}
