//! Imports eth2 deposit contract logs from an eth1 JSON-RPC endpoint.
//!
//! The endpoint's chain id is checked against the configured one before any log is read, and a
//! mismatch is never retried. Logs are requested over explicit block ranges behind a follow
//! distance and stored idempotently, keyed by `(block_hash, log_index)`.

mod chain_id;
mod config;
mod deposit_log;
mod endpoint;
mod errors;
pub mod http;
mod service;

pub use self::chain_id::{verify_chain_id, Eth1Id};
pub use self::config::{Config, DEFAULT_CHAIN_ID, DEFAULT_ETH1_ENDPOINT};
pub use self::deposit_log::DepositLog;
pub use self::endpoint::{Endpoint, EndpointError};
pub use self::errors::Error;
pub use self::service::{DepositUpdateOutcome, GetLogsProgress, Service, GETLOGS_KEY};
