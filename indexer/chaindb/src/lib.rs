//! Reorg-aware data model and storage interface for the chain indexer.
//!
//! Data that is provisional until finality carries explicit three-valued flags, and everything
//! included in a block derives its canonical status from that block.

pub mod correctness;
mod errors;
mod memory_store;
mod primitives;
pub mod reconcile;
mod store;
mod tristate;
pub mod types;

pub use self::errors::{Error, ErrorKind};
pub use self::memory_store::MemoryChainDb;
pub use self::primitives::{
    Address, CommitteeIndex, Epoch, Gwei, Hash256, PublicKeyBytes, SignatureBytes, Slot,
    ValidatorIndex, PUBLIC_KEY_BYTES_LEN, SIGNATURE_BYTES_LEN,
};
pub use self::store::{
    BlocksStore, Eth1DepositsStore, InclusionStore, MetadataStore, SummariesStore,
};
pub use self::tristate::{Canonicality, Tristate};
