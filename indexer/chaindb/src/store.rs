//! The storage collaborator, expressed as one trait per concern.
//!
//! Every method is a suspension point. Dropping the returned future abandons the call; the
//! implementations never retry on their own.

use crate::errors::Error;
use crate::primitives::{Epoch, Hash256, Slot};
use crate::tristate::{Canonicality, Tristate};
use crate::types::{
    Attestation, AttesterSlashing, Block, BlockSummary, Deposit, Eth1Deposit, EpochSummary,
    Inclusion, ProposerSlashing, SyncAggregate, ValidatorEpochSummary, VoluntaryExit,
};
use async_trait::async_trait;
use std::ops::{Range, RangeInclusive};

/// A flat string namespace of opaque values, used for per-service progress records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns `None` if nothing was ever written under `key`.
    async fn metadata(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Replaces the value under `key`. Either the whole value is written or the prior value
    /// remains readable.
    async fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), Error>;
}

#[async_trait]
pub trait BlocksStore: Send + Sync {
    /// Inserts or updates the block keyed by `(slot, root)`.
    ///
    /// An already classified `canonical` value is kept; only an explicit
    /// `reset_canonicality` may reopen it.
    async fn set_block(&self, block: &Block) -> Result<(), Error>;

    async fn block_by_root(&self, root: Hash256) -> Result<Option<Block>, Error>;

    async fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<Block>, Error>;

    /// Applies every `(root, canonicality)` pair at `slot` or none of them.
    ///
    /// Fails if a root is not stored at `slot`, if a classified block would change, or if the
    /// result would hold more than one canonical block at `slot`.
    async fn apply_canonicality(
        &self,
        slot: Slot,
        updates: &[(Hash256, Canonicality)],
    ) -> Result<(), Error>;

    /// Returns every block in `slots` to `Unknown`. Reserved for a full resync.
    ///
    /// Returns the number of blocks that were reset.
    async fn reset_canonicality(&self, slots: Range<Slot>) -> Result<usize, Error>;
}

#[async_trait]
pub trait InclusionStore: Send + Sync {
    async fn set_attestation(&self, attestation: &Attestation) -> Result<(), Error>;

    async fn set_sync_aggregate(&self, sync_aggregate: &SyncAggregate) -> Result<(), Error>;

    async fn set_deposit(&self, deposit: &Deposit) -> Result<(), Error>;

    async fn set_voluntary_exit(&self, exit: &VoluntaryExit) -> Result<(), Error>;

    async fn set_attester_slashing(&self, slashing: &AttesterSlashing) -> Result<(), Error>;

    async fn set_proposer_slashing(&self, slashing: &ProposerSlashing) -> Result<(), Error>;

    async fn attestations_for_block(&self, root: Hash256) -> Result<Vec<Attestation>, Error>;

    async fn sync_aggregate_for_block(&self, root: Hash256)
        -> Result<Option<SyncAggregate>, Error>;

    async fn deposits_for_block(&self, root: Hash256) -> Result<Vec<Deposit>, Error>;

    async fn voluntary_exits_for_block(&self, root: Hash256) -> Result<Vec<VoluntaryExit>, Error>;

    async fn attester_slashings_for_block(
        &self,
        root: Hash256,
    ) -> Result<Vec<AttesterSlashing>, Error>;

    async fn proposer_slashings_for_block(
        &self,
        root: Hash256,
    ) -> Result<Vec<ProposerSlashing>, Error>;

    /// Records the correctness flags of the attestation at `inclusion`.
    ///
    /// A flag passed as `Unknown` leaves the stored value untouched.
    async fn set_attestation_correctness(
        &self,
        inclusion: &Inclusion,
        target_correct: Tristate,
        head_correct: Tristate,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait Eth1DepositsStore: Send + Sync {
    /// Inserts `deposit` unless one with the same `(eth1_block_hash, eth1_log_index)` exists.
    ///
    /// Returns `true` if the deposit was newly inserted.
    async fn set_eth1_deposit(&self, deposit: &Eth1Deposit) -> Result<bool, Error>;

    async fn eth1_deposits(
        &self,
        block_numbers: RangeInclusive<u64>,
    ) -> Result<Vec<Eth1Deposit>, Error>;
}

/// Summaries are replaced as a whole for their key.
#[async_trait]
pub trait SummariesStore: Send + Sync {
    async fn set_validator_epoch_summaries(
        &self,
        epoch: Epoch,
        summaries: Vec<ValidatorEpochSummary>,
    ) -> Result<(), Error>;

    async fn validator_epoch_summaries(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<ValidatorEpochSummary>, Error>;

    async fn set_block_summary(&self, summary: BlockSummary) -> Result<(), Error>;

    async fn block_summary(&self, slot: Slot) -> Result<Option<BlockSummary>, Error>;

    async fn set_epoch_summary(&self, summary: EpochSummary) -> Result<(), Error>;

    async fn epoch_summary(&self, epoch: Epoch) -> Result<Option<EpochSummary>, Error>;
}
