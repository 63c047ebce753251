//! Entities written by the indexer.
//!
//! Blocks carry their own `Canonicality`. Everything included in a block (attestations,
//! deposits, exits, slashings, sync aggregates) is an *inclusion record*: it names its including
//! block and deliberately stores no canonical flag of its own, so it can never disagree with
//! that block. See `reconcile::inclusion_canonicality`.

use crate::primitives::{
    Address, CommitteeIndex, Epoch, Gwei, Hash256, PublicKeyBytes, SignatureBytes, Slot,
    ValidatorIndex,
};
use crate::tristate::{Canonicality, Tristate};
use serde::{Deserialize, Serialize};

/// A beacon block as seen by the indexer, keyed by `(slot, root)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub root: Hash256,
    pub graffiti: Vec<u8>,
    pub randao_reveal: SignatureBytes,
    pub body_root: Hash256,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub canonical: Canonicality,
    pub eth1_block_hash: Vec<u8>,
    pub eth1_deposit_count: u64,
    pub eth1_deposit_root: Hash256,
}

/// Where an object was seen: the block that included it and its position within that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Inclusion {
    pub slot: Slot,
    pub block_root: Hash256,
    pub index: u64,
}

/// Implemented by every record that lives inside a block.
pub trait InclusionRecord {
    fn inclusion_slot(&self) -> Slot;
    fn inclusion_block_root(&self) -> Hash256;
}

macro_rules! impl_inclusion_record {
    ($($ty: ty),*) => {
        $(
            impl InclusionRecord for $ty {
                fn inclusion_slot(&self) -> Slot {
                    self.inclusion.slot
                }

                fn inclusion_block_root(&self) -> Hash256 {
                    self.inclusion.block_root
                }
            }
        )*
    };
}

impl_inclusion_record!(
    Attestation,
    Deposit,
    VoluntaryExit,
    AttesterSlashing,
    ProposerSlashing
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub inclusion: Inclusion,
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub aggregation_bits: Vec<u8>,
    pub aggregation_indices: Vec<ValidatorIndex>,
    pub beacon_block_root: Hash256,
    pub source_epoch: Epoch,
    pub source_root: Hash256,
    pub target_epoch: Epoch,
    pub target_root: Hash256,
    /// Unknown until the block at the start of `target_epoch` has been classified.
    pub target_correct: Tristate,
    /// Unknown until the block at `slot` has been classified.
    pub head_correct: Tristate,
}

/// Sync aggregates appear at most once per block, so they have no inclusion index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAggregate {
    pub inclusion_slot: Slot,
    pub inclusion_block_root: Hash256,
    pub bits: Vec<u8>,
    pub indices: Vec<ValidatorIndex>,
}

impl InclusionRecord for SyncAggregate {
    fn inclusion_slot(&self) -> Slot {
        self.inclusion_slot
    }

    fn inclusion_block_root(&self) -> Hash256 {
        self.inclusion_block_root
    }
}

/// A deposit included in a beacon block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub inclusion: Inclusion,
    pub validator_pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Vec<u8>,
    pub amount: Gwei,
}

/// A deposit as emitted by the deposit contract on the eth1 chain.
///
/// Unique by `(eth1_block_hash, eth1_log_index)` and immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eth1Deposit {
    pub eth1_block_number: u64,
    pub eth1_block_hash: Hash256,
    /// Seconds since the unix epoch.
    pub eth1_block_timestamp: u64,
    pub eth1_tx_hash: Hash256,
    pub eth1_log_index: u64,
    pub eth1_sender: Address,
    pub eth1_recipient: Address,
    pub eth1_gas_used: u64,
    pub eth1_gas_price: u64,
    pub deposit_index: u64,
    pub validator_pubkey: PublicKeyBytes,
    pub withdrawal_credentials: Vec<u8>,
    pub signature: SignatureBytes,
    pub amount: Gwei,
}

impl Eth1Deposit {
    pub fn key(&self) -> (Hash256, u64) {
        (self.eth1_block_hash, self.eth1_log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoluntaryExit {
    pub inclusion: Inclusion,
    pub validator_index: ValidatorIndex,
    pub epoch: Epoch,
}

/// One of the two conflicting attestations in an attester slashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashableAttestation {
    pub indices: Vec<ValidatorIndex>,
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub beacon_block_root: Hash256,
    pub source_epoch: Epoch,
    pub source_root: Hash256,
    pub target_epoch: Epoch,
    pub target_root: Hash256,
    pub signature: SignatureBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttesterSlashing {
    pub inclusion: Inclusion,
    pub attestation_1: SlashableAttestation,
    pub attestation_2: SlashableAttestation,
}

/// One of the two conflicting headers in a proposer slashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashableHeader {
    pub block_root: Hash256,
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body_root: Hash256,
    pub signature: SignatureBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerSlashing {
    pub inclusion: Inclusion,
    pub header_1: SlashableHeader,
    pub header_2: SlashableHeader,
}

/*
 * Summaries.
 *
 * These are always recomputed and replaced as a whole for their key, never patched.
 */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorEpochSummary {
    pub index: ValidatorIndex,
    pub epoch: Epoch,
    pub proposer_duties: u32,
    pub proposals_included: u32,
    pub attestation_included: bool,
    pub attestation_target_correct: Tristate,
    pub attestation_head_correct: Tristate,
    pub attestation_inclusion_delay: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub slot: Slot,
    pub attestations_for_block: u32,
    pub duplicate_attestations_for_block: u32,
    pub votes_for_block: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: Epoch,
    pub activation_queue_length: u32,
    pub activating_validators: u32,
    pub active_validators: u32,
    pub active_real_balance: Gwei,
    pub active_balance: Gwei,
    pub attesting_validators: u32,
    pub attesting_balance: Gwei,
    pub target_correct_validators: u32,
    pub target_correct_balance: Gwei,
    pub head_correct_validators: u32,
    pub head_correct_balance: Gwei,
    pub attestations_for_epoch: u32,
    pub attestations_in_epoch: u32,
    pub duplicate_attestations_for_epoch: u32,
    pub proposer_slashings: u32,
    pub attester_slashings: u32,
    pub deposits: u32,
    pub exiting_validators: u32,
    pub canonical_blocks: u32,
}
