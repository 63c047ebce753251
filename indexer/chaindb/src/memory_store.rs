use crate::errors::Error;
use crate::primitives::{Epoch, Hash256, Slot};
use crate::store::{
    BlocksStore, Eth1DepositsStore, InclusionStore, MetadataStore, SummariesStore,
};
use crate::tristate::{Canonicality, Tristate};
use crate::types::{
    Attestation, AttesterSlashing, Block, BlockSummary, Deposit, Eth1Deposit, EpochSummary,
    Inclusion, InclusionRecord, ProposerSlashing, SyncAggregate, ValidatorEpochSummary,
    VoluntaryExit,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    metadata: HashMap<String, Vec<u8>>,
    blocks: BTreeMap<(Slot, Hash256), Block>,
    block_slots: HashMap<Hash256, Slot>,
    attestations: BTreeMap<Inclusion, Attestation>,
    sync_aggregates: BTreeMap<(Slot, Hash256), SyncAggregate>,
    deposits: BTreeMap<Inclusion, Deposit>,
    voluntary_exits: BTreeMap<Inclusion, VoluntaryExit>,
    attester_slashings: BTreeMap<Inclusion, AttesterSlashing>,
    proposer_slashings: BTreeMap<Inclusion, ProposerSlashing>,
    eth1_deposits: HashMap<(Hash256, u64), Eth1Deposit>,
    /// `(block_number, block_hash, log_index)` of every stored eth1 deposit, for range reads.
    eth1_deposits_by_block: BTreeSet<(u64, Hash256, u64)>,
    validator_epoch_summaries: BTreeMap<Epoch, Vec<ValidatorEpochSummary>>,
    block_summaries: BTreeMap<Slot, BlockSummary>,
    epoch_summaries: BTreeMap<Epoch, EpochSummary>,
}

/// A thread-safe, in-memory implementation of every store trait.
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryChainDb {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryChainDb {
    /// Create a new, empty database.
    pub fn open() -> Self {
        Self::default()
    }
}

fn for_block<K, V: InclusionRecord + Clone>(map: &BTreeMap<K, V>, root: Hash256) -> Vec<V> {
    map.values()
        .filter(|record| record.inclusion_block_root() == root)
        .cloned()
        .collect()
}

#[async_trait]
impl MetadataStore for MemoryChainDb {
    async fn metadata(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.read().metadata.get(key).cloned())
    }

    async fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.inner
            .write()
            .metadata
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[async_trait]
impl BlocksStore for MemoryChainDb {
    async fn set_block(&self, block: &Block) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let mut block = block.clone();
        if let Some(existing) = inner.blocks.get(&(block.slot, block.root)) {
            if existing.canonical.is_known() {
                block.canonical = existing.canonical;
            }
        }
        inner.block_slots.insert(block.root, block.slot);
        inner.blocks.insert((block.slot, block.root), block);
        Ok(())
    }

    async fn block_by_root(&self, root: Hash256) -> Result<Option<Block>, Error> {
        let inner = self.inner.read();
        Ok(inner
            .block_slots
            .get(&root)
            .and_then(|slot| inner.blocks.get(&(*slot, root)))
            .cloned())
    }

    async fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<Block>, Error> {
        Ok(self
            .inner
            .read()
            .blocks
            .range((slot, Hash256::zero())..=(slot, Hash256::repeat_byte(0xff)))
            .map(|(_, block)| block.clone())
            .collect())
    }

    async fn apply_canonicality(
        &self,
        slot: Slot,
        updates: &[(Hash256, Canonicality)],
    ) -> Result<(), Error> {
        let mut inner = self.inner.write();

        // Validate everything before touching anything.
        let mut result: HashMap<Hash256, Canonicality> = inner
            .blocks
            .range((slot, Hash256::zero())..=(slot, Hash256::repeat_byte(0xff)))
            .map(|((_, root), block)| (*root, block.canonical))
            .collect();
        for (root, requested) in updates {
            let current = *result
                .get(root)
                .ok_or(Error::UnknownBlock { slot, root: *root })?;
            if current.is_known() && current != *requested {
                return Err(Error::CanonicalityConflict {
                    slot,
                    root: *root,
                    current,
                    requested: *requested,
                });
            }
            result.insert(*root, *requested);
        }
        let mut canonical_roots = result
            .iter()
            .filter(|(_, canonicality)| canonicality.is_canonical())
            .map(|(root, _)| *root)
            .collect::<Vec<_>>();
        if canonical_roots.len() > 1 {
            canonical_roots.sort();
            return Err(Error::MultipleCanonical {
                slot,
                roots: canonical_roots,
            });
        }

        for (root, canonicality) in updates {
            if let Some(block) = inner.blocks.get_mut(&(slot, *root)) {
                block.canonical = *canonicality;
            }
        }
        Ok(())
    }

    async fn reset_canonicality(&self, slots: Range<Slot>) -> Result<usize, Error> {
        if slots.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.write();
        let mut count = 0;
        for (_, block) in inner
            .blocks
            .range_mut((slots.start, Hash256::zero())..(slots.end, Hash256::zero()))
        {
            if block.canonical.is_known() {
                block.canonical = Canonicality::Unknown;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl InclusionStore for MemoryChainDb {
    async fn set_attestation(&self, attestation: &Attestation) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let mut attestation = attestation.clone();
        if let Some(existing) = inner.attestations.get(&attestation.inclusion) {
            if existing.target_correct.is_known() {
                attestation.target_correct = existing.target_correct;
            }
            if existing.head_correct.is_known() {
                attestation.head_correct = existing.head_correct;
            }
        }
        inner
            .attestations
            .insert(attestation.inclusion, attestation);
        Ok(())
    }

    async fn set_sync_aggregate(&self, sync_aggregate: &SyncAggregate) -> Result<(), Error> {
        self.inner.write().sync_aggregates.insert(
            (
                sync_aggregate.inclusion_slot,
                sync_aggregate.inclusion_block_root,
            ),
            sync_aggregate.clone(),
        );
        Ok(())
    }

    async fn set_deposit(&self, deposit: &Deposit) -> Result<(), Error> {
        self.inner
            .write()
            .deposits
            .insert(deposit.inclusion, deposit.clone());
        Ok(())
    }

    async fn set_voluntary_exit(&self, exit: &VoluntaryExit) -> Result<(), Error> {
        self.inner
            .write()
            .voluntary_exits
            .insert(exit.inclusion, exit.clone());
        Ok(())
    }

    async fn set_attester_slashing(&self, slashing: &AttesterSlashing) -> Result<(), Error> {
        self.inner
            .write()
            .attester_slashings
            .insert(slashing.inclusion, slashing.clone());
        Ok(())
    }

    async fn set_proposer_slashing(&self, slashing: &ProposerSlashing) -> Result<(), Error> {
        self.inner
            .write()
            .proposer_slashings
            .insert(slashing.inclusion, slashing.clone());
        Ok(())
    }

    async fn attestations_for_block(&self, root: Hash256) -> Result<Vec<Attestation>, Error> {
        Ok(for_block(&self.inner.read().attestations, root))
    }

    async fn sync_aggregate_for_block(
        &self,
        root: Hash256,
    ) -> Result<Option<SyncAggregate>, Error> {
        Ok(for_block(&self.inner.read().sync_aggregates, root)
            .into_iter()
            .next())
    }

    async fn deposits_for_block(&self, root: Hash256) -> Result<Vec<Deposit>, Error> {
        Ok(for_block(&self.inner.read().deposits, root))
    }

    async fn voluntary_exits_for_block(&self, root: Hash256) -> Result<Vec<VoluntaryExit>, Error> {
        Ok(for_block(&self.inner.read().voluntary_exits, root))
    }

    async fn attester_slashings_for_block(
        &self,
        root: Hash256,
    ) -> Result<Vec<AttesterSlashing>, Error> {
        Ok(for_block(&self.inner.read().attester_slashings, root))
    }

    async fn proposer_slashings_for_block(
        &self,
        root: Hash256,
    ) -> Result<Vec<ProposerSlashing>, Error> {
        Ok(for_block(&self.inner.read().proposer_slashings, root))
    }

    async fn set_attestation_correctness(
        &self,
        inclusion: &Inclusion,
        target_correct: Tristate,
        head_correct: Tristate,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let attestation =
            inner
                .attestations
                .get_mut(inclusion)
                .ok_or_else(|| Error::InvalidInput {
                    operation: "set_attestation_correctness",
                    reason: format!("no attestation at {:?}", inclusion),
                })?;
        if target_correct.is_known() {
            attestation.target_correct = target_correct;
        }
        if head_correct.is_known() {
            attestation.head_correct = head_correct;
        }
        Ok(())
    }
}

#[async_trait]
impl Eth1DepositsStore for MemoryChainDb {
    async fn set_eth1_deposit(&self, deposit: &Eth1Deposit) -> Result<bool, Error> {
        let mut inner = self.inner.write();
        if inner.eth1_deposits.contains_key(&deposit.key()) {
            return Ok(false);
        }
        inner.eth1_deposits_by_block.insert((
            deposit.eth1_block_number,
            deposit.eth1_block_hash,
            deposit.eth1_log_index,
        ));
        inner.eth1_deposits.insert(deposit.key(), deposit.clone());
        Ok(true)
    }

    async fn eth1_deposits(
        &self,
        block_numbers: RangeInclusive<u64>,
    ) -> Result<Vec<Eth1Deposit>, Error> {
        let (start, end) = block_numbers.into_inner();
        if start > end {
            return Ok(vec![]);
        }
        let inner = self.inner.read();
        Ok(inner
            .eth1_deposits_by_block
            .range((start, Hash256::zero(), 0)..=(end, Hash256::repeat_byte(0xff), u64::MAX))
            .filter_map(|(_, block_hash, log_index)| {
                inner.eth1_deposits.get(&(*block_hash, *log_index)).cloned()
            })
            .collect())
    }
}

#[async_trait]
impl SummariesStore for MemoryChainDb {
    async fn set_validator_epoch_summaries(
        &self,
        epoch: Epoch,
        summaries: Vec<ValidatorEpochSummary>,
    ) -> Result<(), Error> {
        if let Some(summary) = summaries.iter().find(|summary| summary.epoch != epoch) {
            return Err(Error::InvalidInput {
                operation: "set_validator_epoch_summaries",
                reason: format!(
                    "summary for validator {} has epoch {}, expected {}",
                    summary.index, summary.epoch, epoch
                ),
            });
        }
        self.inner
            .write()
            .validator_epoch_summaries
            .insert(epoch, summaries);
        Ok(())
    }

    async fn validator_epoch_summaries(
        &self,
        epoch: Epoch,
    ) -> Result<Vec<ValidatorEpochSummary>, Error> {
        Ok(self
            .inner
            .read()
            .validator_epoch_summaries
            .get(&epoch)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_block_summary(&self, summary: BlockSummary) -> Result<(), Error> {
        self.inner
            .write()
            .block_summaries
            .insert(summary.slot, summary);
        Ok(())
    }

    async fn block_summary(&self, slot: Slot) -> Result<Option<BlockSummary>, Error> {
        Ok(self.inner.read().block_summaries.get(&slot).cloned())
    }

    async fn set_epoch_summary(&self, summary: EpochSummary) -> Result<(), Error> {
        self.inner
            .write()
            .epoch_summaries
            .insert(summary.epoch, summary);
        Ok(())
    }

    async fn epoch_summary(&self, epoch: Epoch) -> Result<Option<EpochSummary>, Error> {
        Ok(self.inner.read().epoch_summaries.get(&epoch).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, PublicKeyBytes, SignatureBytes};

    fn eth1_deposit(block_number: u64, log_index: u64) -> Eth1Deposit {
        Eth1Deposit {
            eth1_block_number: block_number,
            eth1_block_hash: Hash256::from_low_u64_be(block_number),
            eth1_block_timestamp: 1_600_000_000,
            eth1_tx_hash: Hash256::repeat_byte(1),
            eth1_log_index: log_index,
            eth1_sender: Address::repeat_byte(2),
            eth1_recipient: Address::repeat_byte(3),
            eth1_gas_used: 21_000,
            eth1_gas_price: 1_000_000_000,
            deposit_index: log_index,
            validator_pubkey: PublicKeyBytes::empty(),
            withdrawal_credentials: vec![0; 32],
            signature: SignatureBytes::empty(),
            amount: 32_000_000_000,
        }
    }

    #[tokio::test]
    async fn metadata_round_trip() {
        let db = MemoryChainDb::open();
        assert_eq!(db.metadata("blocks.standard").await.unwrap(), None);
        db.set_metadata("blocks.standard", b"{}").await.unwrap();
        assert_eq!(
            db.metadata("blocks.standard").await.unwrap(),
            Some(b"{}".to_vec())
        );
    }

    #[tokio::test]
    async fn eth1_deposit_redelivery_is_absorbed() {
        let db = MemoryChainDb::open();
        assert!(db.set_eth1_deposit(&eth1_deposit(10, 0)).await.unwrap());
        assert!(db.set_eth1_deposit(&eth1_deposit(10, 1)).await.unwrap());
        assert!(!db.set_eth1_deposit(&eth1_deposit(10, 0)).await.unwrap());
        assert!(db.set_eth1_deposit(&eth1_deposit(12, 0)).await.unwrap());

        assert_eq!(db.eth1_deposits(0..=100).await.unwrap().len(), 3);
        assert_eq!(db.eth1_deposits(10..=10).await.unwrap().len(), 2);
        assert_eq!(db.eth1_deposits(11..=11).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn eth1_deposit_identity_ignores_block_number() {
        let db = MemoryChainDb::open();
        let deposit = eth1_deposit(10, 0);
        assert!(db.set_eth1_deposit(&deposit).await.unwrap());

        let renumbered = Eth1Deposit {
            eth1_block_number: 11,
            ..deposit.clone()
        };
        assert!(!db.set_eth1_deposit(&renumbered).await.unwrap());

        assert_eq!(db.eth1_deposits(0..=100).await.unwrap(), vec![deposit]);
        assert!(db.eth1_deposits(11..=11).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn validator_summaries_are_replaced() {
        let db = MemoryChainDb::open();
        let summary = |index| ValidatorEpochSummary {
            index,
            epoch: Epoch::new(4),
            proposer_duties: 0,
            proposals_included: 0,
            attestation_included: true,
            attestation_target_correct: Tristate::True,
            attestation_head_correct: Tristate::Unknown,
            attestation_inclusion_delay: Some(1),
        };

        db.set_validator_epoch_summaries(Epoch::new(4), vec![summary(1), summary(2)])
            .await
            .unwrap();
        db.set_validator_epoch_summaries(Epoch::new(4), vec![summary(3)])
            .await
            .unwrap();
        let stored = db.validator_epoch_summaries(Epoch::new(4)).await.unwrap();
        assert_eq!(stored, vec![summary(3)]);

        let err = db
            .set_validator_epoch_summaries(Epoch::new(5), vec![summary(1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn block_and_epoch_summaries_are_replaced() {
        let db = MemoryChainDb::open();
        let block_summary = |votes| BlockSummary {
            slot: Slot::new(9),
            attestations_for_block: 1,
            duplicate_attestations_for_block: 0,
            votes_for_block: votes,
        };
        db.set_block_summary(block_summary(10)).await.unwrap();
        db.set_block_summary(block_summary(12)).await.unwrap();
        assert_eq!(
            db.block_summary(Slot::new(9)).await.unwrap(),
            Some(block_summary(12))
        );

        let epoch_summary = EpochSummary {
            epoch: Epoch::new(2),
            canonical_blocks: 31,
            ..Default::default()
        };
        db.set_epoch_summary(epoch_summary.clone()).await.unwrap();
        assert_eq!(
            db.epoch_summary(Epoch::new(2)).await.unwrap(),
            Some(epoch_summary)
        );
        assert_eq!(db.epoch_summary(Epoch::new(3)).await.unwrap(), None);
    }
}
