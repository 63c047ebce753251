//! Derivation of attestation target and head correctness from canonical block status.
//!
//! Blocks are assumed to be indexed in slot order, so a slot with no stored block below an
//! already indexed inclusion slot is treated as skipped.

use crate::errors::Error;
use crate::primitives::{Hash256, Slot};
use crate::store::{BlocksStore, InclusionStore};
use crate::tristate::{Canonicality, Tristate};
use crate::types::Attestation;
use slog::{debug, Logger};

/// How far back to search for the canonical block covering a slot before giving up.
pub const DEFAULT_LOOKBACK_SLOTS: u64 = 64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttestationCorrectness {
    pub target_correct: Tristate,
    pub head_correct: Tristate,
}

/// Returns the root of the canonical block at or before `slot`.
///
/// Returns `None` while any slot on the way holds an unclassified block, or when no canonical
/// block is found within `lookback` slots.
pub async fn canonical_root_at<S: BlocksStore + ?Sized>(
    db: &S,
    slot: Slot,
    lookback: u64,
) -> Result<Option<Hash256>, Error> {
    let lowest = slot.saturating_sub(lookback).as_u64();
    for s in (lowest..=slot.as_u64()).rev() {
        let blocks = db.blocks_by_slot(Slot::new(s)).await?;
        if blocks
            .iter()
            .any(|block| block.canonical == Canonicality::Unknown)
        {
            return Ok(None);
        }
        if let Some(block) = blocks.iter().find(|block| block.canonical.is_canonical()) {
            return Ok(Some(block.root));
        }
    }
    Ok(None)
}

fn matches(expected: Option<Hash256>, voted: Hash256) -> Tristate {
    expected.map_or(Tristate::Unknown, |root| (root == voted).into())
}

pub async fn evaluate<S: BlocksStore + ?Sized>(
    db: &S,
    attestation: &Attestation,
    slots_per_epoch: u64,
    lookback: u64,
) -> Result<AttestationCorrectness, Error> {
    let head = canonical_root_at(db, attestation.slot, lookback).await?;
    let target_slot = attestation.target_epoch.start_slot(slots_per_epoch);
    let target = canonical_root_at(db, target_slot, lookback).await?;

    Ok(AttestationCorrectness {
        target_correct: matches(target, attestation.target_root),
        head_correct: matches(head, attestation.beacon_block_root),
    })
}

/// Evaluates every attestation included in the block `block_root` and stores any flag that
/// became known. Flags that are already known are left alone.
///
/// Returns the number of attestations updated.
pub async fn update_attestation_correctness<S>(
    db: &S,
    block_root: Hash256,
    slots_per_epoch: u64,
    log: &Logger,
) -> Result<usize, Error>
where
    S: BlocksStore + InclusionStore + ?Sized,
{
    let mut updated = 0;
    for attestation in db.attestations_for_block(block_root).await? {
        if attestation.target_correct.is_known() && attestation.head_correct.is_known() {
            continue;
        }

        let correctness =
            evaluate(db, &attestation, slots_per_epoch, DEFAULT_LOOKBACK_SLOTS).await?;
        let target_correct = if attestation.target_correct.is_known() {
            Tristate::Unknown
        } else {
            correctness.target_correct
        };
        let head_correct = if attestation.head_correct.is_known() {
            Tristate::Unknown
        } else {
            correctness.head_correct
        };

        if target_correct.is_known() || head_correct.is_known() {
            db.set_attestation_correctness(&attestation.inclusion, target_correct, head_correct)
                .await?;
            updated += 1;
        }
    }

    debug!(
        log,
        "Updated attestation correctness";
        "block_root" => ?block_root,
        "updated" => updated,
    );

    Ok(updated)
}
