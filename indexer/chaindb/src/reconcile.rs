//! Canonical-chain reconciliation.
//!
//! Per `(slot, root)` the only transitions are `Unknown -> Canonical` and
//! `Unknown -> Orphaned`. A classified block is never re-flipped by a later pass; it can only be
//! reopened by `reset_canonicality` during a full resync.

use crate::errors::Error;
use crate::primitives::{Hash256, Slot};
use crate::store::BlocksStore;
use crate::tristate::Canonicality;
use crate::types::InclusionRecord;
use slog::{debug, warn, Logger};
use std::ops::Range;

/// The result of a successful `reconcile_slot`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub canonical: Option<Hash256>,
    pub orphaned: Vec<Hash256>,
    /// Blocks that already held the requested classification.
    pub unchanged: usize,
}

/// Classifies every block stored at `slot`.
///
/// `canonical_root` is the root the canonical chain holds at `slot`, or `None` if the canonical
/// chain skipped the slot. The named block becomes canonical and every competing block at the
/// slot becomes orphaned. Nothing is written unless the whole classification can be applied.
pub async fn reconcile_slot<S: BlocksStore + ?Sized>(
    db: &S,
    slot: Slot,
    canonical_root: Option<Hash256>,
    log: &Logger,
) -> Result<ReconcileOutcome, Error> {
    let blocks = db.blocks_by_slot(slot).await?;

    if let Some(root) = canonical_root {
        if !blocks.iter().any(|block| block.root == root) {
            return Err(Error::UnknownBlock { slot, root });
        }
    }

    let mut outcome = ReconcileOutcome::default();
    let mut updates = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let requested = Canonicality::from(Some(block.root) == canonical_root);
        if block.canonical == requested {
            outcome.unchanged += 1;
        } else if block.canonical.is_known() {
            warn!(
                log,
                "Refusing to reclassify block";
                "slot" => %slot,
                "root" => ?block.root,
                "current" => %block.canonical,
                "requested" => %requested,
            );
            return Err(Error::CanonicalityConflict {
                slot,
                root: block.root,
                current: block.canonical,
                requested,
            });
        } else {
            updates.push((block.root, requested));
        }

        if requested.is_canonical() {
            outcome.canonical = Some(block.root);
        } else {
            outcome.orphaned.push(block.root);
        }
    }

    if !updates.is_empty() {
        db.apply_canonicality(slot, &updates).await?;
    }

    debug!(
        log,
        "Reconciled slot";
        "slot" => %slot,
        "canonical" => ?outcome.canonical,
        "orphaned" => outcome.orphaned.len(),
        "updated" => updates.len(),
    );

    Ok(outcome)
}

/// The canonical status of an inclusion record, read through its including block.
///
/// Records whose block is not stored are `Unknown`.
pub async fn inclusion_canonicality<S, R>(db: &S, record: &R) -> Result<Canonicality, Error>
where
    S: BlocksStore + ?Sized,
    R: InclusionRecord + Sync,
{
    Ok(db
        .block_by_root(record.inclusion_block_root())
        .await?
        .filter(|block| block.slot == record.inclusion_slot())
        .map_or(Canonicality::Unknown, |block| block.canonical))
}

/// Reopens every block in `slots` for classification. Only for a full resync.
pub async fn reset_canonicality<S: BlocksStore + ?Sized>(
    db: &S,
    slots: Range<Slot>,
    log: &Logger,
) -> Result<usize, Error> {
    let count = db.reset_canonicality(slots.clone()).await?;
    warn!(
        log,
        "Reset canonical status for resync";
        "start_slot" => %slots.start,
        "end_slot" => %slots.end,
        "blocks" => count,
    );
    Ok(count)
}
