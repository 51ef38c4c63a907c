use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{annotate, Kind, NewTransaction, PriorState, StagingId};
use crate::staging::StagingBuffer;
use crate::store::TransactionStore;

/// What happens to the part of an offset that exceeds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RemainderPolicy {
    /// The excess becomes a new transaction of the source's kind.
    #[default]
    Preserve,
    /// The target floors at zero and the excess is dropped.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Merge,
    Offset,
}

pub fn relation(source: Kind, target: Kind) -> Relation {
    if source == target {
        Relation::Merge
    } else {
        Relation::Offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTarget {
    Staged(StagingId),
    Persisted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Source now offsets a persisted transaction on commit.
    Linked { source: StagingId, target_id: String },
    Merged { target: StagingId, amount: Decimal },
    Offset {
        target: StagingId,
        amount: Decimal,
        excess: Decimal,
        remainder: Option<StagingId>,
    },
}

/// Target amount after subtracting an opposite-kind amount, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub amount: Decimal,
    pub excess: Decimal,
}

impl Offset {
    pub fn compute(target: Decimal, source: Decimal) -> Self {
        let diff = target - source;
        if diff > Decimal::ZERO {
            Self {
                amount: diff,
                excess: Decimal::ZERO,
            }
        } else {
            Self {
                amount: Decimal::ZERO,
                excess: -diff,
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.amount.is_zero()
    }
}

/// The transaction an offset excess turns into.
pub fn remainder_draft(source: &NewTransaction, excess: Decimal) -> NewTransaction {
    NewTransaction {
        amount: excess,
        kind: source.kind,
        category_id: source.category_id.clone(),
        occurred_at: source.occurred_at,
        note: annotate(&source.note, "(offset remainder)"),
    }
}

pub fn merge(
    buffer: &mut StagingBuffer,
    store: &TransactionStore,
    source: StagingId,
    target: &MergeTarget,
    policy: RemainderPolicy,
) -> Result<MergeOutcome> {
    match target {
        MergeTarget::Staged(target) => merge_staged(buffer, source, *target, policy),
        MergeTarget::Persisted(target_id) => link_persisted(buffer, store, source, target_id),
    }
}

/// Point a staged item at a persisted transaction. Nothing is recalculated
/// until commit so the store stays untouched while the batch is edited.
pub fn link_persisted(
    buffer: &mut StagingBuffer,
    store: &TransactionStore,
    source: StagingId,
    target_id: &str,
) -> Result<MergeOutcome> {
    let kind = buffer
        .get(source)
        .map(|s| s.kind)
        .ok_or_else(|| LedgerError::InvalidMergeTarget(format!("unknown staged item #{source}")))?;
    let target = store
        .get(target_id)
        .ok_or_else(|| LedgerError::InvalidMergeTarget(format!("unknown transaction {target_id}")))?;
    if target.kind != kind.opposite() {
        return Err(LedgerError::InvalidMergeTarget(format!(
            "a saved {} can only be offset by an {} entry",
            target.kind, target.kind.opposite()
        )));
    }

    buffer.get_mut(source)?.merge_target_id = Some(target_id.to_string());
    debug!("staged #{source} linked to transaction {target_id}");
    Ok(MergeOutcome::Linked {
        source,
        target_id: target_id.to_string(),
    })
}

pub fn unlink(buffer: &mut StagingBuffer, source: StagingId) -> Result<()> {
    buffer.get_mut(source)?.merge_target_id = None;
    Ok(())
}

/// Fold one staged item into another.
///
/// Same kind adds the amounts; opposite kinds subtract the source from the
/// target, flooring at zero. The source is removed and kept as an absorbed
/// child of the target so the operation can be split later.
pub fn merge_staged(
    buffer: &mut StagingBuffer,
    source: StagingId,
    target: StagingId,
    policy: RemainderPolicy,
) -> Result<MergeOutcome> {
    if source == target {
        return Err(LedgerError::InvalidMergeTarget(
            "an item cannot be merged into itself".to_string(),
        ));
    }
    let src = buffer
        .get(source)
        .cloned()
        .ok_or_else(|| LedgerError::InvalidMergeTarget(format!("unknown staged item #{source}")))?;
    let mut tgt = buffer
        .get(target)
        .cloned()
        .ok_or_else(|| LedgerError::InvalidMergeTarget(format!("unknown staged item #{target}")))?;

    if tgt.prior.is_none() {
        tgt.prior = Some(PriorState {
            amount: tgt.amount,
            note: tgt.note.clone(),
        });
    }

    let mut remainder = None;
    let outcome = match relation(src.kind, tgt.kind) {
        Relation::Merge => {
            tgt.amount += src.amount;
            tgt.note = if tgt.note.is_empty() {
                src.note.clone()
            } else {
                format!("{} + {}", tgt.note, src.note)
            };
            debug!("merged #{source} into #{target}: {}", tgt.amount);
            MergeOutcome::Merged {
                target,
                amount: tgt.amount,
            }
        }
        Relation::Offset => {
            let offset = Offset::compute(tgt.amount, src.amount);
            tgt.amount = offset.amount;
            tgt.note = annotate(
                &tgt.note,
                &format!("(offset {} {}: {})", src.kind, src.amount, src.note),
            );
            if !offset.excess.is_zero() {
                match policy {
                    RemainderPolicy::Preserve => {
                        let mut item = buffer.detached(remainder_draft(&src.draft(), offset.excess));
                        item.remainder_of = Some(target);
                        remainder = Some(item);
                    }
                    RemainderPolicy::Discard => {
                        warn!("offset of #{source} into #{target} dropped an excess of {}", offset.excess);
                    }
                }
            }
            debug!("offset #{source} against #{target}: {} left", tgt.amount);
            MergeOutcome::Offset {
                target,
                amount: tgt.amount,
                excess: offset.excess,
                remainder: remainder.as_ref().map(|r| r.staging_id),
            }
        }
    };

    tgt.absorbed_children.push(src);
    buffer.remove(source)?;
    buffer.replace(tgt)?;
    if let Some(item) = remainder {
        buffer.insert_after(target, vec![item])?;
    }
    Ok(outcome)
}
