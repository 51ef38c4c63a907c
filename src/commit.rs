use std::collections::HashMap;

use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::merge::{remainder_draft, Offset, RemainderPolicy};
use crate::models::{annotate, Kind, NewTransaction, Transaction};
use crate::staging::StagingBuffer;
use crate::storage::KeyValueStore;
use crate::store::TransactionStore;

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOffset {
    pub target_id: String,
    pub previous: Decimal,
    pub amount: Decimal,
    pub excess: Decimal,
}

#[derive(Debug, Default)]
pub struct CommitReport {
    pub inserted: Vec<Transaction>,
    pub offsets: Vec<AppliedOffset>,
    pub remainders: Vec<Transaction>,
    pub discarded: usize,
}

fn offset_annotation(kind: Kind, amount: Decimal, full: bool) -> String {
    if full {
        format!("(fully offset by {kind} {amount})")
    } else {
        format!("(offset by {kind} {amount})")
    }
}

/// Working copies of persisted targets, so several sources can offset the same one.
struct OffsetPlan<'a> {
    store: &'a TransactionStore,
    policy: RemainderPolicy,
    targets: HashMap<String, Transaction>,
    order: Vec<String>,
    offsets: Vec<AppliedOffset>,
    remainders: Vec<NewTransaction>,
}

impl<'a> OffsetPlan<'a> {
    fn new(store: &'a TransactionStore, policy: RemainderPolicy) -> Self {
        Self {
            store,
            policy,
            targets: HashMap::new(),
            order: Vec::new(),
            offsets: Vec::new(),
            remainders: Vec::new(),
        }
    }

    fn check(&self, source: &NewTransaction, target_id: &str) -> std::result::Result<(), String> {
        match self.store.get(target_id) {
            None => Err(format!("transaction {target_id} no longer exists")),
            Some(t) if t.kind == source.kind => Err(format!(
                "transaction {target_id} is also {}, only an opposite entry can offset it",
                t.kind
            )),
            Some(_) => Ok(()),
        }
    }

    fn apply(&mut self, source: &NewTransaction, target_id: &str) -> Result<()> {
        if !self.targets.contains_key(target_id) {
            let target = self
                .store
                .get(target_id)
                .cloned()
                .ok_or_else(|| LedgerError::InvalidMergeTarget(format!("unknown transaction {target_id}")))?;
            self.order.push(target_id.to_string());
            self.targets.insert(target_id.to_string(), target);
        }
        let target = self
            .targets
            .get_mut(target_id)
            .ok_or_else(|| LedgerError::Other(format!("offset target {target_id} vanished")))?;

        let previous = target.amount;
        let offset = Offset::compute(previous, source.amount);
        target.amount = offset.amount;
        target.note = annotate(
            &target.note,
            &offset_annotation(source.kind, source.amount, offset.is_full()),
        );

        if !offset.excess.is_zero() {
            match self.policy {
                RemainderPolicy::Preserve => self.remainders.push(remainder_draft(source, offset.excess)),
                RemainderPolicy::Discard => {
                    warn!("offset against {target_id} dropped an excess of {}", offset.excess)
                }
            }
        }
        debug!("offset {target_id}: {previous} -> {}", offset.amount);
        self.offsets.push(AppliedOffset {
            target_id: target_id.to_string(),
            previous,
            amount: offset.amount,
            excess: offset.excess,
        });
        Ok(())
    }

    /// Rewritten targets in first-touched order, the offsets applied, and remainder drafts.
    fn finish(mut self) -> (Vec<Transaction>, Vec<AppliedOffset>, Vec<NewTransaction>) {
        let updates = self
            .order
            .iter()
            .filter_map(|id| self.targets.remove(id))
            .collect();
        (updates, self.offsets, self.remainders)
    }
}

/// Write the staged batch to the store.
///
/// Items with a zero amount are dropped. Items without a merge target become
/// new transactions; the rest offset their persisted targets. Everything is
/// written in one step and the buffer is cleared only once that succeeds.
pub fn commit(
    buffer: &mut StagingBuffer,
    store: &mut TransactionStore,
    kv: &mut dyn KeyValueStore,
    policy: RemainderPolicy,
) -> Result<CommitReport> {
    commit_with(buffer, store, kv, policy, &[])
}

/// [`commit`], writing `also` in the same storage step as the records.
pub fn commit_with(
    buffer: &mut StagingBuffer,
    store: &mut TransactionStore,
    kv: &mut dyn KeyValueStore,
    policy: RemainderPolicy,
    also: &[(&str, String)],
) -> Result<CommitReport> {
    if buffer.is_empty() {
        return Err(LedgerError::Validation("Nothing to save: the batch is empty".to_string()));
    }

    let valid: Vec<_> = buffer
        .items()
        .iter()
        .filter(|i| i.amount > Decimal::ZERO)
        .collect();
    let discarded = buffer.len() - valid.len();
    if valid.is_empty() {
        return Err(LedgerError::Validation(format!(
            "Nothing valid to save: all {discarded} staged amounts are zero"
        )));
    }
    if discarded > 0 {
        warn!("dropping {discarded} staged items with a zero amount");
    }

    let mut plan = OffsetPlan::new(store, policy);
    let problems: Vec<String> = valid
        .iter()
        .filter_map(|item| {
            let target_id = item.merge_target_id.as_deref()?;
            plan.check(&item.draft(), target_id)
                .err()
                .map(|e| format!("#{}: {e}", item.staging_id))
        })
        .collect();
    if !problems.is_empty() {
        return Err(LedgerError::Validation(format!(
            "Cannot save the batch: {}",
            problems.join("; ")
        )));
    }

    let mut inserts = Vec::new();
    for item in &valid {
        match item.merge_target_id.as_deref() {
            None => inserts.push(item.draft()),
            Some(target_id) => plan.apply(&item.draft(), target_id)?,
        }
    }
    let plain = inserts.len();
    let (updates, offsets, mut remainder_drafts) = plan.finish();
    inserts.append(&mut remainder_drafts);

    let mut created = store.apply_batch_with(kv, inserts, updates, also)?;
    let remainders = created.split_off(plain);
    buffer.clear();

    info!(
        "committed batch: {} new, {} offsets, {} remainders, {} dropped",
        created.len(),
        offsets.len(),
        remainders.len(),
        discarded
    );
    Ok(CommitReport {
        inserted: created,
        offsets,
        remainders,
        discarded,
    })
}

/// Save one transaction outside batch mode, optionally offsetting a persisted one.
pub fn save_single(
    store: &mut TransactionStore,
    kv: &mut dyn KeyValueStore,
    draft: NewTransaction,
    merge_target: Option<&str>,
    policy: RemainderPolicy,
) -> Result<CommitReport> {
    if draft.amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "Amount must be greater than zero (got {})",
            draft.amount
        )));
    }

    let Some(target_id) = merge_target else {
        let txn = store.insert(kv, draft)?;
        return Ok(CommitReport {
            inserted: vec![txn],
            ..Default::default()
        });
    };

    let mut plan = OffsetPlan::new(store, policy);
    plan.check(&draft, target_id).map_err(LedgerError::InvalidMergeTarget)?;
    plan.apply(&draft, target_id)?;
    let (updates, offsets, inserts) = plan.finish();

    let remainders = store.apply_batch(kv, inserts, updates)?;
    Ok(CommitReport {
        inserted: Vec::new(),
        offsets,
        remainders,
        discarded: 0,
    })
}
