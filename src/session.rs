use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::categories::CategoryBook;
use crate::commit::{self, CommitReport};
use crate::error::{LedgerError, Result};
use crate::merge::{self, MergeOutcome, MergeTarget, RemainderPolicy};
use crate::models::{NewTransaction, StagedTransaction, StagingId};
use crate::recognizer::{stage_recognized, RecognizedItem};
use crate::split::{self, SplitOutcome};
use crate::staging::{StagedField, StagingBuffer};
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::store::TransactionStore;

pub const STAGING_KEY: &str = "staging";

/// A merge target picker that is open but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePicker {
    pub source: StagingId,
    pub same_kind_only: bool,
}

/// Everything the entry screens mutate, kept in one place.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub buffer: StagingBuffer,
    pub batch_mode: bool,
    #[serde(skip)]
    pub policy: RemainderPolicy,
    #[serde(skip)]
    picker: Option<MergePicker>,
    /// Single-entry form: offset a saved transaction instead of creating a plain one.
    #[serde(skip)]
    pub merge_enabled: bool,
    #[serde(skip)]
    pub merge_target: Option<String>,
}

impl Session {
    pub fn new(policy: RemainderPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn load(kv: &dyn KeyValueStore, policy: RemainderPolicy) -> Result<Self> {
        let mut session: Session = load_json(kv, STAGING_KEY)?;
        session.policy = policy;
        Ok(session)
    }

    pub fn save(&self, kv: &mut dyn KeyValueStore) -> Result<()> {
        save_json(kv, STAGING_KEY, self).map_err(|e| LedgerError::persistence(e, true))
    }

    pub fn stage(&mut self, draft: NewTransaction) -> StagingId {
        self.batch_mode = true;
        self.buffer.add(draft)
    }

    pub fn stage_recognized(
        &mut self,
        items: Vec<RecognizedItem>,
        categories: &CategoryBook,
        today: NaiveDate,
    ) -> Result<Vec<StagingId>> {
        let ids = stage_recognized(&mut self.buffer, items, categories, today)?;
        self.batch_mode = true;
        Ok(ids)
    }

    pub fn edit(&mut self, id: StagingId, field: StagedField) -> Result<()> {
        self.buffer.update(id, field)
    }

    pub fn remove(&mut self, id: StagingId) -> Result<StagedTransaction> {
        let removed = self.buffer.remove(id)?;
        if self.picker.is_some_and(|p| p.source == id) {
            self.picker = None;
        }
        if self.buffer.is_empty() {
            self.batch_mode = false;
        }
        Ok(removed)
    }

    pub fn picker(&self) -> Option<MergePicker> {
        self.picker
    }

    /// Open the target picker for `source` and list the staged candidates.
    pub fn begin_merge(&mut self, source: StagingId, same_kind_only: bool) -> Result<Vec<StagingId>> {
        let candidates = self
            .buffer
            .candidates_for(source, same_kind_only)?
            .iter()
            .map(|c| c.staging_id)
            .collect();
        self.picker = Some(MergePicker {
            source,
            same_kind_only,
        });
        Ok(candidates)
    }

    pub fn cancel_merge(&mut self) {
        self.picker = None;
    }

    /// Apply the open picker's selection. The picker stays open if the merge fails.
    pub fn confirm_merge(&mut self, target: &MergeTarget, store: &TransactionStore) -> Result<MergeOutcome> {
        let picker = self
            .picker
            .ok_or_else(|| LedgerError::Validation("No merge is in progress".to_string()))?;
        if let MergeTarget::Staged(id) = target {
            let allowed = self
                .buffer
                .candidates_for(picker.source, picker.same_kind_only)?
                .iter()
                .any(|c| c.staging_id == *id);
            if !allowed {
                return Err(LedgerError::InvalidMergeTarget(format!(
                    "#{id} is not a candidate for #{}",
                    picker.source
                )));
            }
        }
        let outcome = merge::merge(&mut self.buffer, store, picker.source, target, self.policy)?;
        self.picker = None;
        Ok(outcome)
    }

    pub fn unlink(&mut self, id: StagingId) -> Result<()> {
        merge::unlink(&mut self.buffer, id)
    }

    pub fn split(&mut self, id: StagingId) -> Result<SplitOutcome> {
        split::split(&mut self.buffer, id)
    }

    /// Commit the batch. The emptied session is stored in the same write as
    /// the records, so a stored batch is never committed twice.
    pub fn commit(&mut self, store: &mut TransactionStore, kv: &mut dyn KeyValueStore) -> Result<CommitReport> {
        let mut buffer = self.buffer.clone();
        buffer.clear();
        let emptied = Session {
            buffer,
            ..Session::new(self.policy)
        };
        let staged = serde_json::to_string(&emptied).map_err(|e| LedgerError::persistence(e, false))?;
        let report = commit::commit_with(&mut self.buffer, store, kv, self.policy, &[(STAGING_KEY, staged)])?;
        self.batch_mode = false;
        self.picker = None;
        Ok(report)
    }

    pub fn discard(&mut self) {
        self.buffer.clear();
        self.batch_mode = false;
        self.picker = None;
    }

    /// Save the single-entry form.
    pub fn save_entry(
        &mut self,
        store: &mut TransactionStore,
        kv: &mut dyn KeyValueStore,
        draft: NewTransaction,
    ) -> Result<CommitReport> {
        let target = match (self.merge_enabled, self.merge_target.as_deref()) {
            (true, None) => {
                return Err(LedgerError::Validation(
                    "Merge is on but no saved transaction was chosen to offset".to_string(),
                ))
            }
            (true, Some(id)) => Some(id),
            (false, _) => None,
        };
        let report = commit::save_single(store, kv, draft, target, self.policy)?;
        debug!("saved single entry, {} offsets", report.offsets.len());
        self.merge_enabled = false;
        self.merge_target = None;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Kind;
    use crate::storage::testing::FlakyStore;
    use crate::storage::MemoryStore;
    use crate::store::TRANSACTIONS_KEY;
    use rust_decimal::Decimal;

    fn draft(amount: i64, kind: Kind) -> NewTransaction {
        NewTransaction {
            amount: Decimal::from(amount),
            kind,
            category_id: "exp-food".to_string(),
            occurred_at: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            note: String::new(),
        }
    }

    #[test]
    fn test_cancelled_picker_changes_nothing() {
        let mut session = Session::new(RemainderPolicy::Preserve);
        let a = session.stage(draft(10, Kind::Expense));
        let b = session.stage(draft(20, Kind::Expense));
        let before = session.buffer.items().to_vec();

        let candidates = session.begin_merge(a, false).unwrap();
        assert_eq!(candidates, vec![b]);
        session.cancel_merge();
        assert!(session.picker().is_none());
        assert_eq!(session.buffer.items(), before.as_slice());
    }

    #[test]
    fn test_confirm_merge_applies_and_closes_picker() {
        let store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        let a = session.stage(draft(10, Kind::Expense));
        let b = session.stage(draft(20, Kind::Expense));
        session.begin_merge(a, false).unwrap();
        session.confirm_merge(&MergeTarget::Staged(b), &store).unwrap();
        assert!(session.picker().is_none());
        assert_eq!(session.buffer.get(b).unwrap().amount, Decimal::from(30));
    }

    #[test]
    fn test_confirm_respects_same_kind_filter() {
        let store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        let a = session.stage(draft(10, Kind::Expense));
        let b = session.stage(draft(20, Kind::Income));
        session.begin_merge(a, true).unwrap();
        let err = session.confirm_merge(&MergeTarget::Staged(b), &store).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidMergeTarget(_)));
        assert!(session.picker().is_some());
        assert_eq!(session.buffer.len(), 2);
    }

    #[test]
    fn test_confirm_without_picker() {
        let store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        let a = session.stage(draft(10, Kind::Expense));
        let err = session.confirm_merge(&MergeTarget::Staged(a), &store).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_removing_last_item_leaves_batch_mode() {
        let mut session = Session::new(RemainderPolicy::Preserve);
        let a = session.stage(draft(10, Kind::Expense));
        assert!(session.batch_mode);
        session.remove(a).unwrap();
        assert!(!session.batch_mode);
    }

    #[test]
    fn test_commit_leaves_batch_mode() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        session.stage(draft(10, Kind::Expense));
        session.commit(&mut store, &mut kv).unwrap();
        assert!(!session.batch_mode);
        assert!(session.buffer.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_commit_stores_records_and_emptied_batch_together() {
        let mut kv = FlakyStore::default();
        let mut store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        session.stage(draft(10, Kind::Expense));
        session.stage(draft(5, Kind::Expense));
        session.save(&mut kv).unwrap();

        kv.fail_key = Some(STAGING_KEY.to_string());
        let err = session.commit(&mut store, &mut kv).unwrap_err();
        assert!(matches!(err, LedgerError::Persistence { retained_in_memory: false, .. }));
        assert!(store.is_empty());
        assert_eq!(kv.read(TRANSACTIONS_KEY).unwrap(), None);
        assert_eq!(session.buffer.len(), 2);
        assert_eq!(Session::load(&kv, RemainderPolicy::Preserve).unwrap().buffer.len(), 2);

        // Retrying after the failure saves each item exactly once.
        kv.fail_key = None;
        session.commit(&mut store, &mut kv).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(TransactionStore::load(&kv).unwrap().len(), 2);
        let reloaded = Session::load(&kv, RemainderPolicy::Preserve).unwrap();
        assert!(reloaded.buffer.is_empty());
        assert!(!reloaded.batch_mode);
    }

    #[test]
    fn test_session_round_trips_through_storage() {
        let mut kv = MemoryStore::new();
        let mut session = Session::new(RemainderPolicy::Discard);
        let a = session.stage(draft(10, Kind::Expense));
        let b = session.stage(draft(20, Kind::Expense));
        merge::merge_staged(&mut session.buffer, a, b, RemainderPolicy::Discard).unwrap();
        session.save(&mut kv).unwrap();

        let loaded = Session::load(&kv, RemainderPolicy::Preserve).unwrap();
        assert!(loaded.batch_mode);
        assert_eq!(loaded.policy, RemainderPolicy::Preserve);
        assert_eq!(loaded.buffer.items(), session.buffer.items());

        // Fresh ids continue after the stored ones
        let mut loaded = loaded;
        let c = loaded.stage(draft(1, Kind::Expense));
        assert!(c > b);
    }

    #[test]
    fn test_save_entry_requires_target_when_merge_enabled() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let mut session = Session::new(RemainderPolicy::Preserve);
        session.merge_enabled = true;
        let err = session.save_entry(&mut store, &mut kv, draft(10, Kind::Expense)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_entry_offsets_and_resets_form() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let income = store.insert(&mut kv, draft(100, Kind::Income)).unwrap();
        let mut session = Session::new(RemainderPolicy::Preserve);
        session.merge_enabled = true;
        session.merge_target = Some(income.id.clone());

        let report = session.save_entry(&mut store, &mut kv, draft(120, Kind::Expense)).unwrap();
        assert_eq!(report.remainders[0].amount, Decimal::from(20));
        assert_eq!(store.get(&income.id).unwrap().amount, Decimal::ZERO);
        assert!(!session.merge_enabled);
        assert!(session.merge_target.is_none());
    }
}
