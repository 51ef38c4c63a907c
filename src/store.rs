use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::models::{Kind, NewTransaction, Transaction, TransactionPatch};
use crate::storage::{load_json, save_json, KeyValueStore};

pub const TRANSACTIONS_KEY: &str = "transactions";

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<Kind>,
    pub category_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        if self.kind.is_some_and(|k| k != txn.kind) {
            return false;
        }
        if self.category_id.as_ref().is_some_and(|c| *c != txn.category_id) {
            return false;
        }
        if self.from.is_some_and(|d| txn.occurred_at < d) {
            return false;
        }
        if self.to.is_some_and(|d| txn.occurred_at > d) {
            return false;
        }
        if let Some(search) = &self.search {
            if !txn.note.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// The persisted transaction list, written through to the key-value store on every change.
#[derive(Debug, Default)]
pub struct TransactionStore {
    records: Vec<Transaction>,
    unsynced: bool,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "Amount must be greater than zero (got {amount})"
        )));
    }
    Ok(())
}

impl TransactionStore {
    pub fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let records: Vec<Transaction> = load_json(kv, TRANSACTIONS_KEY)?;
        debug!("loaded {} transactions", records.len());
        Ok(Self {
            records,
            unsynced: false,
        })
    }

    pub fn all(&self) -> &[Transaction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when the last write failed and memory is ahead of storage.
    pub fn is_unsynced(&self) -> bool {
        self.unsynced
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.records.iter().find(|t| t.id == id)
    }

    /// Matching transactions, newest first.
    pub fn query(&self, filter: &TransactionFilter) -> Vec<&Transaction> {
        let mut rows: Vec<&Transaction> = self.records.iter().filter(|t| filter.matches(t)).collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        rows
    }

    /// Persisted transactions a new item of `kind` may offset against.
    pub fn offset_candidates(&self, kind: Kind) -> Vec<&Transaction> {
        self.query(&TransactionFilter {
            kind: Some(kind.opposite()),
            ..Default::default()
        })
    }

    pub fn insert(&mut self, kv: &mut dyn KeyValueStore, draft: NewTransaction) -> Result<Transaction> {
        validate_amount(draft.amount)?;
        let txn = draft.into_transaction(new_id());
        self.records.push(txn.clone());
        self.sync(kv)?;
        Ok(txn)
    }

    pub fn update(
        &mut self,
        kv: &mut dyn KeyValueStore,
        id: &str,
        patch: TransactionPatch,
    ) -> Result<Transaction> {
        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
        }
        let txn = self
            .records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        if let Some(amount) = patch.amount {
            txn.amount = amount;
        }
        if let Some(kind) = patch.kind {
            txn.kind = kind;
        }
        if let Some(category_id) = patch.category_id {
            txn.category_id = category_id;
        }
        if let Some(date) = patch.occurred_at {
            txn.occurred_at = date;
        }
        if let Some(note) = patch.note {
            txn.note = note;
        }
        let updated = txn.clone();
        self.sync(kv)?;
        Ok(updated)
    }

    pub fn delete(&mut self, kv: &mut dyn KeyValueStore, id: &str) -> Result<Transaction> {
        let pos = self
            .records
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        let removed = self.records.remove(pos);
        self.sync(kv)?;
        Ok(removed)
    }

    /// Insert new records and rewrite existing ones as a single write.
    ///
    /// Storage is written before memory changes; if the write fails the store
    /// is left exactly as it was.
    pub fn apply_batch(
        &mut self,
        kv: &mut dyn KeyValueStore,
        inserts: Vec<NewTransaction>,
        updates: Vec<Transaction>,
    ) -> Result<Vec<Transaction>> {
        self.apply_batch_with(kv, inserts, updates, &[])
    }

    /// Like [`apply_batch`](Self::apply_batch), also writing `also` in the
    /// same storage step so other keys change together with the records.
    pub fn apply_batch_with(
        &mut self,
        kv: &mut dyn KeyValueStore,
        inserts: Vec<NewTransaction>,
        updates: Vec<Transaction>,
        also: &[(&str, String)],
    ) -> Result<Vec<Transaction>> {
        let mut next = self.records.clone();
        for updated in updates {
            let slot = next
                .iter_mut()
                .find(|t| t.id == updated.id)
                .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", updated.id)))?;
            *slot = updated;
        }
        let created: Vec<Transaction> = inserts
            .into_iter()
            .map(|draft| draft.into_transaction(new_id()))
            .collect();
        next.extend(created.iter().cloned());

        let records = serde_json::to_string(&next).map_err(|e| LedgerError::persistence(e, false))?;
        let mut entries = vec![(TRANSACTIONS_KEY, records)];
        entries.extend(also.iter().cloned());
        if let Err(e) = kv.write_many(&entries) {
            warn!("batch write failed, store unchanged: {e}");
            return Err(LedgerError::persistence(e, false));
        }
        self.records = next;
        self.unsynced = false;
        Ok(created)
    }

    fn sync(&mut self, kv: &mut dyn KeyValueStore) -> Result<()> {
        match save_json(kv, TRANSACTIONS_KEY, &self.records) {
            Ok(()) => {
                self.unsynced = false;
                Ok(())
            }
            Err(e) => {
                warn!("write-through failed, keeping in-memory state: {e}");
                self.unsynced = true;
                Err(LedgerError::persistence(e, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::FlakyStore;
    use crate::storage::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn draft(amount: i64, kind: Kind, d: u32, note: &str) -> NewTransaction {
        NewTransaction {
            amount: Decimal::from(amount),
            kind,
            category_id: "exp-food".to_string(),
            occurred_at: day(d),
            note: note.to_string(),
        }
    }

    #[test]
    fn test_insert_persists_and_reloads() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::load(&kv).unwrap();
        let txn = store.insert(&mut kv, draft(20, Kind::Expense, 1, "Coffee")).unwrap();
        assert!(!txn.id.is_empty());
        let reloaded = TransactionStore::load(&kv).unwrap();
        assert_eq!(reloaded.all(), &[txn]);
    }

    #[test]
    fn test_insert_rejects_non_positive_amount() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let err = store.insert(&mut kv, draft(0, Kind::Expense, 1, "")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(store.is_empty());
        assert_eq!(kv.read(TRANSACTIONS_KEY).unwrap(), None);
    }

    #[test]
    fn test_update_in_place() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let txn = store.insert(&mut kv, draft(20, Kind::Expense, 1, "Coffee")).unwrap();
        let patch = TransactionPatch {
            amount: Some(Decimal::from(25)),
            note: Some("Coffee beans".to_string()),
            ..Default::default()
        };
        let updated = store.update(&mut kv, &txn.id, patch).unwrap();
        assert_eq!(updated.id, txn.id);
        assert_eq!(updated.amount, Decimal::from(25));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_unknown_id() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let err = store.update(&mut kv, "nope", TransactionPatch::default()).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn test_delete() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let txn = store.insert(&mut kv, draft(20, Kind::Expense, 1, "Coffee")).unwrap();
        store.delete(&mut kv, &txn.id).unwrap();
        assert!(store.is_empty());
        assert!(TransactionStore::load(&kv).unwrap().is_empty());
    }

    #[test]
    fn test_query_filters_and_orders_newest_first() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        store.insert(&mut kv, draft(10, Kind::Expense, 3, "Bus")).unwrap();
        store.insert(&mut kv, draft(900, Kind::Income, 5, "Salary")).unwrap();
        store.insert(&mut kv, draft(15, Kind::Expense, 9, "Bus pass")).unwrap();
        store.insert(&mut kv, draft(40, Kind::Expense, 20, "Dinner")).unwrap();

        let filter = TransactionFilter {
            kind: Some(Kind::Expense),
            from: Some(day(1)),
            to: Some(day(10)),
            ..Default::default()
        };
        let notes: Vec<&str> = store.query(&filter).iter().map(|t| t.note.as_str()).collect();
        assert_eq!(notes, vec!["Bus pass", "Bus"]);

        let search = TransactionFilter {
            search: Some("BUS".to_string()),
            ..Default::default()
        };
        assert_eq!(store.query(&search).len(), 2);
    }

    #[test]
    fn test_offset_candidates_are_opposite_kind() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        store.insert(&mut kv, draft(10, Kind::Expense, 3, "Bus")).unwrap();
        store.insert(&mut kv, draft(900, Kind::Income, 5, "Salary")).unwrap();
        let candidates = store.offset_candidates(Kind::Expense);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, Kind::Income);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let mut kv = FlakyStore::default();
        let mut store = TransactionStore::default();
        store.insert(&mut kv, draft(10, Kind::Expense, 3, "Bus")).unwrap();
        kv.fail_writes = true;
        let err = store.insert(&mut kv, draft(12, Kind::Expense, 4, "Tram")).unwrap_err();
        assert!(matches!(err, LedgerError::Persistence { retained_in_memory: true, .. }));
        assert_eq!(store.len(), 2);
        assert!(store.is_unsynced());
        assert_eq!(TransactionStore::load(&kv).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_batch_is_all_or_nothing() {
        let mut kv = FlakyStore::default();
        let mut store = TransactionStore::default();
        let existing = store.insert(&mut kv, draft(100, Kind::Income, 1, "Refund")).unwrap();
        kv.fail_writes = true;

        let mut changed = existing.clone();
        changed.amount = Decimal::from(40);
        let err = store
            .apply_batch(&mut kv, vec![draft(5, Kind::Expense, 2, "Snack")], vec![changed])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence { retained_in_memory: false, .. }));
        assert_eq!(store.all(), &[existing]);
    }

    #[test]
    fn test_apply_batch_inserts_and_updates() {
        let mut kv = MemoryStore::new();
        let mut store = TransactionStore::default();
        let existing = store.insert(&mut kv, draft(100, Kind::Income, 1, "Refund")).unwrap();
        let mut changed = existing.clone();
        changed.amount = Decimal::from(40);
        let created = store
            .apply_batch(&mut kv, vec![draft(5, Kind::Expense, 2, "Snack")], vec![changed])
            .unwrap();
        assert_eq!(created.len(), 1);
        let reloaded = TransactionStore::load(&kv).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(&existing.id).unwrap().amount, Decimal::from(40));
    }
}
