use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{Kind, NewTransaction, StagedTransaction, StagingId};

/// A single editable field of a staged item.
#[derive(Debug, Clone)]
pub enum StagedField {
    Amount(Decimal),
    Kind(Kind),
    Category(String),
    Date(NaiveDate),
    Note(String),
}

/// The unsaved batch. Order is display order; ids are unique for the life of the buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingBuffer {
    items: Vec<StagedTransaction>,
    next_id: StagingId,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[StagedTransaction] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: StagingId) -> Option<&StagedTransaction> {
        self.items.iter().find(|i| i.staging_id == id)
    }

    pub fn position(&self, id: StagingId) -> Option<usize> {
        self.items.iter().position(|i| i.staging_id == id)
    }

    pub fn total(&self, kind: Kind) -> Decimal {
        self.items.iter().filter(|i| i.kind == kind).map(|i| i.amount).sum()
    }

    fn fresh_id(&mut self) -> StagingId {
        self.next_id += 1;
        self.next_id
    }

    pub fn add(&mut self, draft: NewTransaction) -> StagingId {
        let id = self.fresh_id();
        self.items.push(StagedTransaction::new(id, draft));
        id
    }

    /// Build an item with a fresh id without placing it in the buffer.
    pub fn detached(&mut self, draft: NewTransaction) -> StagedTransaction {
        let id = self.fresh_id();
        StagedTransaction::new(id, draft)
    }

    pub fn update(&mut self, id: StagingId, field: StagedField) -> Result<()> {
        if let StagedField::Amount(amount) = &field {
            if *amount < Decimal::ZERO {
                return Err(LedgerError::Validation(format!(
                    "Amount cannot be negative (got {amount})"
                )));
            }
        }
        let item = self.get_mut(id)?;
        match field {
            StagedField::Amount(amount) => item.amount = amount,
            StagedField::Kind(kind) => {
                // Target pools depend on kind, so any standing link is void.
                item.kind = kind;
                item.merge_target_id = None;
            }
            StagedField::Category(category_id) => item.category_id = category_id,
            StagedField::Date(date) => item.occurred_at = date,
            StagedField::Note(note) => item.note = note,
        }
        Ok(())
    }

    pub fn remove(&mut self, id: StagingId) -> Result<StagedTransaction> {
        let pos = self.require_position(id)?;
        Ok(self.items.remove(pos))
    }

    /// Every other staged item, optionally only those of the same kind.
    pub fn candidates_for(&self, id: StagingId, same_kind_only: bool) -> Result<Vec<&StagedTransaction>> {
        let source = self
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("staged item #{id}")))?;
        Ok(self
            .items
            .iter()
            .filter(|i| i.staging_id != id)
            .filter(|i| !same_kind_only || i.kind == source.kind)
            .collect())
    }

    /// Insert at `index`, clamped to the end of the buffer.
    pub fn insert_at(&mut self, index: usize, item: StagedTransaction) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// Insert `items` directly after `anchor`, keeping their order.
    pub fn insert_after(&mut self, anchor: StagingId, items: Vec<StagedTransaction>) -> Result<()> {
        let mut at = self.require_position(anchor)? + 1;
        for item in items {
            self.insert_at(at, item);
            at += 1;
        }
        Ok(())
    }

    pub fn replace(&mut self, item: StagedTransaction) -> Result<()> {
        let pos = self.require_position(item.staging_id)?;
        self.items[pos] = item;
        Ok(())
    }

    pub fn retain(&mut self, keep: impl FnMut(&StagedTransaction) -> bool) {
        self.items.retain(keep);
    }

    pub(crate) fn get_mut(&mut self, id: StagingId) -> Result<&mut StagedTransaction> {
        self.items
            .iter_mut()
            .find(|i| i.staging_id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("staged item #{id}")))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn require_position(&self, id: StagingId) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| LedgerError::NotFound(format!("staged item #{id}")))
    }
}
