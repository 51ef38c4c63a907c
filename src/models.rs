use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Expense,
    Income,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    pub fn opposite(&self) -> Kind {
        match self {
            Self::Expense => Self::Income,
            Self::Income => Self::Expense,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub kind: Kind,
}

/// A persisted transaction. `amount` is never negative; direction lives in `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    pub kind: Kind,
    pub category_id: String,
    pub occurred_at: NaiveDate,
    #[serde(default)]
    pub note: String,
}

/// The user-entered fields shared by persisted and staged transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub kind: Kind,
    pub category_id: String,
    pub occurred_at: NaiveDate,
    pub note: String,
}

impl NewTransaction {
    pub fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            amount: self.amount,
            kind: self.kind,
            category_id: self.category_id,
            occurred_at: self.occurred_at,
            note: self.note,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub kind: Option<Kind>,
    pub category_id: Option<String>,
    pub occurred_at: Option<NaiveDate>,
    pub note: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.kind.is_none()
            && self.category_id.is_none()
            && self.occurred_at.is_none()
            && self.note.is_none()
    }
}

pub type StagingId = u64;

/// Amount and note of a staged item as they were before its first merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorState {
    pub amount: Decimal,
    pub note: String,
}

/// An unsaved candidate transaction in the batch buffer.
///
/// `absorbed_children` is non-empty exactly when `prior` is set: both are
/// written by a merge into this item and both are cleared by a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedTransaction {
    pub staging_id: StagingId,
    pub amount: Decimal,
    pub kind: Kind,
    pub category_id: String,
    pub occurred_at: NaiveDate,
    #[serde(default)]
    pub note: String,
    /// Persisted transaction this item offsets when the batch is committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_children: Vec<StagedTransaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorState>,
    /// Set on items created from an offset excess; names the item the offset landed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remainder_of: Option<StagingId>,
}

impl StagedTransaction {
    pub fn new(staging_id: StagingId, draft: NewTransaction) -> Self {
        Self {
            staging_id,
            amount: draft.amount,
            kind: draft.kind,
            category_id: draft.category_id,
            occurred_at: draft.occurred_at,
            note: draft.note,
            merge_target_id: None,
            absorbed_children: Vec::new(),
            prior: None,
            remainder_of: None,
        }
    }

    pub fn is_merge_result(&self) -> bool {
        !self.absorbed_children.is_empty()
    }

    /// The persistable fields, with every staging-only field stripped.
    pub fn draft(&self) -> NewTransaction {
        NewTransaction {
            amount: self.amount,
            kind: self.kind,
            category_id: self.category_id.clone(),
            occurred_at: self.occurred_at,
            note: self.note.clone(),
        }
    }
}

/// Append a parenthesised annotation to a note, skipping the separator when the note is blank.
pub fn annotate(note: &str, annotation: &str) -> String {
    if note.trim().is_empty() {
        annotation.to_string()
    } else {
        format!("{note} {annotation}")
    }
}
