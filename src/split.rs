use log::debug;

use crate::error::{LedgerError, Result};
use crate::models::{StagedTransaction, StagingId};
use crate::staging::StagingBuffer;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    pub restored: StagingId,
    pub children: Vec<StagingId>,
    pub dropped_remainders: Vec<StagingId>,
}

/// First remainder of `id` anywhere under `children`.
fn nested_remainder(children: &[StagedTransaction], id: StagingId) -> Option<StagingId> {
    children.iter().find_map(|c| {
        if c.remainder_of == Some(id) {
            Some(c.staging_id)
        } else {
            nested_remainder(&c.absorbed_children, id)
        }
    })
}

/// Remainders of `id` have to be plain items, either in the buffer or folded
/// straight into `id`, for a split to give back exactly what the merges took.
fn check_remainders(buffer: &StagingBuffer, id: StagingId) -> Result<()> {
    for item in buffer.items() {
        if item.staging_id == id {
            for child in &item.absorbed_children {
                if child.remainder_of == Some(id) && child.is_merge_result() {
                    return Err(LedgerError::Validation(format!(
                        "Remainder #{} inside #{id} has merges of its own; #{id} can no longer be split",
                        child.staging_id
                    )));
                }
                if let Some(r) = nested_remainder(&child.absorbed_children, id) {
                    return Err(LedgerError::Validation(format!(
                        "Remainder #{r} of #{id} is nested inside #{}; #{id} can no longer be split",
                        child.staging_id
                    )));
                }
            }
            continue;
        }
        if item.remainder_of == Some(id) && item.is_merge_result() {
            let r = item.staging_id;
            return Err(LedgerError::Validation(format!(
                "Remainder #{r} of #{id} has merges of its own; split #{r} first"
            )));
        }
        if let Some(r) = nested_remainder(&item.absorbed_children, id) {
            let owner = item.staging_id;
            return Err(LedgerError::Validation(format!(
                "Remainder #{r} of #{id} was merged into #{owner}; split #{owner} first"
            )));
        }
    }
    Ok(())
}

/// Undo the merges recorded on a staged item.
///
/// The item gets back the amount and note it had before its first merge and
/// its absorbed children return as independent items right after it. A child
/// that was itself a merge result comes back whole; only one level is undone.
/// Remainder items created by offsets into this item are removed. The split
/// is refused while such a remainder has been merged with other items.
pub fn split(buffer: &mut StagingBuffer, id: StagingId) -> Result<SplitOutcome> {
    let mut item = buffer
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::NotFound(format!("staged item #{id}")))?;
    if !item.is_merge_result() {
        return Err(LedgerError::Validation(format!("Staged item #{id} has nothing to split")));
    }
    check_remainders(buffer, id)?;
    let prior = item
        .prior
        .take()
        .ok_or_else(|| LedgerError::Other(format!("staged item #{id} lost its pre-merge snapshot")))?;

    let (folded, children): (Vec<StagedTransaction>, Vec<StagedTransaction>) =
        std::mem::take(&mut item.absorbed_children)
            .into_iter()
            .partition(|c| c.remainder_of == Some(id));
    let child_ids: Vec<StagingId> = children.iter().map(|c| c.staging_id).collect();
    item.amount = prior.amount;
    item.note = prior.note;

    let mut dropped_remainders: Vec<StagingId> = buffer
        .items()
        .iter()
        .filter(|i| i.remainder_of == Some(id))
        .map(|i| i.staging_id)
        .collect();
    dropped_remainders.extend(folded.iter().map(|c| c.staging_id));
    buffer.retain(|i| i.remainder_of != Some(id));

    buffer.replace(item)?;
    buffer.insert_after(id, children)?;
    debug!("split #{id} into {} children", child_ids.len());

    Ok(SplitOutcome {
        restored: id,
        children: child_ids,
        dropped_remainders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge_staged, RemainderPolicy};
    use crate::models::{Kind, NewTransaction};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn draft(amount: i64, kind: Kind, note: &str) -> NewTransaction {
        NewTransaction {
            amount: Decimal::from(amount),
            kind,
            category_id: "cat".to_string(),
            occurred_at: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            note: note.to_string(),
        }
    }

    fn snapshot(buffer: &StagingBuffer, id: StagingId) -> StagedTransaction {
        buffer.get(id).cloned().unwrap()
    }

    #[test]
    fn test_split_round_trips_merge() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(100, Kind::Expense, "Hotel"));
        let b = buffer.add(draft(50, Kind::Expense, "Taxi"));
        let (a0, b0) = (snapshot(&buffer, a), snapshot(&buffer, b));

        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        let outcome = split(&mut buffer, b).unwrap();
        assert_eq!(outcome.children, vec![a]);

        assert_eq!(snapshot(&buffer, b), b0);
        assert_eq!(snapshot(&buffer, a), a0);
        let order: Vec<StagingId> = buffer.items().iter().map(|i| i.staging_id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_split_round_trips_offset() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(30, Kind::Income, "Refund"));
        let b = buffer.add(draft(50, Kind::Expense, "Shoes"));
        let (a0, b0) = (snapshot(&buffer, a), snapshot(&buffer, b));

        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        split(&mut buffer, b).unwrap();
        assert_eq!(snapshot(&buffer, b), b0);
        assert_eq!(snapshot(&buffer, a), a0);
    }

    #[test]
    fn test_split_restores_documented_example() {
        // {amount:150, absorbed:[A(100)], prior:50} -> {50} and A(100)
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(100, Kind::Expense, "A"));
        let b = buffer.add(draft(50, Kind::Expense, "B"));
        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        assert_eq!(buffer.get(b).unwrap().amount, Decimal::from(150));

        split(&mut buffer, b).unwrap();
        let restored = buffer.get(b).unwrap();
        assert_eq!(restored.amount, Decimal::from(50));
        assert!(restored.absorbed_children.is_empty());
        assert!(restored.prior.is_none());
        assert_eq!(buffer.get(a).unwrap().amount, Decimal::from(100));
    }

    #[test]
    fn test_split_is_single_level() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(10, Kind::Expense, "A"));
        let b = buffer.add(draft(20, Kind::Expense, "B"));
        let c = buffer.add(draft(40, Kind::Expense, "C"));

        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        merge_staged(&mut buffer, b, c, RemainderPolicy::Preserve).unwrap();
        assert_eq!(buffer.len(), 1);

        split(&mut buffer, c).unwrap();
        assert_eq!(buffer.len(), 2);
        let child = buffer.get(b).unwrap();
        assert_eq!(child.amount, Decimal::from(30));
        assert_eq!(child.absorbed_children.len(), 1);
        assert_eq!(child.absorbed_children[0].staging_id, a);
        assert!(buffer.get(a).is_none());

        split(&mut buffer, b).unwrap();
        assert_eq!(buffer.len(), 3);
        let order: Vec<StagingId> = buffer.items().iter().map(|i| i.staging_id).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_split_after_multiple_merges_restores_original() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(10, Kind::Expense, "A"));
        let b = buffer.add(draft(25, Kind::Income, "B"));
        let c = buffer.add(draft(40, Kind::Expense, "C"));
        merge_staged(&mut buffer, a, c, RemainderPolicy::Preserve).unwrap();
        merge_staged(&mut buffer, b, c, RemainderPolicy::Preserve).unwrap();
        assert_eq!(buffer.get(c).unwrap().amount, Decimal::from(25));

        let outcome = split(&mut buffer, c).unwrap();
        assert_eq!(outcome.children, vec![a, b]);
        assert_eq!(buffer.get(c).unwrap().amount, Decimal::from(40));
        let total: Decimal = buffer.items().iter().map(|i| i.amount).sum();
        assert_eq!(total, Decimal::from(75));
    }

    #[test]
    fn test_split_drops_preserved_remainder() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(80, Kind::Income, "Cashback"));
        let b = buffer.add(draft(50, Kind::Expense, "Groceries"));
        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        assert_eq!(buffer.len(), 2);

        let outcome = split(&mut buffer, b).unwrap();
        assert_eq!(outcome.dropped_remainders.len(), 1);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(a).unwrap().amount, Decimal::from(80));
        assert_eq!(buffer.get(b).unwrap().amount, Decimal::from(50));
    }

    #[test]
    fn test_split_waits_for_remainder_with_merges_of_its_own() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(80, Kind::Income, "Cashback"));
        let b = buffer.add(draft(50, Kind::Expense, "Groceries"));
        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        let r = buffer.items()[1].staging_id;
        let d = buffer.add(draft(40, Kind::Income, "Gift"));
        merge_staged(&mut buffer, d, r, RemainderPolicy::Preserve).unwrap();
        let before = buffer.items().to_vec();

        let err = split(&mut buffer, b).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(buffer.items(), before.as_slice());

        split(&mut buffer, r).unwrap();
        split(&mut buffer, b).unwrap();
        assert_eq!(buffer.get(d).unwrap().amount, Decimal::from(40));
        assert_eq!(buffer.get(b).unwrap().amount, Decimal::from(50));
        assert!(buffer.get(r).is_none());
        assert_eq!(buffer.total(Kind::Income), Decimal::from(120));
    }

    #[test]
    fn test_split_waits_for_remainder_merged_elsewhere() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(80, Kind::Income, "Cashback"));
        let b = buffer.add(draft(50, Kind::Expense, "Groceries"));
        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        let r = buffer.items()[1].staging_id;
        let e = buffer.add(draft(10, Kind::Income, "Interest"));
        merge_staged(&mut buffer, r, e, RemainderPolicy::Preserve).unwrap();
        let before = buffer.items().to_vec();

        let err = split(&mut buffer, b).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(buffer.items(), before.as_slice());

        split(&mut buffer, e).unwrap();
        split(&mut buffer, b).unwrap();
        assert!(buffer.get(r).is_none());
        assert_eq!(buffer.get(e).unwrap().amount, Decimal::from(10));
        assert_eq!(buffer.total(Kind::Income), Decimal::from(90));
        assert_eq!(buffer.total(Kind::Expense), Decimal::from(50));
    }

    #[test]
    fn test_split_drops_remainder_folded_back_into_item() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(80, Kind::Income, "Cashback"));
        let b = buffer.add(draft(50, Kind::Expense, "Groceries"));
        merge_staged(&mut buffer, a, b, RemainderPolicy::Preserve).unwrap();
        let r = buffer.items()[1].staging_id;
        // Offsetting the remainder back into its origin leaves a second remainder.
        merge_staged(&mut buffer, r, b, RemainderPolicy::Preserve).unwrap();
        assert_eq!(buffer.len(), 2);

        let outcome = split(&mut buffer, b).unwrap();
        assert_eq!(outcome.children, vec![a]);
        assert_eq!(outcome.dropped_remainders.len(), 2);
        assert!(outcome.dropped_remainders.contains(&r));
        let order: Vec<StagingId> = buffer.items().iter().map(|i| i.staging_id).collect();
        assert_eq!(order, vec![b, a]);
        assert_eq!(buffer.total(Kind::Income), Decimal::from(80));
        assert_eq!(buffer.total(Kind::Expense), Decimal::from(50));
    }

    #[test]
    fn test_split_plain_item_is_rejected() {
        let mut buffer = StagingBuffer::new();
        let a = buffer.add(draft(10, Kind::Expense, "A"));
        let err = split(&mut buffer, a).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = split(&mut buffer, 77).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
