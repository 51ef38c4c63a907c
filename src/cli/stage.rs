use std::io::Read;
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::entry::{print_commit_report, EntryArgs};
use crate::cli::{parse_amount, parse_date, today, FieldArgs, Ledger};
use crate::error::{LedgerError, Result};
use crate::merge::{MergeOutcome, MergeTarget};
use crate::models::{Kind, StagingId};
use crate::recognizer::{LineRecognizer, Recognizer, RecognizerInput};
use crate::session::Session;
use crate::staging::StagedField;

fn open() -> Result<(Ledger, Session)> {
    let ledger = Ledger::open()?;
    let session = Session::load(&ledger.kv, ledger.policy())?;
    Ok((ledger, session))
}

pub fn add(args: EntryArgs) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let draft = args.draft(&ledger)?;
    if draft.amount < rust_decimal::Decimal::ZERO {
        return Err(LedgerError::Validation("Amount cannot be negative".to_string()));
    }
    let id = session.stage(draft);
    session.save(&mut ledger.kv)?;
    println!("Staged #{id}");
    Ok(())
}

pub fn parse(text: Option<String>, file: Option<&Path>) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let items = LineRecognizer::new()?.recognize(&RecognizerInput::Text(text))?;
    let ids = session.stage_recognized(items, &ledger.categories, today())?;
    session.save(&mut ledger.kv)?;

    println!("Recognized {} item(s)", ids.len());
    print_batch(&ledger, &session);
    Ok(())
}

pub fn list() -> Result<()> {
    let (ledger, session) = open()?;
    print_batch(&ledger, &session);
    Ok(())
}

pub fn edit(id: StagingId, fields: FieldArgs) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let current = session
        .buffer
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::NotFound(format!("staged item #{id}")))?;

    let mut changes = Vec::new();
    if let Some(raw) = fields.amount.as_deref() {
        changes.push(StagedField::Amount(parse_amount(raw)?));
    }
    let kind = fields.kind.unwrap_or(current.kind);
    if let Some(kind) = fields.kind {
        changes.push(StagedField::Kind(kind));
    }
    match fields.category.as_deref() {
        Some(key) => changes.push(StagedField::Category(ledger.category_id(Some(key), kind)?)),
        None if kind != current.kind => changes.push(StagedField::Category(ledger.category_id(None, kind)?)),
        None => {}
    }
    if let Some(raw) = fields.date.as_deref() {
        changes.push(StagedField::Date(parse_date(raw)?));
    }
    if let Some(note) = fields.note {
        changes.push(StagedField::Note(note));
    }
    if changes.is_empty() {
        return Err(LedgerError::Validation("Nothing to change".to_string()));
    }

    for change in changes {
        session.edit(id, change)?;
    }
    session.save(&mut ledger.kv)?;
    println!("Updated #{id}");
    Ok(())
}

pub fn remove(id: StagingId) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let removed = session.remove(id)?;
    session.save(&mut ledger.kv)?;
    println!("Removed #{} ({})", removed.staging_id, ledger.money(removed.amount));
    Ok(())
}

pub fn merge(source: StagingId, into: Option<StagingId>, same_kind: bool) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let candidates = session.begin_merge(source, same_kind)?;

    let Some(target) = into else {
        session.cancel_merge();
        print_candidates(&ledger, &session, source, &candidates);
        return Ok(());
    };

    let outcome = session.confirm_merge(&MergeTarget::Staged(target), &ledger.store)?;
    session.save(&mut ledger.kv)?;
    match outcome {
        MergeOutcome::Merged { target, amount } => {
            println!("Merged #{source} into #{target}: {}", ledger.money(amount));
        }
        MergeOutcome::Offset {
            target,
            amount,
            excess,
            remainder,
        } => {
            println!("Offset #{target} by #{source}: {}", ledger.money(amount));
            match remainder {
                Some(id) => println!("{} #{id} ({})", "Remainder staged as".yellow(), ledger.money(excess)),
                None if !excess.is_zero() => {
                    println!("{}", format!("Excess {} discarded", ledger.money(excess)).yellow())
                }
                None => {}
            }
        }
        MergeOutcome::Linked { .. } => {}
    }
    Ok(())
}

pub fn link(source: StagingId, target: String) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    session.begin_merge(source, false)?;
    session.confirm_merge(&MergeTarget::Persisted(target.clone()), &ledger.store)?;
    session.save(&mut ledger.kv)?;
    println!("#{source} will offset {target} when the batch is committed");
    Ok(())
}

pub fn unlink(id: StagingId) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    session.unlink(id)?;
    session.save(&mut ledger.kv)?;
    println!("Unlinked #{id}");
    Ok(())
}

pub fn split(id: StagingId) -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let outcome = session.split(id)?;
    session.save(&mut ledger.kv)?;
    let children: Vec<String> = outcome.children.iter().map(|c| format!("#{c}")).collect();
    println!("Split #{}: restored {}", outcome.restored, children.join(", "));
    if !outcome.dropped_remainders.is_empty() {
        println!("Removed {} remainder item(s)", outcome.dropped_remainders.len());
    }
    Ok(())
}

pub fn commit() -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let report = session.commit(&mut ledger.store, &mut ledger.kv)?;
    print_commit_report(&ledger, &report);
    Ok(())
}

pub fn clear() -> Result<()> {
    let (mut ledger, mut session) = open()?;
    let count = session.buffer.len();
    session.discard();
    session.save(&mut ledger.kv)?;
    println!("Discarded {count} staged item(s)");
    Ok(())
}

fn print_batch(ledger: &Ledger, session: &Session) {
    if session.buffer.is_empty() {
        println!("The batch is empty.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Kind", "Category", "Amount", "Note", "Offsets"]);
    for item in session.buffer.items() {
        let mut id = item.staging_id.to_string();
        if item.is_merge_result() {
            id.push('*');
        }
        table.add_row(vec![
            Cell::new(id),
            Cell::new(item.occurred_at),
            Cell::new(item.kind),
            Cell::new(ledger.categories.name_of(&item.category_id)),
            Cell::new(ledger.money(item.amount)),
            Cell::new(&item.note),
            Cell::new(item.merge_target_id.as_deref().unwrap_or("")),
        ]);
    }
    println!("Batch ({} items, * = merged)\n{table}", session.buffer.len());
    println!(
        "Income {}   Expense {}",
        ledger.money(session.buffer.total(Kind::Income)).green(),
        ledger.money(session.buffer.total(Kind::Expense)).red()
    );
}

fn print_candidates(ledger: &Ledger, session: &Session, source: StagingId, staged: &[StagingId]) {
    let mut table = Table::new();
    table.set_header(vec!["Target", "Date", "Kind", "Amount", "Note"]);
    for item in staged.iter().filter_map(|id| session.buffer.get(*id)) {
        table.add_row(vec![
            Cell::new(format!("#{}", item.staging_id)),
            Cell::new(item.occurred_at),
            Cell::new(item.kind),
            Cell::new(ledger.money(item.amount)),
            Cell::new(&item.note),
        ]);
    }
    if let Some(item) = session.buffer.get(source) {
        for txn in ledger.store.offset_candidates(item.kind) {
            table.add_row(vec![
                Cell::new(&txn.id),
                Cell::new(txn.occurred_at),
                Cell::new(txn.kind),
                Cell::new(ledger.money(txn.amount)),
                Cell::new(&txn.note),
            ]);
        }
    }
    println!("Merge targets for #{source}\n{table}");
    println!("Use `stage merge {source} --into <#>` or `stage link {source} <id>`.");
}
