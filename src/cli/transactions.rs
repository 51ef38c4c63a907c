use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{parse_amount, parse_date, FieldArgs, Ledger};
use crate::error::{LedgerError, Result};
use crate::models::{Kind, TransactionPatch};
use crate::store::TransactionFilter;

pub struct ListArgs {
    pub kind: Option<Kind>,
    pub category: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub search: Option<String>,
}

pub fn list(args: ListArgs) -> Result<()> {
    let ledger = Ledger::open()?;

    let category_id = match args.category.as_deref() {
        Some(key) => Some(
            ledger
                .categories
                .all()
                .iter()
                .find(|c| c.id == key || c.name.eq_ignore_ascii_case(key))
                .map(|c| c.id.clone())
                .ok_or_else(|| LedgerError::NotFound(format!("category '{key}'")))?,
        ),
        None => None,
    };
    let filter = TransactionFilter {
        kind: args.kind,
        category_id,
        from: args.from_date.as_deref().map(parse_date).transpose()?,
        to: args.to_date.as_deref().map(parse_date).transpose()?,
        search: args.search,
    };
    let rows = ledger.store.query(&filter);

    if rows.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Kind", "Category", "Amount", "Note"]);
    for txn in &rows {
        let amount = match txn.kind {
            Kind::Income => ledger.money(txn.amount).green(),
            Kind::Expense => ledger.money(txn.amount).red(),
        };
        table.add_row(vec![
            Cell::new(&txn.id),
            Cell::new(txn.occurred_at),
            Cell::new(txn.kind),
            Cell::new(ledger.categories.name_of(&txn.category_id)),
            Cell::new(amount),
            Cell::new(&txn.note),
        ]);
    }
    println!("Transactions ({})\n{table}", rows.len());
    Ok(())
}

pub fn edit(id: &str, fields: FieldArgs) -> Result<()> {
    let mut ledger = Ledger::open()?;
    let current = ledger
        .store
        .get(id)
        .cloned()
        .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;

    let kind = fields.kind.unwrap_or(current.kind);
    let category_id = match fields.category.as_deref() {
        Some(key) => Some(ledger.category_id(Some(key), kind)?),
        // A kind change needs a category of the new kind.
        None if kind != current.kind => Some(ledger.category_id(None, kind)?),
        None => None,
    };
    let patch = TransactionPatch {
        amount: fields.amount.as_deref().map(parse_amount).transpose()?,
        kind: fields.kind,
        category_id,
        occurred_at: fields.date.as_deref().map(parse_date).transpose()?,
        note: fields.note,
    };
    if patch.is_empty() {
        return Err(LedgerError::Validation("Nothing to change".to_string()));
    }

    let updated = ledger.store.update(&mut ledger.kv, id, patch)?;
    println!(
        "Updated {}: {} {} {}",
        updated.id,
        updated.kind,
        ledger.money(updated.amount),
        ledger.categories.name_of(&updated.category_id)
    );
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let mut ledger = Ledger::open()?;
    let removed = ledger.store.delete(&mut ledger.kv, id)?;
    println!("Deleted {} ({} {})", removed.id, removed.kind, ledger.money(removed.amount));
    Ok(())
}
