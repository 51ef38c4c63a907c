use colored::Colorize;

use crate::cli::{date_or_today, parse_amount, Ledger};
use crate::commit::CommitReport;
use crate::error::Result;
use crate::models::{Kind, NewTransaction};
use crate::session::Session;

pub struct EntryArgs {
    pub amount: String,
    pub kind: Kind,
    pub category: Option<String>,
    pub note: String,
    pub date: Option<String>,
}

impl EntryArgs {
    pub(crate) fn draft(&self, ledger: &Ledger) -> Result<NewTransaction> {
        Ok(NewTransaction {
            amount: parse_amount(&self.amount)?,
            kind: self.kind,
            category_id: ledger.category_id(self.category.as_deref(), self.kind)?,
            occurred_at: date_or_today(self.date.as_deref())?,
            note: self.note.trim().to_string(),
        })
    }
}

/// Single-entry save, the `add` command.
pub fn add(args: EntryArgs, offset: Option<String>) -> Result<()> {
    let mut ledger = Ledger::open()?;
    let draft = args.draft(&ledger)?;

    let mut session = Session::new(ledger.policy());
    session.merge_enabled = offset.is_some();
    session.merge_target = offset;
    let report = session.save_entry(&mut ledger.store, &mut ledger.kv, draft)?;

    print_commit_report(&ledger, &report);
    Ok(())
}

pub(crate) fn print_commit_report(ledger: &Ledger, report: &CommitReport) {
    for txn in &report.inserted {
        println!(
            "{} {} {} {} ({})",
            "Saved".green(),
            txn.kind,
            ledger.money(txn.amount),
            ledger.categories.name_of(&txn.category_id),
            txn.id
        );
    }
    for offset in &report.offsets {
        let line = format!(
            "Offset {}: {} -> {}",
            offset.target_id,
            ledger.money(offset.previous),
            ledger.money(offset.amount)
        );
        if offset.excess.is_zero() {
            println!("{}", line.cyan());
        } else {
            println!("{} (excess {})", line.cyan(), ledger.money(offset.excess));
        }
    }
    for txn in &report.remainders {
        println!(
            "{} {} {} ({})",
            "Remainder".yellow(),
            txn.kind,
            ledger.money(txn.amount),
            txn.id
        );
    }
    if report.discarded > 0 {
        println!(
            "{}",
            format!("Dropped {} item(s) with a zero amount", report.discarded).yellow()
        );
    }
}
