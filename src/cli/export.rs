use std::io::Write;
use std::path::PathBuf;

use crate::categories::CategoryBook;
use crate::cli::Ledger;
use crate::error::Result;
use crate::models::Transaction;

fn default_path(ledger: &Ledger) -> PathBuf {
    let date = chrono::Local::now().format("%Y%m%d").to_string();
    PathBuf::from(&ledger.settings.data_dir)
        .join("exports")
        .join(format!("transactions-{date}.csv"))
}

/// Write transactions as CSV, oldest first.
pub(crate) fn write_csv<W: Write>(out: W, transactions: &[Transaction], categories: &CategoryBook) -> Result<usize> {
    let mut rows: Vec<&Transaction> = transactions.iter().collect();
    rows.sort_by_key(|t| t.occurred_at);

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["id", "date", "kind", "category", "amount", "note"])?;
    for txn in &rows {
        let date = txn.occurred_at.to_string();
        let amount = txn.amount.to_string();
        writer.write_record([
            txn.id.as_str(),
            date.as_str(),
            txn.kind.as_str(),
            categories.name_of(&txn.category_id),
            amount.as_str(),
            txn.note.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub fn run(output: Option<String>) -> Result<()> {
    let ledger = Ledger::open()?;
    let path = output.map(PathBuf::from).unwrap_or_else(|| default_path(&ledger));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&path)?;
    let count = write_csv(file, ledger.store.all(), &ledger.categories)?;
    println!("Wrote {count} transaction(s) to {}", path.display());
    Ok(())
}
