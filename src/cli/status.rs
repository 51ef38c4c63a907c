use crate::cli::Ledger;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::Kind;
use crate::session::Session;
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = db_path(&settings);

    println!("User:       {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Remainders: {:?}", settings.remainder_policy);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `pocketbook init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let ledger = Ledger::open()?;
    let session = Session::load(&ledger.kv, ledger.policy())?;
    let count_of = |kind: Kind| ledger.store.all().iter().filter(|t| t.kind == kind).count();

    println!();
    println!("Transactions:  {}", ledger.store.len());
    println!("  Income:      {}", count_of(Kind::Income));
    println!("  Expense:     {}", count_of(Kind::Expense));
    println!("Categories:    {}", ledger.categories.all().len());
    println!("Staged:        {}", session.buffer.len());


    println!();
    for (key, bytes) in ledger.kv.sizes()? {
        println!("{:<14} {}", format!("{key}:"), format_bytes(bytes.max(0) as u64));
    }
    Ok(())
}
