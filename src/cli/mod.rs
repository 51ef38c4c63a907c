pub mod categories;
pub mod entry;
pub mod export;
pub mod init;
pub mod report;
pub mod stage;
pub mod status;
pub mod transactions;

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::categories::CategoryBook;
use crate::db::SqliteStore;
use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::merge::RemainderPolicy;
use crate::models::Kind;
use crate::settings::{db_path, load_settings, Settings};
use crate::store::TransactionStore;

/// Everything a command needs: settings, the open database and the loaded books.
pub(crate) struct Ledger {
    pub settings: Settings,
    pub kv: SqliteStore,
    pub store: TransactionStore,
    pub categories: CategoryBook,
}

impl Ledger {
    pub fn open() -> Result<Self> {
        let settings = load_settings();
        let path = db_path(&settings);
        if !path.exists() {
            return Err(LedgerError::Other(format!(
                "Database not found at {}. Run `pocketbook init` to set up.",
                path.display()
            )));
        }
        let kv = SqliteStore::open(&path)?;
        let store = TransactionStore::load(&kv)?;
        let categories = CategoryBook::load(&kv)?;
        Ok(Self {
            settings,
            kv,
            store,
            categories,
        })
    }

    pub fn money(&self, amount: Decimal) -> String {
        money(&self.settings.currency_symbol, amount)
    }

    pub fn policy(&self) -> RemainderPolicy {
        self.settings.remainder_policy
    }

    /// Category id for a user-supplied id or name; the kind's first category when omitted.
    pub fn category_id(&self, key: Option<&str>, kind: Kind) -> Result<String> {
        match key {
            Some(key) => Ok(self.categories.resolve(key, kind)?.id.clone()),
            None => self
                .categories
                .of_kind(kind)
                .first()
                .map(|c| c.id.clone())
                .ok_or_else(|| LedgerError::NotFound(format!("any {kind} category"))),
        }
    }
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned
        .trim()
        .parse()
        .map_err(|_| LedgerError::Validation(format!("'{raw}' is not an amount")))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| LedgerError::Validation(format!("Expected YYYY-MM-DD, got '{raw}'")))
}

pub(crate) fn date_or_today(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => parse_date(raw),
        None => Ok(today()),
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Parser)]
#[command(name = "pocketbook", about = "Personal income and expense ledger with batch entry.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up pocketbook: choose a data directory and initialize the database.
    Init {
        /// Path for pocketbook data (default: ~/Documents/pocketbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
    /// Save one transaction, optionally offsetting a saved one.
    Add {
        /// Amount, e.g. 12.50
        amount: String,
        #[arg(long, value_enum, default_value = "expense")]
        kind: Kind,
        /// Category id or name (default: first category of the kind)
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        note: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Id of a saved transaction of the opposite kind to offset
        #[arg(long)]
        offset: Option<String>,
    },
    /// List saved transactions, newest first.
    List {
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Category id or name
        #[arg(long)]
        category: Option<String>,
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Text to look for in notes
        #[arg(long)]
        search: Option<String>,
    },
    /// Edit a saved transaction.
    Edit {
        /// Transaction id (shown in `pocketbook list`)
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a saved transaction.
    Delete {
        /// Transaction id (shown in `pocketbook list`)
        id: String,
    },
    /// Build a batch of transactions before saving them together.
    Stage {
        #[command(subcommand)]
        command: StageCommands,
    },
    /// Manage categories.
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export saved transactions to CSV.
    Export {
        /// Output file path (default: <data_dir>/exports/transactions-YYYYMMDD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Optional field overrides shared by `edit` and `stage edit`.
#[derive(clap::Args, Debug, Default)]
pub struct FieldArgs {
    #[arg(long)]
    pub amount: Option<String>,
    #[arg(long, value_enum)]
    pub kind: Option<Kind>,
    /// Category id or name
    #[arg(long)]
    pub category: Option<String>,
    /// Date: YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Subcommand)]
pub enum StageCommands {
    /// Add an item to the batch.
    Add {
        amount: String,
        #[arg(long, value_enum, default_value = "expense")]
        kind: Kind,
        /// Category id or name (default: first category of the kind)
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        note: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Recognize items from text, one per line: `<amount> <merchant> [YYYY-MM-DD] [#category]`.
    Parse {
        /// Text to parse; reads --file or stdin when omitted
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show the batch.
    List,
    /// Edit a staged item.
    Edit {
        /// Staging id (shown in `pocketbook stage list`)
        id: u64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Remove a staged item.
    Remove { id: u64 },
    /// Merge a staged item into another staged item. Without --into, lists candidates.
    Merge {
        source: u64,
        /// Staging id of the target
        #[arg(long)]
        into: Option<u64>,
        /// Only offer targets of the same kind
        #[arg(long = "same-kind")]
        same_kind: bool,
    },
    /// Make a staged item offset a saved transaction when the batch is committed.
    Link {
        source: u64,
        /// Saved transaction id of the opposite kind
        target: String,
    },
    /// Drop a staged item's link to a saved transaction.
    Unlink { id: u64 },
    /// Undo the merges recorded on a staged item.
    Split { id: u64 },
    /// Save the batch.
    Commit,
    /// Discard the batch.
    Clear,
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List categories.
    List {
        #[arg(long, value_enum)]
        kind: Option<Kind>,
    },
    /// Add a category.
    Add {
        name: String,
        #[arg(long, value_enum, default_value = "expense")]
        kind: Kind,
        #[arg(long)]
        icon: Option<String>,
        /// Hex color, e.g. #f97316
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename a category.
    Rename { id: String, name: String },
    /// Remove a category.
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income, expense and balance with a per-category breakdown.
    Summary {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Month-by-month totals for a year.
    Monthly {
        /// Year (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Day-by-day totals for a month.
    Daily {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
    },
}
