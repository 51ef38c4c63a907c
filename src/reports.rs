use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::categories::CategoryBook;
use crate::error::{LedgerError, Result};
use crate::models::{Kind, Transaction};

// ---------------------------------------------------------------------------
// Date range helper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let from = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| LedgerError::Validation(format!("Invalid month {year}-{month:02}")))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| LedgerError::Validation(format!("Invalid month {year}-{month:02}")))?;
        Ok(Self {
            from,
            to: next.pred_opt().unwrap_or(from),
        })
    }

    pub fn year(year: i32) -> Result<Self> {
        match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year, 12, 31)) {
            (Some(from), Some(to)) => Ok(Self { from, to }),
            _ => Err(LedgerError::Validation(format!("Invalid year {year}"))),
        }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(LedgerError::Validation(format!(
                "--from {from} is after --to {to}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// Parse `YYYY-MM` into a month range.
pub fn parse_month(raw: &str) -> Result<DateRange> {
    let (y, m) = raw
        .split_once('-')
        .ok_or_else(|| LedgerError::Validation(format!("Expected YYYY-MM, got '{raw}'")))?;
    let year: i32 = y
        .parse()
        .map_err(|_| LedgerError::Validation(format!("Expected YYYY-MM, got '{raw}'")))?;
    let month: u32 = m
        .parse()
        .map_err(|_| LedgerError::Validation(format!("Expected YYYY-MM, got '{raw}'")))?;
    DateRange::month(year, month)
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category_id: String,
    pub name: String,
    pub kind: Kind,
    pub total: Decimal,
    /// Share of its kind's total, in percent, one decimal place.
    pub share: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub range: DateRange,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
    pub count: usize,
    pub categories: Vec<CategoryTotal>,
}

fn share(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part * Decimal::ONE_HUNDRED / whole).round_dp(1)
    }
}

pub fn summary(transactions: &[Transaction], categories: &CategoryBook, range: DateRange) -> Summary {
    let in_range: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| range.contains(t.occurred_at))
        .collect();

    let total_of = |kind: Kind| -> Decimal {
        in_range.iter().filter(|t| t.kind == kind).map(|t| t.amount).sum()
    };
    let income = total_of(Kind::Income);
    let expense = total_of(Kind::Expense);

    let mut rows: Vec<CategoryTotal> = Vec::new();
    for txn in &in_range {
        match rows
            .iter_mut()
            .find(|r| r.category_id == txn.category_id && r.kind == txn.kind)
        {
            Some(row) => {
                row.total += txn.amount;
                row.count += 1;
            }
            None => rows.push(CategoryTotal {
                category_id: txn.category_id.clone(),
                name: categories.name_of(&txn.category_id).to_string(),
                kind: txn.kind,
                total: txn.amount,
                share: Decimal::ZERO,
                count: 1,
            }),
        }
    }
    for row in &mut rows {
        let whole = if row.kind == Kind::Income { income } else { expense };
        row.share = share(row.total, whole);
    }
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));

    Summary {
        range,
        income,
        expense,
        balance: income - expense,
        count: in_range.len(),
        categories: rows,
    }
}

// ---------------------------------------------------------------------------
// Monthly / daily totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTotal {
    /// Month (1-12) or day of month (1-31).
    pub period: u32,
    pub income: Decimal,
    pub expense: Decimal,
}

impl PeriodTotal {
    pub fn net(&self) -> Decimal {
        self.income - self.expense
    }
}

fn add_to(row: &mut PeriodTotal, txn: &Transaction) {
    match txn.kind {
        Kind::Income => row.income += txn.amount,
        Kind::Expense => row.expense += txn.amount,
    }
}

pub fn monthly(transactions: &[Transaction], year: i32) -> Vec<PeriodTotal> {
    let mut rows: Vec<PeriodTotal> = (1..=12)
        .map(|m| PeriodTotal {
            period: m,
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
        })
        .collect();
    for txn in transactions.iter().filter(|t| t.occurred_at.year() == year) {
        add_to(&mut rows[txn.occurred_at.month0() as usize], txn);
    }
    rows
}

/// Per-day totals for one month; days without activity are omitted.
pub fn daily(transactions: &[Transaction], range: DateRange) -> Vec<PeriodTotal> {
    let mut rows: Vec<PeriodTotal> = Vec::new();
    let mut sorted: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| range.contains(t.occurred_at))
        .collect();
    sorted.sort_by_key(|t| t.occurred_at);
    for txn in sorted {
        let day = txn.occurred_at.day();
        if rows.last().map(|r| r.period) != Some(day) {
            rows.push(PeriodTotal {
                period: day,
                income: Decimal::ZERO,
                expense: Decimal::ZERO,
            });
        }
        if let Some(row) = rows.last_mut() {
            add_to(row, txn);
        }
    }
    rows
}
