use chrono::Datelike;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::cli::{parse_date, today, Ledger};
use crate::error::Result;
use crate::models::Kind;
use crate::reports::{self, parse_month, DateRange, PeriodTotal};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn signed(ledger: &Ledger, amount: Decimal) -> String {
    if amount >= Decimal::ZERO {
        ledger.money(amount).green().to_string()
    } else {
        ledger.money(amount).red().to_string()
    }
}

fn resolve_range(month: Option<String>, from_date: Option<String>, to_date: Option<String>) -> Result<DateRange> {
    match (month, from_date, to_date) {
        (Some(month), _, _) => parse_month(&month),
        (None, Some(from), Some(to)) => DateRange::between(parse_date(&from)?, parse_date(&to)?),
        (None, Some(from), None) => DateRange::between(parse_date(&from)?, today()),
        (None, None, Some(to)) => {
            let to = parse_date(&to)?;
            DateRange::month(to.year(), to.month()).and_then(|r| DateRange::between(r.from, to))
        }
        (None, None, None) => {
            let now = today();
            DateRange::month(now.year(), now.month())
        }
    }
}

pub fn summary(month: Option<String>, from_date: Option<String>, to_date: Option<String>) -> Result<()> {
    let ledger = Ledger::open()?;
    let range = resolve_range(month, from_date, to_date)?;
    let s = reports::summary(ledger.store.all(), &ledger.categories, range);

    let mut table = Table::new();
    table.set_header(vec!["Category", "Count", "Amount", "Share"]);

    for (kind, label, total) in [
        (Kind::Income, "INCOME".green().bold(), s.income),
        (Kind::Expense, "EXPENSES".red().bold(), s.expense),
    ] {
        let rows: Vec<_> = s.categories.iter().filter(|c| c.kind == kind).collect();
        if rows.is_empty() {
            continue;
        }
        table.add_row(vec![Cell::new(label), Cell::new(""), Cell::new(""), Cell::new("")]);
        for row in rows {
            table.add_row(vec![
                Cell::new(format!("  {}", row.name)),
                Cell::new(row.count),
                Cell::new(ledger.money(row.total)),
                Cell::new(format!("{}%", row.share)),
            ]);
        }
        table.add_row(vec![
            Cell::new(format!("Total {kind}").as_str().bold()),
            Cell::new(""),
            Cell::new(ledger.money(total)),
            Cell::new(""),
        ]);
    }
    table.add_row(vec![
        Cell::new("BALANCE".bold()),
        Cell::new(s.count),
        Cell::new(signed(&ledger, s.balance)),
        Cell::new(""),
    ]);

    println!("Summary {} to {}\n{table}", s.range.from, s.range.to);
    Ok(())
}

fn print_periods(ledger: &Ledger, title: &str, header: &str, rows: &[PeriodTotal], label: impl Fn(u32) -> String) {
    let mut table = Table::new();
    table.set_header(vec![header, "Income", "Expense", "Net"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(label(row.period)),
            Cell::new(ledger.money(row.income)),
            Cell::new(ledger.money(row.expense)),
            Cell::new(signed(ledger, row.net())),
        ]);
    }
    let income: Decimal = rows.iter().map(|r| r.income).sum();
    let expense: Decimal = rows.iter().map(|r| r.expense).sum();
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(ledger.money(income)),
        Cell::new(ledger.money(expense)),
        Cell::new(signed(ledger, income - expense)),
    ]);
    println!("{title}\n{table}");
}

pub fn monthly(year: Option<i32>) -> Result<()> {
    let ledger = Ledger::open()?;
    let year = year.unwrap_or_else(|| today().year());
    let rows = reports::monthly(ledger.store.all(), year);
    print_periods(&ledger, &format!("Monthly totals {year}"), "Month", &rows, |m| {
        MONTHS[(m as usize).saturating_sub(1) % 12].to_string()
    });
    Ok(())
}

pub fn daily(month: &str) -> Result<()> {
    let ledger = Ledger::open()?;
    let range = parse_month(month)?;
    let rows = reports::daily(ledger.store.all(), range);
    if rows.is_empty() {
        println!("No transactions in {month}.");
        return Ok(());
    }
    print_periods(&ledger, &format!("Daily totals {month}"), "Day", &rows, |d| {
        format!("{month}-{d:02}")
    });
    Ok(())
}
