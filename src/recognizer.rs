use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;

use crate::categories::CategoryBook;
use crate::error::{LedgerError, Result};
use crate::models::{Kind, NewTransaction, StagingId};
use crate::staging::StagingBuffer;

pub enum RecognizerInput {
    Text(String),
    Image(Vec<u8>),
}

/// One candidate transaction pulled out of free text or a receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedItem {
    pub amount: Decimal,
    pub merchant: String,
    pub date: Option<NaiveDate>,
    pub category_suggestion: Option<String>,
    pub kind: Option<Kind>,
}

/// Turns user input into candidate transactions. Results are unordered and unbounded.
pub trait Recognizer {
    fn recognize(&self, input: &RecognizerInput) -> Result<Vec<RecognizedItem>>;
}

/// Offline recognizer: one transaction per line.
///
/// `<amount> <merchant> [YYYY-MM-DD] [#category]`, with a leading `+` for income.
pub struct LineRecognizer {
    line: Regex,
    date: Regex,
    tag: Regex,
}

impl LineRecognizer {
    pub fn new() -> Result<Self> {
        let build = |pattern: &str| Regex::new(pattern).map_err(|e| LedgerError::Other(e.to_string()));
        Ok(Self {
            line: build(r"^\s*(?P<sign>[+-])?\s*[$€£¥]?(?P<amount>\d[\d,]*(?:\.\d+)?)\s*(?P<rest>.*)$")?,
            date: build(r"\b(\d{4}-\d{2}-\d{2})\b")?,
            tag: build(r"#(\S+)")?,
        })
    }

    fn parse_line(&self, line: &str) -> Option<RecognizedItem> {
        let caps = self.line.captures(line)?;
        let amount: Decimal = caps["amount"].replace(',', "").parse().ok()?;
        let kind = match caps.name("sign").map(|m| m.as_str()) {
            Some("+") => Some(Kind::Income),
            Some("-") => Some(Kind::Expense),
            _ => None,
        };

        let mut rest = caps["rest"].to_string();
        let date = self
            .date
            .captures(&rest)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok());
        let category_suggestion = self.tag.captures(&rest).map(|c| c[1].replace('_', " "));
        rest = self.date.replace_all(&rest, "").to_string();
        rest = self.tag.replace_all(&rest, "").to_string();

        Some(RecognizedItem {
            amount,
            merchant: rest.split_whitespace().collect::<Vec<_>>().join(" "),
            date,
            category_suggestion,
            kind,
        })
    }
}

impl Recognizer for LineRecognizer {
    fn recognize(&self, input: &RecognizerInput) -> Result<Vec<RecognizedItem>> {
        match input {
            RecognizerInput::Text(text) => Ok(text.lines().filter_map(|l| self.parse_line(l)).collect()),
            RecognizerInput::Image(_) => Err(LedgerError::Other(
                "Image recognition is not available offline; enter the items as text".to_string(),
            )),
        }
    }
}

/// Put recognized items into the batch. Category comes from the suggestion
/// (or the merchant when there is none); a missing date means `today`.
pub fn stage_recognized(
    buffer: &mut StagingBuffer,
    items: Vec<RecognizedItem>,
    categories: &CategoryBook,
    today: NaiveDate,
) -> Result<Vec<StagingId>> {
    if items.is_empty() {
        return Err(LedgerError::NothingRecognized);
    }
    // Resolve every category before touching the buffer so a failure stages nothing.
    let mut drafts = Vec::new();
    for item in items {
        if item.amount <= Decimal::ZERO {
            debug!("skipping recognized item with amount {}", item.amount);
            continue;
        }
        let kind = item.kind.unwrap_or(Kind::Expense);
        let hint = item.category_suggestion.as_deref().unwrap_or(&item.merchant);
        let category_id = categories
            .best_match(hint, kind)
            .map(|c| c.id.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("any {kind} category")))?;
        drafts.push(NewTransaction {
            amount: item.amount,
            kind,
            category_id,
            occurred_at: item.date.unwrap_or(today),
            note: item.merchant,
        });
    }
    let ids: Vec<StagingId> = drafts.into_iter().map(|d| buffer.add(d)).collect();
    if ids.is_empty() {
        return Err(LedgerError::NothingRecognized);
    }
    Ok(ids)
}
