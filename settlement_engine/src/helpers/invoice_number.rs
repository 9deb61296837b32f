use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Invoice numbers are unique per calendar month of the issue date: `PREFIX-YYYY-MM-NNNNN`.
pub fn format_invoice_number(prefix: &str, issue_date: NaiveDate, sequence: i64) -> String {
    format!("{prefix}-{:04}-{:02}-{sequence:05}", issue_date.year(), issue_date.month())
}

/// The key of the monthly counter row that numbers invoices issued on `issue_date`.
pub fn counter_key(issue_date: NaiveDate) -> String {
    format!("{:04}-{:02}", issue_date.year(), issue_date.month())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumberParts {
    pub prefix: String,
    pub year: i32,
    pub month: u32,
    pub sequence: i64,
}

fn invoice_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9]+)-(\d{4})-(\d{2})-(\d{5,})$").unwrap())
}

pub fn parse_invoice_number(number: &str) -> Option<InvoiceNumberParts> {
    let caps = invoice_number_regex().captures(number)?;
    let month = caps[3].parse().ok().filter(|m| (1..=12).contains(m))?;
    Some(InvoiceNumberParts {
        prefix: caps[1].to_string(),
        year: caps[2].parse().ok()?,
        month,
        sequence: caps[4].parse().ok()?,
    })
}
