use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::db_types::{BankDetails, Invoice, InvoiceLineItem, Party};

pub const DEFAULT_INVOICE_PREFIX: &str = "INV";
pub const DEFAULT_VAT_RATE: i64 = 19;
pub const DEFAULT_PAYMENT_TERM_DAYS: i64 = 14;
pub const DEFAULT_DOCUMENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EMAIL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct InvoiceSettings {
    pub prefix: String,
    /// Whole percent.
    pub vat_rate: i64,
    pub payment_term_days: i64,
    /// The platform's own legal identity, printed as the invoice issuer.
    pub issuer: Party,
    pub bank: BankDetails,
    pub document_dir: PathBuf,
    /// If set, invoice emails link to `<public_url>/api/my/invoices/<id>/document`.
    pub public_url: Option<String>,
    pub document_timeout: Duration,
    pub email_timeout: Duration,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            vat_rate: DEFAULT_VAT_RATE,
            payment_term_days: DEFAULT_PAYMENT_TERM_DAYS,
            issuer: Party::default(),
            bank: BankDetails::default(),
            document_dir: PathBuf::from("data/invoices"),
            public_url: None,
            document_timeout: DEFAULT_DOCUMENT_TIMEOUT,
            email_timeout: DEFAULT_EMAIL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceWithLines {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLineItem>,
}

/// A downloadable invoice document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}
