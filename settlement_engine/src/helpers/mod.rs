//! Pure helpers for invoice arithmetic and formatting. Nothing in here touches the database.
mod invoice_number;
mod line_items;
mod vat;

pub use invoice_number::{counter_key, format_invoice_number, parse_invoice_number, InvoiceNumberParts};
pub use line_items::build_line_items;
pub use vat::{invoice_totals, vat_for};
