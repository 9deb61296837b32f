//! Invoice documents: rendering with askama templates, and storage on disk keyed by invoice number.
mod render;
mod store;

pub use render::{render_invoice_document, render_invoice_email, InvoiceView};
pub use store::{DocumentStore, DocumentStoreError};
