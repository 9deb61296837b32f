use askama::Template;

use crate::{
    db_types::{BankDetails, Invoice, InvoiceLineItem, Party},
    traits::SettlementError,
};

const DATE_FORMAT: &str = "%d.%m.%Y";

struct LineView {
    date: String,
    description: String,
    quantity: i64,
    unit_price: String,
    vat_rate: i64,
    total: String,
}

#[derive(Template)]
#[template(path = "invoice.html")]
struct InvoiceDocument<'a> {
    number: &'a str,
    issue_date: String,
    period: String,
    due_date: String,
    issuer: &'a Party,
    recipient: &'a Party,
    bank: &'a BankDetails,
    currency: &'a str,
    lines: Vec<LineView>,
    net: String,
    vat_rate: i64,
    vat: String,
    gross: String,
}

#[derive(Template)]
#[template(path = "invoice_email.html")]
struct InvoiceEmail<'a> {
    recipient_name: &'a str,
    issuer_name: &'a str,
    number: &'a str,
    issue_date: String,
    period: String,
    due_date: String,
    gross: String,
    currency: &'a str,
    document_link: Option<String>,
}

/// An invoice with its line items, as needed for rendering.
pub struct InvoiceView<'a> {
    pub invoice: &'a Invoice,
    pub lines: &'a [InvoiceLineItem],
}

/// Renders the full invoice document with every legally required field.
pub fn render_invoice_document(view: &InvoiceView<'_>) -> Result<String, SettlementError> {
    let invoice = view.invoice;
    let lines = view
        .lines
        .iter()
        .map(|l| LineView {
            date: l.service_date.format(DATE_FORMAT).to_string(),
            description: l.description.clone(),
            quantity: l.quantity,
            unit_price: l.unit_price.to_string(),
            vat_rate: l.vat_rate,
            total: l.line_total.to_string(),
        })
        .collect();
    let doc = InvoiceDocument {
        number: &invoice.invoice_number,
        issue_date: invoice.issue_date.format(DATE_FORMAT).to_string(),
        period: invoice.period().to_string(),
        due_date: invoice.due_date.format(DATE_FORMAT).to_string(),
        issuer: &invoice.issuer.0,
        recipient: &invoice.recipient.0,
        bank: &invoice.bank_details.0,
        currency: &invoice.currency,
        lines,
        net: invoice.net_amount.to_string(),
        vat_rate: invoice.vat_rate,
        vat: invoice.vat_amount.to_string(),
        gross: invoice.gross_amount.to_string(),
    };
    doc.render().map_err(|e| SettlementError::DocumentError(e.to_string()))
}

/// Renders the HTML body of the invoice email. `document_link` is included when the document can be downloaded.
pub fn render_invoice_email(invoice: &Invoice, document_link: Option<String>) -> Result<String, SettlementError> {
    let email = InvoiceEmail {
        recipient_name: &invoice.recipient.legal_name,
        issuer_name: &invoice.issuer.legal_name,
        number: &invoice.invoice_number,
        issue_date: invoice.issue_date.format(DATE_FORMAT).to_string(),
        period: invoice.period().to_string(),
        due_date: invoice.due_date.format(DATE_FORMAT).to_string(),
        gross: invoice.gross_amount.to_string(),
        currency: &invoice.currency,
        document_link,
    };
    email.render().map_err(|e| SettlementError::DocumentError(e.to_string()))
}
