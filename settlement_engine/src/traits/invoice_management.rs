use crate::{
    db_types::{Invoice, InvoiceLineItem, InvoiceStatus},
    traits::{
        data_objects::{EmailDelivery, InvoiceDraft},
        SettlementError,
    },
};

#[allow(async_fn_in_trait)]
pub trait InvoiceManagement: Clone {
    /// Issues a `draft` invoice for a completed payout, numbered from the month's atomic counter.
    ///
    /// Fails with `Conflict` if the payout is not completed or already has an invoice, `NotFound` if the payout does
    /// not exist, and `Validation` if the merchant has no billing profile.
    async fn create_invoice(&self, draft: InvoiceDraft) -> Result<(Invoice, Vec<InvoiceLineItem>), SettlementError>;

    async fn fetch_invoice(&self, id: i64) -> Result<Option<Invoice>, SettlementError>;

    async fn fetch_invoice_for_payout(&self, payout_id: i64) -> Result<Option<Invoice>, SettlementError>;

    async fn fetch_line_items(&self, invoice_id: i64) -> Result<Vec<InvoiceLineItem>, SettlementError>;

    async fn set_document_path(&self, id: i64, path: &str) -> Result<Invoice, SettlementError>;

    /// Records an email attempt. A successful delivery of a `draft` invoice also moves it to `sent`.
    async fn record_email_result(&self, id: i64, result: EmailDelivery) -> Result<Invoice, SettlementError>;

    /// Moves the invoice along `draft -> sent -> {paid, cancelled, dunning}`, `dunning -> {paid, cancelled}`.
    async fn update_invoice_status(&self, id: i64, status: InvoiceStatus) -> Result<Invoice, SettlementError>;

    /// Deletes a `draft` invoice with its line items and returns it. Any other status is a `Conflict`.
    async fn delete_draft_invoice(&self, id: i64) -> Result<Invoice, SettlementError>;
}
