use std::{fmt::Debug, path::Path};

use chrono::{NaiveDate, Utc};
use log::*;

use crate::{
    db_types::{Invoice, InvoiceLineItem, InvoiceStatus},
    documents::{render_invoice_document, render_invoice_email, DocumentStore, DocumentStoreError, InvoiceView},
    events::{EventProducers, InvoiceIssuedEvent},
    stl_api::invoice_objects::{InvoiceDocument, InvoiceSettings, InvoiceWithLines},
    traits::{EmailDelivery, EmailMessage, InvoiceDraft, InvoiceManagement, MailError, Mailer, SettlementError},
};

/// `InvoiceApi` issues invoices for completed payouts and manages their lifecycle.
///
/// Issuing is a three step affair. The invoice row is committed first; the document is then rendered and stored, and
/// finally the invoice is emailed. A failure in the last two steps is recorded on the invoice and can be retried with
/// [`InvoiceApi::regenerate_document`] and [`InvoiceApi::resend_email`]. It never undoes the invoice.
pub struct InvoiceApi<B, M> {
    db: B,
    mailer: M,
    store: DocumentStore,
    settings: InvoiceSettings,
    producers: EventProducers,
}

impl<B, M> Debug for InvoiceApi<B, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceApi ({})", self.store.root().display())
    }
}

impl<B, M> InvoiceApi<B, M> {
    pub fn new(db: B, mailer: M, settings: InvoiceSettings, producers: EventProducers) -> Self {
        let store = DocumentStore::new(settings.document_dir.clone());
        Self { db, mailer, store, settings, producers }
    }

    pub fn settings(&self) -> &InvoiceSettings {
        &self.settings
    }
}

impl<B, M> InvoiceApi<B, M>
where
    B: InvoiceManagement,
    M: Mailer,
{
    /// Issues the invoice for a completed payout, dated today.
    pub async fn create_for_payout(&self, payout_id: i64) -> Result<InvoiceWithLines, SettlementError> {
        self.create_for_payout_on(payout_id, Utc::now().date_naive()).await
    }

    /// Issues the invoice for a completed payout with the given issue date. The number is drawn from the issue date's
    /// monthly counter.
    pub async fn create_for_payout_on(
        &self,
        payout_id: i64,
        issue_date: NaiveDate,
    ) -> Result<InvoiceWithLines, SettlementError> {
        let draft = InvoiceDraft {
            payout_id,
            issue_date,
            prefix: self.settings.prefix.clone(),
            vat_rate: self.settings.vat_rate,
            payment_term_days: self.settings.payment_term_days,
            issuer: self.settings.issuer.clone(),
            bank: self.settings.bank.clone(),
        };
        let (invoice, lines) = self.db.create_invoice(draft).await?;
        info!(
            "🧾️ Invoice {} issued for payout {payout_id}: net {}, VAT {}, gross {}",
            invoice.invoice_number, invoice.net_amount, invoice.vat_amount, invoice.gross_amount
        );
        let invoice = match self.render_and_store(&invoice, &lines).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("🧾️ Invoice {} was issued, but its document could not be stored: {e}", invoice.invoice_number);
                invoice
            },
        };
        let invoice = self.deliver(invoice).await;
        self.producers.publish_invoice_issued(InvoiceIssuedEvent::new(invoice.clone())).await;
        Ok(InvoiceWithLines { invoice, lines })
    }

    pub async fn fetch_invoice(&self, id: i64) -> Result<Option<InvoiceWithLines>, SettlementError> {
        let Some(invoice) = self.db.fetch_invoice(id).await? else {
            return Ok(None);
        };
        let lines = self.db.fetch_line_items(id).await?;
        Ok(Some(InvoiceWithLines { invoice, lines }))
    }

    pub async fn fetch_invoice_for_payout(&self, payout_id: i64) -> Result<Option<Invoice>, SettlementError> {
        self.db.fetch_invoice_for_payout(payout_id).await
    }

    pub async fn update_status(&self, id: i64, status: InvoiceStatus) -> Result<Invoice, SettlementError> {
        let invoice = self.db.update_invoice_status(id, status).await?;
        info!("🧾️ Invoice {} is now {}", invoice.invoice_number, invoice.status);
        Ok(invoice)
    }

    /// Emails the invoice again, rendering its document first if there is none yet. The result is recorded on the
    /// invoice; inspect `email_status` to see how it went.
    pub async fn resend_email(&self, id: i64) -> Result<Invoice, SettlementError> {
        let invoice = self.require_invoice(id).await?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(SettlementError::Conflict(format!(
                "Invoice {} is cancelled and will not be sent",
                invoice.invoice_number
            )));
        }
        let invoice = if invoice.document_path.is_none() {
            let lines = self.db.fetch_line_items(id).await?;
            match self.render_and_store(&invoice, &lines).await {
                Ok(updated) => updated,
                Err(e) => {
                    warn!("🧾️ Invoice {} still has no document: {e}", invoice.invoice_number);
                    invoice
                },
            }
        } else {
            invoice
        };
        Ok(self.deliver(invoice).await)
    }

    /// Renders the document again from the stored invoice, replacing any previous file.
    pub async fn regenerate_document(&self, id: i64) -> Result<Invoice, SettlementError> {
        let invoice = self.require_invoice(id).await?;
        let lines = self.db.fetch_line_items(id).await?;
        let invoice = self.render_and_store(&invoice, &lines).await?;
        info!("🧾️ Document for invoice {} regenerated", invoice.invoice_number);
        Ok(invoice)
    }

    /// Deletes a draft invoice and its document.
    pub async fn delete_invoice(&self, id: i64) -> Result<Invoice, SettlementError> {
        let invoice = self.db.delete_draft_invoice(id).await?;
        if let Some(path) = &invoice.document_path {
            if let Err(e) = self.store.remove(Path::new(path)).await {
                warn!("🧾️ Invoice {} was deleted, but its document {path} could not be removed: {e}", invoice.invoice_number);
            }
        }
        Ok(invoice)
    }

    /// Loads the rendered document for download.
    pub async fn document(&self, id: i64) -> Result<InvoiceDocument, SettlementError> {
        let invoice = self.require_invoice(id).await?;
        let path = invoice.document_path.as_deref().ok_or_else(|| {
            SettlementError::NotFound(format!("Invoice {} has no rendered document", invoice.invoice_number))
        })?;
        let bytes = self.store.load(Path::new(path)).await.map_err(|e| match e {
            DocumentStoreError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                SettlementError::NotFound(format!("The document for invoice {} is missing", invoice.invoice_number))
            },
            e => SettlementError::DocumentError(e.to_string()),
        })?;
        Ok(InvoiceDocument { filename: invoice.document_filename(), content_type: "text/html; charset=utf-8", bytes })
    }

    async fn render_and_store(&self, invoice: &Invoice, lines: &[InvoiceLineItem]) -> Result<Invoice, SettlementError> {
        let html = render_invoice_document(&InvoiceView { invoice, lines })?;
        let saved = tokio::time::timeout(self.settings.document_timeout, self.store.save(&invoice.invoice_number, &html))
            .await
            .map_err(|_| SettlementError::DocumentError("Storing the document timed out".into()))?
            .map_err(|e| SettlementError::DocumentError(e.to_string()))?;
        self.db.set_document_path(invoice.id, &saved.to_string_lossy()).await
    }

    /// Emails the invoice and records the outcome. Never fails; the outcome is on the returned invoice.
    async fn deliver(&self, invoice: Invoice) -> Invoice {
        let outcome = self.send_email(&invoice).await;
        match &outcome {
            EmailDelivery::Delivered => info!("📧️ Invoice {} emailed", invoice.invoice_number),
            EmailDelivery::Failed(e) => warn!("📧️ Invoice {} could not be emailed: {e}", invoice.invoice_number),
        }
        match self.db.record_email_result(invoice.id, outcome).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("📧️ Could not record the email result for invoice {}: {e}", invoice.invoice_number);
                invoice
            },
        }
    }

    async fn send_email(&self, invoice: &Invoice) -> EmailDelivery {
        let Some(to) = invoice.recipient.email.clone().filter(|e| !e.trim().is_empty()) else {
            return EmailDelivery::Failed("The recipient has no email address".into());
        };
        let link = self.settings.public_url.as_ref().map(|base| {
            format!("{}/api/my/invoices/{}/document", base.trim_end_matches('/'), invoice.id)
        });
        let html_body = match render_invoice_email(invoice, link) {
            Ok(body) => body,
            Err(e) => return EmailDelivery::Failed(e.to_string()),
        };
        let message = EmailMessage { to, subject: format!("Ihre Rechnung {}", invoice.invoice_number), html_body };
        match tokio::time::timeout(self.settings.email_timeout, self.mailer.send(&message)).await {
            Ok(Ok(())) => EmailDelivery::Delivered,
            Ok(Err(e)) => EmailDelivery::Failed(e.to_string()),
            Err(_) => EmailDelivery::Failed(MailError::Timeout.to_string()),
        }
    }

    async fn require_invoice(&self, id: i64) -> Result<Invoice, SettlementError> {
        self.db.fetch_invoice(id).await?.ok_or_else(|| SettlementError::NotFound(format!("Invoice {id} does not exist")))
    }
}
