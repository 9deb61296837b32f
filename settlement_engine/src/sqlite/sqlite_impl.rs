//! `SqliteDatabase` is the concrete settlement backend.
//!
//! It implements every backend trait in [`crate::traits`]. Every trait method that writes runs in a transaction whose
//! first statement is a write, including single-statement `UPDATE ... RETURNING` calls. A `RETURNING` row read on a
//! bare pooled connection can leave that connection on an old read snapshot.
use std::fmt::Debug;

use chrono::{Days, Duration};
use log::*;
use settlement_common::Cents;
use sqlx::SqlitePool;

use super::db::{balances, db_url, invoices, merchants, new_pool, payments, payouts};
use crate::{
    db_types::{
        Invoice,
        InvoiceLineItem,
        InvoiceStatus,
        Merchant,
        MerchantProfile,
        NewPayment,
        NewPayout,
        Payment,
        PaymentStatus,
        Payout,
        PayoutStatus,
        Provider,
    },
    fees::FeeSplit,
    helpers::{build_line_items, counter_key, format_invoice_number, invoice_totals},
    traits::{
        BalanceAudit,
        EmailDelivery,
        EventApplication,
        InvoiceDraft,
        InvoiceManagement,
        MerchantManagement,
        MonthlyBreakdown,
        NormalizedEvent,
        PaymentLedger,
        PaymentOutcome,
        PayoutManagement,
        PendingSummary,
        RefundEntry,
        SettlementError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `STL_DATABASE_URL` (or the default location).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentLedger for SqliteDatabase {
    async fn record_intent(&self, payment: NewPayment, split: FeeSplit) -> Result<Payment, SettlementError> {
        if split.amount != payment.amount || split.platform_fee + split.business_fee != payment.amount {
            return Err(SettlementError::Validation(format!(
                "Fee split {} + {} does not add up to the payment amount {}",
                split.platform_fee, split.business_fee, payment.amount
            )));
        }
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, split, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Recorded payment intent {payment}");
        Ok(payment)
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(id, &mut conn).await?)
    }

    async fn fetch_payment_by_booking(&self, booking_id: &str) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_booking(booking_id, &mut conn).await?)
    }

    async fn fetch_payment_by_provider_ref(
        &self,
        provider: Provider,
        provider_ref: &str,
    ) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_provider_ref(provider, provider_ref, &mut conn).await?)
    }

    async fn attach_provider_ref(&self, id: i64, provider_ref: &str) -> Result<Payment, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::attach_provider_ref(id, provider_ref, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn mark_processing(&self, id: i64) -> Result<Payment, SettlementError> {
        let mut tx = self.pool.begin().await?;
        if let Some(p) = payments::mark_processing(id, &mut tx).await? {
            tx.commit().await?;
            return Ok(p);
        }
        let err = match payments::fetch_payment(id, &mut tx).await? {
            Some(p) => SettlementError::Conflict(format!("Payment {id} is already {}", p.status)),
            None => SettlementError::NotFound(format!("Payment {id} does not exist")),
        };
        tx.rollback().await?;
        Err(err)
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<Option<Payment>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::close_open_payment(id, PaymentStatus::Failed, Some(reason), &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn apply_provider_event(&self, event: &NormalizedEvent) -> Result<EventApplication, SettlementError> {
        let mut tx = self.pool.begin().await?;
        if !payments::record_provider_event(event, &mut tx).await? {
            debug!("🗃️ {} event {} has already been applied", event.provider, event.event_id);
            tx.rollback().await?;
            return Ok(EventApplication::Duplicate);
        }
        let payment = payments::fetch_payment_by_provider_ref(event.provider, &event.provider_ref, &mut tx).await?;
        let Some(payment) = payment else {
            tx.rollback().await?;
            return Err(SettlementError::NotFound(format!(
                "No {} payment with reference {}",
                event.provider, event.provider_ref
            )));
        };
        let result = match payments::transition_for_event(&payment, event, &mut tx).await? {
            Some(updated) => {
                match event.outcome {
                    PaymentOutcome::Succeeded => {
                        balances::credit_earnings(&updated.merchant_id, updated.business_fee, &mut tx).await?
                    },
                    PaymentOutcome::Refunded => {
                        balances::reverse_earnings(&updated.merchant_id, updated.business_fee, &mut tx).await?
                    },
                    _ => {},
                }
                EventApplication::Applied { payment: updated, outcome: event.outcome }
            },
            None => EventApplication::Ignored(payment),
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn record_refund(&self, id: i64, refund: RefundEntry) -> Result<Option<Payment>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let result = match payments::mark_refunded(id, &refund, false, &mut tx).await? {
            Some(payment) => {
                balances::reverse_earnings(&payment.merchant_id, payment.business_fee, &mut tx).await?;
                Some(payment)
            },
            None => None,
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_stale_open_payments(&self, older_than: Duration) -> Result<Vec<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_stale_open_payments(older_than, &mut conn).await?)
    }

    async fn payments_for_payout(&self, payout_id: i64) -> Result<Vec<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payments_for_payout(payout_id, &mut conn).await?)
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn create_payout(&self, payout: NewPayout) -> Result<(Payout, Vec<Payment>), SettlementError> {
        if !payout.period.is_valid() {
            return Err(SettlementError::Validation(format!("The settlement period {} is inverted", payout.period)));
        }
        if let Some(amount) = payout.amount {
            if !amount.is_positive() {
                return Err(SettlementError::Validation(format!("The payout amount must be positive, not {amount}")));
            }
        }
        let mut tx = self.pool.begin().await?;
        let shell = payouts::insert_payout(&payout, &mut tx).await?;
        let covered = payouts::claim_pending_payments(shell.id, &payout.merchant_id, &mut tx).await?;
        if covered.is_empty() {
            tx.rollback().await?;
            return Err(SettlementError::Validation(format!(
                "Merchant {} has no pending payments to pay out",
                payout.merchant_id
            )));
        }
        let currency = covered[0].currency.clone();
        if covered.iter().any(|p| p.currency != currency) {
            tx.rollback().await?;
            return Err(SettlementError::Validation(format!(
                "Merchant {} has pending payments in more than one currency",
                payout.merchant_id
            )));
        }
        let pending: Cents = covered.iter().map(|p| p.business_fee).sum();
        let amount = payout.amount.unwrap_or(pending);
        if amount > pending {
            tx.rollback().await?;
            return Err(SettlementError::Validation(format!(
                "requested amount {amount} exceeds pending balance {pending}"
            )));
        }
        if amount < pending {
            tx.rollback().await?;
            return Err(SettlementError::Validation(format!(
                "requested amount {amount} must equal the full pending balance {pending}, partial payouts are not \
                 supported"
            )));
        }
        let count = i64::try_from(covered.len()).unwrap_or(i64::MAX);
        let payout_row = payouts::set_payout_totals(shell.id, amount, &currency, count, &mut tx).await?;
        balances::reserve_for_payout(&payout.merchant_id, amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Created {payout_row}");
        Ok((payout_row, covered))
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(id, &mut conn).await?)
    }

    async fn start_payout(&self, id: i64) -> Result<Payout, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let Some(payout) = payouts::mark_started(id, &mut tx).await? else {
            let err = payouts::transition_error(id, "start", &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        Ok(payout)
    }

    async fn complete_payout(
        &self,
        id: i64,
        transaction_reference: &str,
        notes: Option<&str>,
    ) -> Result<Payout, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let Some(payout) = payouts::mark_completed(id, transaction_reference, notes, &mut tx).await? else {
            let err = payouts::transition_error(id, "complete", &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        payouts::mark_covered_payments_paid(id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Completed {payout}");
        Ok(payout)
    }

    async fn release_payout(
        &self,
        id: i64,
        status: PayoutStatus,
        reason: Option<&str>,
    ) -> Result<Payout, SettlementError> {
        let action = match status {
            PayoutStatus::Cancelled => "cancel",
            PayoutStatus::Failed => "fail",
            s => return Err(SettlementError::Validation(format!("A payout cannot be released into status {s}"))),
        };
        let mut tx = self.pool.begin().await?;
        let Some(payout) = payouts::mark_released(id, status, reason, &mut tx).await? else {
            let err = payouts::transition_error(id, action, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        let returned = payouts::return_covered_payments(id, &mut tx).await?;
        balances::release_reservation(&payout.merchant_id, payout.amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payout {id} is {status}. {} payments returned to the pending pool", returned.len());
        Ok(payout)
    }
}

impl InvoiceManagement for SqliteDatabase {
    async fn create_invoice(&self, draft: InvoiceDraft) -> Result<(Invoice, Vec<InvoiceLineItem>), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let sequence = invoices::next_invoice_sequence(&counter_key(draft.issue_date), &mut tx).await?;
        let payout = match payouts::fetch_payout(draft.payout_id, &mut tx).await? {
            Some(p) => p,
            None => {
                tx.rollback().await?;
                return Err(SettlementError::NotFound(format!("Payout {} does not exist", draft.payout_id)));
            },
        };
        if payout.status != PayoutStatus::Completed {
            tx.rollback().await?;
            return Err(SettlementError::Conflict(format!(
                "Payout {} is {}. Only completed payouts can be invoiced",
                payout.id, payout.status
            )));
        }
        let recipient = merchants::fetch_merchant(&payout.merchant_id, &mut tx).await?.and_then(|m| m.billing_party());
        let Some(recipient) = recipient else {
            tx.rollback().await?;
            return Err(SettlementError::Validation(format!(
                "Merchant {} has no billing profile. Add a legal name before issuing an invoice",
                payout.merchant_id
            )));
        };
        let covered = payments::fetch_payments_for_payout(payout.id, &mut tx).await?;
        let lines = build_line_items(&covered, draft.vat_rate);
        let net: Cents = lines.iter().map(|l| l.line_total).sum();
        let invoice_number = format_invoice_number(&draft.prefix, draft.issue_date, sequence);
        let due_date = u64::try_from(draft.payment_term_days)
            .ok()
            .and_then(|d| draft.issue_date.checked_add_days(Days::new(d)))
            .ok_or_else(|| SettlementError::Validation(format!("Invalid payment term: {}", draft.payment_term_days)))?;
        let insert = invoices::InvoiceInsert {
            invoice_number: &invoice_number,
            payout_id: payout.id,
            merchant_id: &payout.merchant_id,
            issue_date: draft.issue_date,
            period: payout.period(),
            recipient: &recipient,
            issuer: &draft.issuer,
            currency: &payout.currency,
            totals: invoice_totals(net, draft.vat_rate),
            due_date,
            bank: &draft.bank,
        };
        let invoice = match invoices::insert_invoice(insert, &mut tx).await {
            Ok(i) => i,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            },
        };
        let items = invoices::insert_line_items(invoice.id, &lines, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Issued invoice {} for payout {} ({} lines)", invoice.invoice_number, payout.id, items.len());
        Ok((invoice, items))
    }

    async fn fetch_invoice(&self, id: i64) -> Result<Option<Invoice>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoice(id, &mut conn).await?)
    }

    async fn fetch_invoice_for_payout(&self, payout_id: i64) -> Result<Option<Invoice>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoice_for_payout(payout_id, &mut conn).await?)
    }

    async fn fetch_line_items(&self, invoice_id: i64) -> Result<Vec<InvoiceLineItem>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_line_items(invoice_id, &mut conn).await?)
    }

    async fn set_document_path(&self, id: i64, path: &str) -> Result<Invoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::set_document_path(id, path, &mut tx).await?;
        tx.commit().await?;
        invoice.ok_or_else(|| SettlementError::NotFound(format!("Invoice {id} does not exist")))
    }

    async fn record_email_result(&self, id: i64, result: EmailDelivery) -> Result<Invoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::record_email_result(id, &result, &mut tx).await?;
        tx.commit().await?;
        invoice.ok_or_else(|| SettlementError::NotFound(format!("Invoice {id} does not exist")))
    }

    async fn update_invoice_status(&self, id: i64, status: InvoiceStatus) -> Result<Invoice, SettlementError> {
        if matches!(status, InvoiceStatus::Overdue | InvoiceStatus::Draft) {
            return Err(SettlementError::Validation(format!("An invoice cannot be set to {status}")));
        }
        let mut tx = self.pool.begin().await?;
        if let Some(invoice) = invoices::transition_status(id, status, &mut tx).await? {
            tx.commit().await?;
            return Ok(invoice);
        }
        let err = match invoices::fetch_invoice(id, &mut tx).await? {
            Some(i) => SettlementError::Conflict(format!(
                "Invoice {} cannot move from {} to {status}",
                i.invoice_number, i.status
            )),
            None => SettlementError::NotFound(format!("Invoice {id} does not exist")),
        };
        tx.rollback().await?;
        Err(err)
    }

    async fn delete_draft_invoice(&self, id: i64) -> Result<Invoice, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let Some(invoice) = invoices::delete_draft(id, &mut tx).await? else {
            let err = match invoices::fetch_invoice(id, &mut tx).await? {
                Some(i) => SettlementError::Conflict(format!(
                    "Invoice {} is {}. Only drafts can be deleted",
                    i.invoice_number, i.status
                )),
                None => SettlementError::NotFound(format!("Invoice {id} does not exist")),
            };
            tx.rollback().await?;
            return Err(err);
        };
        tx.commit().await?;
        info!("🗃️ Deleted draft invoice {}", invoice.invoice_number);
        Ok(invoice)
    }
}

impl MerchantManagement for SqliteDatabase {
    async fn fetch_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::fetch_merchant(merchant_id, &mut conn).await?)
    }

    async fn upsert_profile(&self, merchant_id: &str, profile: MerchantProfile) -> Result<Merchant, SettlementError> {
        if profile.legal_name.trim().is_empty() {
            return Err(SettlementError::Validation("A billing profile needs a legal name".into()));
        }
        let mut tx = self.pool.begin().await?;
        let merchant = merchants::upsert_profile(merchant_id, &profile, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Billing profile for {merchant_id} saved");
        Ok(merchant)
    }

    async fn pending_summary(&self, merchant_id: &str) -> Result<PendingSummary, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::pending_summary(merchant_id, &mut conn).await?)
    }

    async fn monthly_breakdown(&self, merchant_id: &str, year: i32) -> Result<Vec<MonthlyBreakdown>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::monthly_breakdown(merchant_id, year, &mut conn).await?)
    }

    async fn payout_history(&self, merchant_id: &str) -> Result<Vec<Payout>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payouts_for_merchant(merchant_id, &mut conn).await?)
    }

    async fn invoices_for_merchant(&self, merchant_id: &str) -> Result<Vec<Invoice>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoices_for_merchant(merchant_id, &mut conn).await?)
    }

    async fn merchant_ids(&self) -> Result<Vec<String>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::fetch_merchant_ids(&mut conn).await?)
    }

    async fn balance_audit(&self, merchant_id: &str) -> Result<BalanceAudit, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(merchants::balance_audit(merchant_id, &mut conn).await?)
    }
}
