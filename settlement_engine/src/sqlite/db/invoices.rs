use chrono::NaiveDate;
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{BankDetails, Invoice, InvoiceLineItem, InvoiceStatus, InvoiceTotals, NewInvoiceLine, Party, SettlementPeriod},
    traits::{EmailDelivery, SettlementError},
};

/// Atomically increments and returns the month's counter. The first call for a month returns 1.
pub async fn next_invoice_sequence(counter_key: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (value,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO invoice_counters (counter_key, value) VALUES ($1, 1)
        ON CONFLICT (counter_key) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(counter_key)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Invoice counter {counter_key} is now {value}");
    Ok(value)
}

pub struct InvoiceInsert<'a> {
    pub invoice_number: &'a str,
    pub payout_id: i64,
    pub merchant_id: &'a str,
    pub issue_date: NaiveDate,
    pub period: SettlementPeriod,
    pub recipient: &'a Party,
    pub issuer: &'a Party,
    pub currency: &'a str,
    pub totals: InvoiceTotals,
    pub due_date: NaiveDate,
    pub bank: &'a BankDetails,
}

pub async fn insert_invoice(invoice: InvoiceInsert<'_>, conn: &mut SqliteConnection) -> Result<Invoice, SettlementError> {
    let payout_id = invoice.payout_id;
    let result = sqlx::query_as(
        r#"
        INSERT INTO invoices (
            invoice_number,
            payout_id,
            merchant_id,
            issue_date,
            period_start,
            period_end,
            recipient,
            issuer,
            currency,
            net_amount,
            vat_rate,
            vat_amount,
            gross_amount,
            due_date,
            bank_details
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(invoice.invoice_number)
    .bind(invoice.payout_id)
    .bind(invoice.merchant_id)
    .bind(invoice.issue_date)
    .bind(invoice.period.from)
    .bind(invoice.period.to)
    .bind(Json(invoice.recipient))
    .bind(Json(invoice.issuer))
    .bind(invoice.currency)
    .bind(invoice.totals.net)
    .bind(invoice.totals.vat_rate)
    .bind(invoice.totals.vat_amount)
    .bind(invoice.totals.gross)
    .bind(invoice.due_date)
    .bind(Json(invoice.bank))
    .fetch_one(conn)
    .await;
    match result {
        Ok(invoice) => Ok(invoice),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() && e.message().contains("payout_id") => {
            Err(SettlementError::Conflict(format!("An invoice already exists for payout {payout_id}")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_line_items(
    invoice_id: i64,
    lines: &[NewInvoiceLine],
    conn: &mut SqliteConnection,
) -> Result<Vec<InvoiceLineItem>, sqlx::Error> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as(
            r#"
            INSERT INTO invoice_line_items (
                invoice_id,
                payment_id,
                service_date,
                description,
                quantity,
                unit_price,
                line_total,
                vat_rate
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(line.payment_id)
        .bind(line.service_date)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .bind(line.vat_rate)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

pub async fn fetch_invoice(id: i64, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_invoice_for_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE payout_id = $1").bind(payout_id).fetch_optional(conn).await
}

pub async fn fetch_invoices_for_merchant(
    merchant_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE merchant_id = $1 ORDER BY issue_date DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_line_items(invoice_id: i64, conn: &mut SqliteConnection) -> Result<Vec<InvoiceLineItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoice_line_items WHERE invoice_id = $1 ORDER BY id")
        .bind(invoice_id)
        .fetch_all(conn)
        .await
}

pub async fn set_document_path(id: i64, path: &str, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("UPDATE invoices SET document_path = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(path)
        .fetch_optional(conn)
        .await
}

pub async fn record_email_result(
    id: i64,
    result: &EmailDelivery,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    match result {
        EmailDelivery::Delivered => {
            sqlx::query_as(
                r#"
                UPDATE invoices SET
                    email_status = 'sent',
                    email_attempts = email_attempts + 1,
                    email_error = NULL,
                    emailed_at = CURRENT_TIMESTAMP,
                    status = CASE WHEN status = 'draft' THEN 'sent' ELSE status END,
                    sent_at = CASE WHEN status = 'draft' THEN CURRENT_TIMESTAMP ELSE sent_at END,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .fetch_optional(conn)
            .await
        },
        EmailDelivery::Failed(reason) => {
            sqlx::query_as(
                r#"
                UPDATE invoices SET
                    email_status = 'failed',
                    email_attempts = email_attempts + 1,
                    email_error = $2,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(reason)
            .fetch_optional(conn)
            .await
        },
    }
}

/// Moves the invoice to `status` if its current status is one of the allowed predecessors.
pub async fn transition_status(
    id: i64,
    status: InvoiceStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let stamp_column = match status {
        InvoiceStatus::Sent => "sent_at",
        InvoiceStatus::Paid => "paid_at",
        InvoiceStatus::Cancelled => "cancelled_at",
        InvoiceStatus::Dunning => "dunning_at",
        InvoiceStatus::Draft | InvoiceStatus::Overdue => return Ok(None),
    };
    let predecessors =
        status.allowed_predecessors().iter().map(|s| format!("'{}'", s.as_str())).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "UPDATE invoices SET status = $2, {stamp_column} = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = \
         $1 AND status IN ({predecessors}) RETURNING *"
    );
    sqlx::query_as(&sql).bind(id).bind(status).fetch_optional(conn).await
}

pub async fn delete_draft(id: i64, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("DELETE FROM invoices WHERE id = $1 AND status = 'draft' RETURNING *")
        .bind(id)
        .fetch_optional(conn)
        .await
}
