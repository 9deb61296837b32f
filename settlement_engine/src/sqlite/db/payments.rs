use chrono::Duration;
use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, Payment, PaymentPayoutStatus, PaymentStatus, Provider},
    fees::FeeSplit,
    traits::{NormalizedEvent, PaymentOutcome, RefundEntry, SettlementError},
};

pub async fn insert_payment(
    payment: NewPayment,
    split: FeeSplit,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let booking_id = payment.booking_id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (
                booking_id,
                payer_id,
                merchant_id,
                amount,
                currency,
                platform_fee,
                business_fee,
                provider
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.booking_id)
    .bind(payment.payer_id)
    .bind(payment.merchant_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(split.platform_fee)
    .bind(split.business_fee)
    .bind(payment.provider)
    .fetch_one(conn)
    .await;
    match result {
        Ok(payment) => Ok(payment),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SettlementError::Conflict(format!("A payment for booking {booking_id} already exists")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payment_by_booking(
    booking_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1").bind(booking_id).fetch_optional(conn).await
}

pub async fn fetch_payment_by_provider_ref(
    provider: Provider,
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE provider = $1 AND provider_ref = $2")
        .bind(provider)
        .bind(provider_ref)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_payments_for_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE payout_id = $1 ORDER BY id").bind(payout_id).fetch_all(conn).await
}

pub async fn fetch_stale_open_payments(
    older_than: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM payments
        WHERE status IN ('pending', 'processing')
        AND unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at) >= $1
        ORDER BY id
        "#,
    )
    .bind(older_than.num_seconds())
    .fetch_all(conn)
    .await
}

/// Attaches the provider reference. A `pending` entry moves to `processing`; any other status is left alone.
pub async fn attach_provider_ref(
    id: i64,
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, SettlementError> {
    let payment = sqlx::query_as(
        r#"
        UPDATE payments SET
            provider_ref = $2,
            status = CASE WHEN status = 'pending' THEN 'processing' ELSE status END,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(provider_ref)
    .fetch_optional(conn)
    .await?;
    payment.ok_or_else(|| SettlementError::NotFound(format!("Payment {id} does not exist")))
}

/// `pending -> processing`, touching `updated_at` even if the entry was already `processing`.
pub async fn mark_processing(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET status = 'processing', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Records the payer's approval of a payment that still has to be captured. Applies once per payment, so a repeated
/// approval does not lead to a second capture.
pub async fn mark_approved(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET status = 'processing', approved_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('pending', 'processing') AND approved_at IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Conditionally moves an open payment to a terminal failure state.
pub async fn close_open_payment(
    id: i64,
    status: PaymentStatus,
    reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET status = $2, failure_reason = $3, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(reason)
    .fetch_optional(conn)
    .await
}

/// The conditional `pending | processing -> succeeded` transition. Returns `None` if another caller got there first, or
/// the payment is no longer open. The caller must credit the merchant if and only if this returns a payment.
pub async fn mark_succeeded(
    id: i64,
    charge_ref: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET
            status = 'succeeded',
            provider_charge_ref = COALESCE($2, provider_charge_ref),
            failure_reason = NULL,
            succeeded_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(charge_ref)
    .fetch_optional(conn)
    .await
}

/// The conditional `succeeded -> refunded` transition. Refunds of payments in a payout that is still in flight are
/// refused here (`None`) unless `allow_in_payout` is set, which is the case for refunds the provider already executed.
pub async fn mark_refunded(
    id: i64,
    refund: &RefundEntry,
    allow_in_payout: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET
            status = 'refunded',
            refund_id = $2,
            refund_amount = $3,
            refund_reason = $4,
            refunded_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'succeeded' AND ($5 OR payout_status <> 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&refund.refund_id)
    .bind(refund.amount)
    .bind(&refund.reason)
    .bind(allow_in_payout)
    .fetch_optional(conn)
    .await
}

/// Records the event id. Returns `false` if the event has already been recorded.
pub async fn record_provider_event(event: &NormalizedEvent, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO provider_events (provider, event_id, provider_ref, outcome) VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(event.provider)
    .bind(&event.event_id)
    .bind(&event.provider_ref)
    .bind(event.outcome.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Applies the status change an event implies, *without* touching balances. Returns the updated payment if the
/// transition happened.
pub async fn transition_for_event(
    payment: &Payment,
    event: &NormalizedEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let updated = match event.outcome {
        PaymentOutcome::Succeeded => mark_succeeded(payment.id, event.charge_ref.as_deref(), conn).await?,
        PaymentOutcome::RequiresCapture => mark_approved(payment.id, conn).await?,
        PaymentOutcome::Failed | PaymentOutcome::Cancelled => {
            let reason = event.failure_reason.as_deref().or(Some(event.outcome.as_str()));
            close_open_payment(payment.id, event.outcome.target_status(), reason, conn).await?
        },
        PaymentOutcome::Refunded => {
            if payment.payout_status != PaymentPayoutStatus::Pending {
                warn!(
                    "🗃️ Provider refunded payment {} which is already in payout {:?} ({}). The merchant balance will be \
                     reduced below what has been reserved.",
                    payment.id, payment.payout_id, payment.payout_status
                );
            }
            let refund = RefundEntry {
                refund_id: event.refund_id.clone().unwrap_or_else(|| event.event_id.clone()),
                amount: payment.amount,
                reason: event.failure_reason.clone().unwrap_or_else(|| "Refunded at the payment provider".into()),
            };
            mark_refunded(payment.id, &refund, true, conn).await?
        },
    };
    if updated.is_some() {
        debug!("🗃️ Payment {} moved from {} to {}", payment.id, payment.status, event.outcome.target_status());
    } else {
        trace!("🗃️ Event {} does not apply to payment {} in status {}", event.event_id, payment.id, payment.status);
    }
    Ok(updated)
}
