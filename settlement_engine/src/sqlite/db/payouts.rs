use log::debug;
use settlement_common::Cents;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayout, Payment, Payout, PayoutStatus},
    traits::SettlementError,
};

/// Inserts the payout shell. Amount, currency and covered count are filled in once the payments have been claimed.
pub async fn insert_payout(payout: &NewPayout, conn: &mut SqliteConnection) -> Result<Payout, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO payouts (merchant_id, currency, method, period_start, period_end, notes, approved_by)
        VALUES ($1, '', $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&payout.merchant_id)
    .bind(payout.method)
    .bind(payout.period.from)
    .bind(payout.period.to)
    .bind(&payout.notes)
    .bind(&payout.approved_by)
    .fetch_one(conn)
    .await
}

/// Claims every unpaid, succeeded payment of the merchant for the payout in one statement.
pub async fn claim_pending_payments(
    payout_id: i64,
    merchant_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET payout_status = 'processing', payout_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE merchant_id = $2 AND status = 'succeeded' AND payout_status = 'pending'
        RETURNING *
        "#,
    )
    .bind(payout_id)
    .bind(merchant_id)
    .fetch_all(conn)
    .await
}

pub async fn set_payout_totals(
    payout_id: i64,
    amount: Cents,
    currency: &str,
    covered: i64,
    conn: &mut SqliteConnection,
) -> Result<Payout, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payouts SET amount = $2, currency = $3, covered_payment_count = $4, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payout_id)
    .bind(amount)
    .bind(currency)
    .bind(covered)
    .fetch_one(conn)
    .await
}

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payouts_for_merchant(merchant_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE merchant_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(merchant_id)
        .fetch_all(conn)
        .await
}

pub async fn mark_started(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payouts SET status = 'processing', updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn mark_completed(
    id: i64,
    transaction_reference: &str,
    notes: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payouts SET
            status = 'completed',
            transaction_reference = $2,
            notes = COALESCE($3, notes),
            completed_at = CURRENT_TIMESTAMP,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(transaction_reference)
    .bind(notes)
    .fetch_optional(conn)
    .await
}

/// Cancels or fails an open payout. The covered count drops to zero because the payments are handed back.
pub async fn mark_released(
    id: i64,
    status: PayoutStatus,
    reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payouts SET
            status = $2,
            failure_reason = $3,
            covered_payment_count = 0,
            updated_at = CURRENT_TIMESTAMP
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

pub async fn mark_covered_payments_paid(payout_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET payout_status = 'paid', updated_at = CURRENT_TIMESTAMP
        WHERE payout_id = $1 AND payout_status = 'processing'
        "#,
    )
    .bind(payout_id)
    .execute(conn)
    .await?;
    debug!("🗃️ {} payments marked as paid for payout {payout_id}", result.rows_affected());
    Ok(result.rows_affected())
}

/// Hands the payout's payments back to the pending pool and returns them.
pub async fn return_covered_payments(payout_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE payments SET payout_status = 'pending', payout_id = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE payout_id = $1 AND payout_status = 'processing'
        RETURNING *
        "#,
    )
    .bind(payout_id)
    .fetch_all(conn)
    .await
}

/// Explains why a conditional payout update did not match.
pub async fn transition_error(id: i64, action: &str, conn: &mut SqliteConnection) -> SettlementError {
    match fetch_payout(id, conn).await {
        Ok(Some(p)) => SettlementError::Conflict(format!("Cannot {action} payout {id}, it is already {}", p.status)),
        Ok(None) => SettlementError::NotFound(format!("Payout {id} does not exist")),
        Err(e) => e.into(),
    }
}
