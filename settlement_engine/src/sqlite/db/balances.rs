//! The business balance primitives.
//!
//! These four functions are the only code that writes to the balance columns of `merchants`. Each is a single
//! relative `UPDATE` scoped by merchant id, so concurrent callers can never lose each other's updates, and each keeps
//! `total_earnings = pending_balance + total_paid_out` (which the schema also enforces with a `CHECK`).
//!
//! They are not atomic on their own. Callers run them inside the transaction that made the corresponding ledger
//! change.
use log::trace;
use settlement_common::Cents;
use sqlx::SqliteConnection;

use crate::traits::SettlementError;

fn ensure_non_negative(amount: Cents, op: &str) -> Result<(), SettlementError> {
    if amount.is_negative() {
        return Err(SettlementError::Validation(format!("Cannot {op} a negative amount ({amount})")));
    }
    Ok(())
}

fn check_merchant_updated(rows: u64, merchant_id: &str) -> Result<(), SettlementError> {
    if rows == 0 {
        return Err(SettlementError::NotFound(format!("Merchant {merchant_id} does not exist")));
    }
    Ok(())
}

/// A payment succeeded: `pending_balance += amount`, `total_earnings += amount`. Creates the merchant row if this is
/// the merchant's first earning.
pub async fn credit_earnings(
    merchant_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    ensure_non_negative(amount, "credit")?;
    sqlx::query(
        r#"
        INSERT INTO merchants (merchant_id, pending_balance, total_earnings) VALUES ($1, $2, $2)
        ON CONFLICT (merchant_id) DO UPDATE SET
            pending_balance = pending_balance + excluded.pending_balance,
            total_earnings = total_earnings + excluded.total_earnings,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(merchant_id)
    .bind(amount)
    .execute(conn)
    .await?;
    trace!("🗃️ Credited {amount} to {merchant_id}");
    Ok(())
}

/// A succeeded payment was refunded: `pending_balance -= amount`, `total_earnings -= amount`.
pub async fn reverse_earnings(
    merchant_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    ensure_non_negative(amount, "reverse")?;
    let result = sqlx::query(
        r#"
        UPDATE merchants SET
            pending_balance = pending_balance - $2,
            total_earnings = total_earnings - $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE merchant_id = $1
        "#,
    )
    .bind(merchant_id)
    .bind(amount)
    .execute(conn)
    .await?;
    check_merchant_updated(result.rows_affected(), merchant_id)?;
    trace!("🗃️ Reversed {amount} from {merchant_id}");
    Ok(())
}

/// A payout was created: `pending_balance -= amount`, `total_paid_out += amount`.
pub async fn reserve_for_payout(
    merchant_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    ensure_non_negative(amount, "reserve")?;
    let result = sqlx::query(
        r#"
        UPDATE merchants SET
            pending_balance = pending_balance - $2,
            total_paid_out = total_paid_out + $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE merchant_id = $1
        "#,
    )
    .bind(merchant_id)
    .bind(amount)
    .execute(conn)
    .await?;
    check_merchant_updated(result.rows_affected(), merchant_id)?;
    trace!("🗃️ Reserved {amount} of {merchant_id}'s balance for a payout");
    Ok(())
}

/// A payout was cancelled or failed: the inverse of [`reserve_for_payout`].
pub async fn release_reservation(
    merchant_id: &str,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    ensure_non_negative(amount, "release")?;
    let result = sqlx::query(
        r#"
        UPDATE merchants SET
            pending_balance = pending_balance + $2,
            total_paid_out = total_paid_out - $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE merchant_id = $1
        "#,
    )
    .bind(merchant_id)
    .bind(amount)
    .execute(conn)
    .await?;
    check_merchant_updated(result.rows_affected(), merchant_id)?;
    trace!("🗃️ Released {amount} back to {merchant_id}'s pending balance");
    Ok(())
}
