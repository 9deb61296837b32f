use chrono::NaiveDateTime;
use settlement_common::Cents;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Merchant, MerchantProfile},
    traits::{BalanceAudit, MonthlyBreakdown, PendingSummary},
};

pub async fn fetch_merchant(merchant_id: &str, conn: &mut SqliteConnection) -> Result<Option<Merchant>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchants WHERE merchant_id = $1").bind(merchant_id).fetch_optional(conn).await
}

pub async fn fetch_merchant_ids(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let ids: Vec<(String,)> = sqlx::query_as("SELECT merchant_id FROM merchants ORDER BY merchant_id").fetch_all(conn).await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

/// Creates or replaces the billing profile of a merchant. The balance columns are not part of the statement.
pub async fn upsert_profile(
    merchant_id: &str,
    profile: &MerchantProfile,
    conn: &mut SqliteConnection,
) -> Result<Merchant, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO merchants (merchant_id, legal_name, street, postal_code, city, country, tax_id, vat_id, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (merchant_id) DO UPDATE SET
            legal_name = excluded.legal_name,
            street = excluded.street,
            postal_code = excluded.postal_code,
            city = excluded.city,
            country = excluded.country,
            tax_id = excluded.tax_id,
            vat_id = excluded.vat_id,
            email = excluded.email,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *
        "#,
    )
    .bind(merchant_id)
    .bind(&profile.legal_name)
    .bind(&profile.street)
    .bind(&profile.postal_code)
    .bind(&profile.city)
    .bind(&profile.country)
    .bind(&profile.tax_id)
    .bind(&profile.vat_id)
    .bind(&profile.email)
    .fetch_one(conn)
    .await
}

pub async fn pending_summary(merchant_id: &str, conn: &mut SqliteConnection) -> Result<PendingSummary, sqlx::Error> {
    let (pending, count, oldest, newest): (i64, i64, Option<NaiveDateTime>, Option<NaiveDateTime>) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(business_fee), 0),
            COUNT(*),
            MIN(succeeded_at),
            MAX(succeeded_at)
        FROM payments
        WHERE merchant_id = $1 AND status = 'succeeded' AND payout_status = 'pending'
        "#,
    )
    .bind(merchant_id)
    .fetch_one(conn)
    .await?;
    Ok(PendingSummary {
        pending_amount: Cents::from(pending),
        payment_count: count,
        oldest_payment: oldest.map(|d| d.date()),
        newest_payment: newest.map(|d| d.date()),
    })
}

pub async fn monthly_breakdown(
    merchant_id: &str,
    year: i32,
    conn: &mut SqliteConnection,
) -> Result<Vec<MonthlyBreakdown>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            strftime('%Y-%m', succeeded_at) AS month,
            COUNT(*) AS payment_count,
            COALESCE(SUM(amount), 0) AS gross_amount,
            COALESCE(SUM(platform_fee), 0) AS platform_fees,
            COALESCE(SUM(business_fee), 0) AS business_fees
        FROM payments
        WHERE merchant_id = $1
        AND status IN ('succeeded', 'refunded')
        AND succeeded_at IS NOT NULL
        AND strftime('%Y', succeeded_at) = $2
        GROUP BY month
        ORDER BY month
        "#,
    )
    .bind(merchant_id)
    .bind(format!("{year:04}"))
    .fetch_all(conn)
    .await
}

/// Recomputes the balance from the ledger rows and returns it alongside the stored one.
///
/// Earnings are the business fees of payments that are still `succeeded`. Paid out is what open or completed payouts
/// have reserved.
pub async fn balance_audit(merchant_id: &str, conn: &mut SqliteConnection) -> Result<BalanceAudit, sqlx::Error> {
    let (earnings,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(business_fee), 0) FROM payments WHERE merchant_id = $1 AND status = 'succeeded'",
    )
    .bind(merchant_id)
    .fetch_one(&mut *conn)
    .await?;
    let (paid_out,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM payouts
        WHERE merchant_id = $1 AND status IN ('pending', 'processing', 'completed')
        "#,
    )
    .bind(merchant_id)
    .fetch_one(&mut *conn)
    .await?;
    let stored = fetch_merchant(merchant_id, conn).await?.map(|m| m.balance()).unwrap_or_default();
    let ledger_earnings = Cents::from(earnings);
    let ledger_paid_out = Cents::from(paid_out);
    Ok(BalanceAudit {
        stored_pending: stored.pending_balance,
        stored_earnings: stored.total_earnings,
        stored_paid_out: stored.total_paid_out,
        ledger_pending: ledger_earnings - ledger_paid_out,
        ledger_earnings,
        ledger_paid_out,
    })
}
