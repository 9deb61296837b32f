use crate::{
    db_types::{Invoice, Merchant, MerchantProfile, Payout},
    traits::{
        data_objects::{BalanceAudit, MonthlyBreakdown, PendingSummary},
        SettlementError,
    },
};

/// Read access to merchant settlement data, plus billing profile maintenance.
#[allow(async_fn_in_trait)]
pub trait MerchantManagement {
    async fn fetch_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, SettlementError>;

    /// Creates or replaces the billing profile. Balances are never touched.
    async fn upsert_profile(&self, merchant_id: &str, profile: MerchantProfile) -> Result<Merchant, SettlementError>;

    /// Succeeded payments that have not been included in a payout yet.
    async fn pending_summary(&self, merchant_id: &str) -> Result<PendingSummary, SettlementError>;

    /// Succeeded (and later refunded) payments per calendar month of `year`, by month of success.
    async fn monthly_breakdown(&self, merchant_id: &str, year: i32) -> Result<Vec<MonthlyBreakdown>, SettlementError>;

    /// Newest first.
    async fn payout_history(&self, merchant_id: &str) -> Result<Vec<Payout>, SettlementError>;

    /// Newest first.
    async fn invoices_for_merchant(&self, merchant_id: &str) -> Result<Vec<Invoice>, SettlementError>;

    async fn merchant_ids(&self) -> Result<Vec<String>, SettlementError>;

    async fn balance_audit(&self, merchant_id: &str) -> Result<BalanceAudit, SettlementError>;
}
