use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use settlement_common::Cents;

use crate::{
    db_types::{BusinessBalance, Invoice, Merchant, MerchantProfile, Payout},
    traits::{BalanceAudit, MerchantManagement, MonthlyBreakdown, PendingSummary, SettlementError},
};

/// A merchant's financial year at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub merchant_id: String,
    pub year: i32,
    pub balance: BusinessBalance,
    pub months: Vec<MonthlyBreakdown>,
    pub year_gross: Cents,
    pub year_platform_fees: Cents,
    pub year_business_fees: Cents,
    pub year_payment_count: i64,
}

pub struct MerchantApi<B> {
    db: B,
}

impl<B> Debug for MerchantApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MerchantApi")
    }
}

impl<B> MerchantApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> MerchantApi<B>
where B: MerchantManagement
{
    pub async fn fetch_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, SettlementError> {
        self.db.fetch_merchant(merchant_id).await
    }

    pub async fn update_profile(&self, merchant_id: &str, profile: MerchantProfile) -> Result<Merchant, SettlementError> {
        if !profile.email.contains('@') {
            return Err(SettlementError::Validation(format!("{} is not a valid email address", profile.email)));
        }
        if profile.street.trim().is_empty() || profile.city.trim().is_empty() || profile.postal_code.trim().is_empty() {
            return Err(SettlementError::Validation("A billing profile needs a full postal address".into()));
        }
        self.db.upsert_profile(merchant_id, profile).await
    }

    pub async fn pending_summary(&self, merchant_id: &str) -> Result<PendingSummary, SettlementError> {
        self.db.pending_summary(merchant_id).await
    }

    pub async fn financial_summary(&self, merchant_id: &str, year: i32) -> Result<FinancialSummary, SettlementError> {
        if !(2000..=9999).contains(&year) {
            return Err(SettlementError::Validation(format!("{year} is not a valid year")));
        }
        let balance = self.db.fetch_merchant(merchant_id).await?.map(|m| m.balance()).unwrap_or_default();
        let months = self.db.monthly_breakdown(merchant_id, year).await?;
        Ok(FinancialSummary {
            merchant_id: merchant_id.to_string(),
            year,
            balance,
            year_gross: months.iter().map(|m| m.gross_amount).sum(),
            year_platform_fees: months.iter().map(|m| m.platform_fees).sum(),
            year_business_fees: months.iter().map(|m| m.business_fees).sum(),
            year_payment_count: months.iter().map(|m| m.payment_count).sum(),
            months,
        })
    }

    pub async fn payout_history(&self, merchant_id: &str) -> Result<Vec<Payout>, SettlementError> {
        self.db.payout_history(merchant_id).await
    }

    pub async fn invoices(&self, merchant_id: &str) -> Result<Vec<Invoice>, SettlementError> {
        self.db.invoices_for_merchant(merchant_id).await
    }

    pub async fn balance_audit(&self, merchant_id: &str) -> Result<BalanceAudit, SettlementError> {
        self.db.balance_audit(merchant_id).await
    }

    /// Audits every merchant and returns the ones whose stored balance disagrees with the ledger.
    pub async fn find_balance_drift(&self) -> Result<Vec<(String, BalanceAudit)>, SettlementError> {
        let mut drifted = Vec::new();
        for merchant_id in self.db.merchant_ids().await? {
            let audit = self.db.balance_audit(&merchant_id).await?;
            if !audit.is_consistent() {
                warn!("🏦️ Balance drift for {merchant_id}: {audit:?}");
                drifted.push((merchant_id, audit));
            }
        }
        Ok(drifted)
    }
}
