use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewPayout, Payment, Payout, PayoutStatus},
    events::{EventProducers, PayoutCompletedEvent},
    traits::{PaymentLedger, PayoutManagement, SettlementError},
};

/// `PayoutApi` is the admin-facing payout orchestrator.
pub struct PayoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PayoutApi<B>
where B: PayoutManagement
{
    /// Pays out everything the merchant has pending.
    ///
    /// All of the merchant's unpaid succeeded payments are covered. A requested amount that differs from their sum is
    /// refused with both values in the message.
    pub async fn create_payout(&self, payout: NewPayout) -> Result<Payout, SettlementError> {
        if payout.merchant_id.trim().is_empty() {
            return Err(SettlementError::Validation("A payout needs a merchant id".into()));
        }
        if payout.approved_by.trim().is_empty() {
            return Err(SettlementError::Validation("A payout needs an approver".into()));
        }
        let (payout, covered) = self.db.create_payout(payout).await?;
        info!(
            "💸️ Payout {} of {} {} for {} created by {}, covering {} payments",
            payout.id,
            payout.amount,
            payout.currency,
            payout.merchant_id,
            payout.approved_by,
            covered.len()
        );
        Ok(payout)
    }

    pub async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, SettlementError> {
        self.db.fetch_payout(id).await
    }

    pub async fn start_payout(&self, id: i64) -> Result<Payout, SettlementError> {
        let payout = self.db.start_payout(id).await?;
        debug!("💸️ Payout {id} is being processed");
        Ok(payout)
    }

    /// Marks the payout as executed. Fails with `Conflict` if it is already completed, cancelled or failed.
    pub async fn complete_payout(
        &self,
        id: i64,
        transaction_reference: &str,
        notes: Option<&str>,
    ) -> Result<Payout, SettlementError> {
        if transaction_reference.trim().is_empty() {
            return Err(SettlementError::Validation("A completed payout needs a transaction reference".into()));
        }
        let payout = self.db.complete_payout(id, transaction_reference.trim(), notes).await?;
        info!("💸️ Payout {id} completed with reference {}", payout.transaction_reference.as_deref().unwrap_or(""));
        self.producers.publish_payout_completed(PayoutCompletedEvent::new(payout.clone())).await;
        Ok(payout)
    }

    /// Cancels an open payout. The covered payments become available for the next payout.
    pub async fn cancel_payout(&self, id: i64, reason: Option<&str>) -> Result<Payout, SettlementError> {
        let payout = self.db.release_payout(id, PayoutStatus::Cancelled, reason).await?;
        info!("💸️ Payout {id} cancelled. {} returned to {}", payout.amount, payout.merchant_id);
        Ok(payout)
    }

    /// Records that the disbursement failed. Same effect on the ledger as a cancellation.
    pub async fn fail_payout(&self, id: i64, reason: &str) -> Result<Payout, SettlementError> {
        let payout = self.db.release_payout(id, PayoutStatus::Failed, Some(reason)).await?;
        warn!("💸️ Payout {id} failed: {reason}. {} returned to {}", payout.amount, payout.merchant_id);
        Ok(payout)
    }
}

impl<B> PayoutApi<B>
where B: PayoutManagement + PaymentLedger
{
    /// The payout with the payments it covers (or covered, once completed).
    pub async fn payout_with_payments(&self, id: i64) -> Result<Option<(Payout, Vec<Payment>)>, SettlementError> {
        let Some(payout) = self.db.fetch_payout(id).await? else {
            return Ok(None);
        };
        let payments = self.db.payments_for_payout(id).await?;
        Ok(Some((payout, payments)))
    }
}
