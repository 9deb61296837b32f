use crate::{
    db_types::{NewPayout, Payment, Payout, PayoutStatus},
    traits::SettlementError,
};

/// Payout orchestration. Every method runs as a single transaction, and is the only place where payouts touch the
/// merchant balance.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement: Clone {
    /// Selects every `succeeded` payment of the merchant that has not been paid out, marks them as `processing`
    /// against a new payout, and reserves their sum from the pending balance.
    ///
    /// If `payout.amount` is given, it must equal the sum of the selected payments' business fees.
    async fn create_payout(&self, payout: NewPayout) -> Result<(Payout, Vec<Payment>), SettlementError>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, SettlementError>;

    /// `pending -> processing`.
    async fn start_payout(&self, id: i64) -> Result<Payout, SettlementError>;

    /// `pending | processing -> completed`. Covered payments move to `paid`. A second completion is a `Conflict`.
    async fn complete_payout(
        &self,
        id: i64,
        transaction_reference: &str,
        notes: Option<&str>,
    ) -> Result<Payout, SettlementError>;

    /// `pending | processing -> cancelled | failed`. The covered payments return to the pending pool and the reservation
    /// is released.
    async fn release_payout(
        &self,
        id: i64,
        status: PayoutStatus,
        reason: Option<&str>,
    ) -> Result<Payout, SettlementError>;
}
