use chrono::Duration;

use crate::{
    db_types::{NewPayment, Payment, Provider},
    fees::FeeSplit,
    traits::{
        data_objects::{EventApplication, NormalizedEvent, RefundEntry},
        SettlementError,
    },
};

/// The payment ledger: one entry per booking, moved through its lifecycle by provider events.
///
/// Backends must guarantee that
/// * the merchant credit for a payment happens exactly once, in the same transaction as the conditional
///   `pending/processing -> succeeded` update that wins,
/// * a refund reverses that credit in the same transaction as the conditional `succeeded -> refunded` update,
/// * a provider event id is applied at most once.
#[allow(async_fn_in_trait)]
pub trait PaymentLedger: Clone {
    /// Records a new `pending` payment intent with the given fee split.
    ///
    /// Fails with `Conflict` if a payment already exists for the booking.
    async fn record_intent(&self, payment: NewPayment, split: FeeSplit) -> Result<Payment, SettlementError>;

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, SettlementError>;

    async fn fetch_payment_by_booking(&self, booking_id: &str) -> Result<Option<Payment>, SettlementError>;

    async fn fetch_payment_by_provider_ref(
        &self,
        provider: Provider,
        provider_ref: &str,
    ) -> Result<Option<Payment>, SettlementError>;

    /// Stores the provider's payment object id against the entry and moves it to `processing`.
    async fn attach_provider_ref(&self, id: i64, provider_ref: &str) -> Result<Payment, SettlementError>;

    /// Moves a `pending` entry to `processing` without a provider reference (the provider call timed out).
    async fn mark_processing(&self, id: i64) -> Result<Payment, SettlementError>;

    /// Marks an open (`pending`/`processing`) entry as `failed`. Returns `None` if the entry had already left the open
    /// states.
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<Option<Payment>, SettlementError>;

    /// Applies a normalized provider event. Idempotent per `(provider, event_id)`.
    async fn apply_provider_event(&self, event: &NormalizedEvent) -> Result<EventApplication, SettlementError>;

    /// Records a refund on a `succeeded` entry and reverses the merchant credit. Returns `None` if the entry was no
    /// longer `succeeded` (someone else refunded it first).
    async fn record_refund(&self, id: i64, refund: RefundEntry) -> Result<Option<Payment>, SettlementError>;

    /// Open payments that have not been touched for at least `older_than`.
    async fn fetch_stale_open_payments(&self, older_than: Duration) -> Result<Vec<Payment>, SettlementError>;

    /// The payments covered by the given payout.
    async fn payments_for_payout(&self, payout_id: i64) -> Result<Vec<Payment>, SettlementError>;
}
