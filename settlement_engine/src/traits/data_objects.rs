use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use settlement_common::Cents;

use crate::db_types::{BankDetails, Party, Payment, PaymentStatus};

/// The normalized outcome of a provider event. Provider-specific event names never leave the integration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
    /// The payer approved the payment, but the funds still have to be captured (PayPal orders).
    RequiresCapture,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => "succeeded",
            PaymentOutcome::Failed => "failed",
            PaymentOutcome::Cancelled => "cancelled",
            PaymentOutcome::Refunded => "refunded",
            PaymentOutcome::RequiresCapture => "requires_capture",
        }
    }

    /// The payment status this outcome leads to.
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Succeeded => PaymentStatus::Succeeded,
            PaymentOutcome::Failed => PaymentStatus::Failed,
            PaymentOutcome::Cancelled => PaymentStatus::Cancelled,
            PaymentOutcome::Refunded => PaymentStatus::Refunded,
            PaymentOutcome::RequiresCapture => PaymentStatus::Processing,
        }
    }
}

/// A verified provider event, reduced to what the ledger needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub provider: crate::db_types::Provider,
    /// The provider's unique event id. Used for de-duplication.
    pub event_id: String,
    /// The provider's payment object reference (PaymentIntent id, PayPal order id).
    pub provider_ref: String,
    pub outcome: PaymentOutcome,
    pub failure_reason: Option<String>,
    /// The capture / charge reference, when the provider reports one.
    pub charge_ref: Option<String>,
    pub refund_id: Option<String>,
}

impl NormalizedEvent {
    pub fn new<E: Into<String>, R: Into<String>>(
        provider: crate::db_types::Provider,
        event_id: E,
        provider_ref: R,
        outcome: PaymentOutcome,
    ) -> Self {
        Self {
            provider,
            event_id: event_id.into(),
            provider_ref: provider_ref.into(),
            outcome,
            failure_reason: None,
            charge_ref: None,
            refund_id: None,
        }
    }

    pub fn with_failure_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_charge_ref<S: Into<String>>(mut self, charge_ref: S) -> Self {
        self.charge_ref = Some(charge_ref.into());
        self
    }

    pub fn with_refund_id<S: Into<String>>(mut self, refund_id: S) -> Self {
        self.refund_id = Some(refund_id.into());
        self
    }
}

/// The result of applying a provider event to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventApplication {
    /// The event moved the payment into a new state.
    Applied { payment: Payment, outcome: PaymentOutcome },
    /// This event id has been seen before. Nothing was changed.
    Duplicate,
    /// The event was recorded, but the payment was not in a state the event applies to (e.g. a late `failed` after
    /// `succeeded`). The current payment is returned unchanged.
    Ignored(Payment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEntry {
    pub refund_id: String,
    pub amount: Cents,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub pending_amount: Cents,
    pub payment_count: i64,
    pub oldest_payment: Option<NaiveDate>,
    pub newest_payment: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyBreakdown {
    /// `YYYY-MM`
    pub month: String,
    pub payment_count: i64,
    pub gross_amount: Cents,
    pub platform_fees: Cents,
    pub business_fees: Cents,
}

/// A cross-check of a merchant's stored balance against the ledger rows it is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAudit {
    pub stored_pending: Cents,
    pub stored_earnings: Cents,
    pub stored_paid_out: Cents,
    pub ledger_pending: Cents,
    pub ledger_earnings: Cents,
    pub ledger_paid_out: Cents,
}

impl BalanceAudit {
    pub fn is_consistent(&self) -> bool {
        self.stored_pending == self.ledger_pending
            && self.stored_earnings == self.ledger_earnings
            && self.stored_paid_out == self.ledger_paid_out
    }
}

/// Everything the backend needs to issue an invoice for a payout, apart from the payout itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub payout_id: i64,
    pub issue_date: NaiveDate,
    pub prefix: String,
    /// VAT rate in whole percent.
    pub vat_rate: i64,
    pub payment_term_days: i64,
    pub issuer: Party,
    pub bank: BankDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailDelivery {
    Delivered,
    Failed(String),
}
