use std::time::Duration;

use serde::{Deserialize, Serialize};
use settlement_common::{Cents, DEFAULT_CURRENCY_CODE};

use crate::{
    db_types::{Payment, Provider},
    fees::FeePolicy,
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// The message end users see when a provider refuses a payment. Provider detail is only logged and stored.
pub const PAYMENT_FAILED_MESSAGE: &str = "The payment could not be processed. Please try again or use another payment method.";
pub const PAYMENT_IN_PROGRESS_MESSAGE: &str = "The payment is being processed. You will be notified once it completes.";

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub fees: FeePolicy,
    /// The settlement currency. Payments in any other currency are refused.
    pub currency: String,
    pub provider_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            fees: FeePolicy::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// A request from the booking system to take payment for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: String,
    pub payer_id: String,
    pub merchant_id: String,
    pub amount: Cents,
    pub currency: Option<String>,
    pub provider: Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiationStatus {
    /// The provider created its payment object. The payer can continue with `client_action`.
    Started,
    /// The provider did not answer in time. The payment stays `processing` and is resolved by reconciliation.
    InProgress,
    /// The provider refused the payment.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub status: InitiationStatus,
    pub payment: Payment,
    pub client_action: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "payment", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// The refund was executed and the merchant credit reversed.
    Refunded(Payment),
    /// The provider did not confirm in time. The refund is confirmed (or not) by the provider's webhook.
    Submitted(Payment),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub checked: usize,
    /// Moved to a final state from the provider's answer.
    pub resolved: usize,
    /// Payment creation was retried for entries that never got a provider reference.
    pub retried: usize,
    /// Given up on: failed because the provider never saw them, or cancelled at the provider.
    pub abandoned: usize,
    pub still_open: usize,
    pub errors: usize,
}
