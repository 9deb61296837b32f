use serde::{Deserialize, Serialize};
use settlement_common::Cents;
use thiserror::Error;

use crate::db_types::Provider;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Timeouts, 5xx responses and transport errors. The provider may or may not have acted on the request.
    #[error("The payment provider is unavailable. {0}")]
    Unavailable(String),
    /// The provider definitively refused the request.
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
    #[error("The payment provider {0} is not configured")]
    NotConfigured(Provider),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub provider: Provider,
    /// The ledger entry id. Sent to the provider as metadata so that events can be traced back.
    pub ledger_ref: i64,
    pub booking_id: String,
    pub amount: Cents,
    pub currency: String,
    /// Makes retries of the same creation safe on the provider side.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPayment {
    pub provider_ref: String,
    /// The Stripe client secret or the PayPal approval link, for the front end.
    pub client_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    pub charge_ref: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub provider: Provider,
    pub provider_ref: String,
    pub charge_ref: Option<String>,
    /// `None` refunds the full amount.
    pub amount: Option<Cents>,
    pub currency: String,
    pub reason: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub refund_id: String,
    pub amount: Cents,
}

/// What the provider currently reports about a payment object. Used by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentState {
    Open,
    RequiresCapture,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl ProviderPaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderPaymentState::Open => "open",
            ProviderPaymentState::RequiresCapture => "requires_capture",
            ProviderPaymentState::Succeeded => "succeeded",
            ProviderPaymentState::Failed => "failed",
            ProviderPaymentState::Cancelled => "cancelled",
            ProviderPaymentState::Refunded => "refunded",
        }
    }
}

/// The payment gateway adapter. Implementations talk to the external processors; they never touch the ledger.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    fn supports(&self, provider: Provider) -> bool;

    async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<CreatedPayment, ProviderError>;

    /// Captures an approved payment (PayPal orders). Providers that capture automatically return `completed`.
    async fn capture(&self, provider: Provider, provider_ref: &str) -> Result<CaptureResult, ProviderError>;

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ProviderError>;

    async fn fetch_status(&self, provider: Provider, provider_ref: &str)
        -> Result<ProviderPaymentState, ProviderError>;

    /// Withdraws a payment the payer never completed. Returns what the provider reports afterwards, which is
    /// [`ProviderPaymentState::Cancelled`] unless the payment got paid in the meantime.
    async fn cancel(&self, provider: Provider, provider_ref: &str) -> Result<ProviderPaymentState, ProviderError>;
}
