//! # Backend and collaborator contracts.
//!
//! The settlement APIs are generic over these traits.
//!
//! * [`PaymentLedger`], [`PayoutManagement`], [`InvoiceManagement`] and [`MerchantManagement`] are implemented by
//!   database backends. The merchant balance is only ever mutated from inside their transactions.
//! * [`PaymentGateway`] is implemented by the provider integration layer (Stripe, PayPal).
//! * [`Mailer`] is implemented by the outgoing email transport.
mod data_objects;
mod errors;
mod invoice_management;
mod mailer;
mod merchant_management;
mod payment_gateway;
mod payment_ledger;
mod payout_management;

pub use data_objects::{
    BalanceAudit,
    EmailDelivery,
    EventApplication,
    InvoiceDraft,
    MonthlyBreakdown,
    NormalizedEvent,
    PaymentOutcome,
    PendingSummary,
    RefundEntry,
};
pub use errors::SettlementError;
pub use invoice_management::InvoiceManagement;
pub use mailer::{EmailMessage, MailError, Mailer};
pub use merchant_management::MerchantManagement;
pub use payment_gateway::{
    CaptureResult,
    CreatePaymentRequest,
    CreatedPayment,
    PaymentGateway,
    ProviderError,
    ProviderPaymentState,
    RefundRequest,
    RefundResult,
};
pub use payment_ledger::PaymentLedger;
pub use payout_management::PayoutManagement;
