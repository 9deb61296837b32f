//! # Gateway tools
//!
//! Thin REST clients for the two payment processors the settlement core talks to. This crate knows the wire formats
//! and nothing about the ledger: mapping provider objects onto ledger outcomes is the server's job.
mod config;
mod error;
pub mod helpers;
mod paypal_api;
mod paypal_objects;
mod stripe_api;
mod stripe_objects;
pub mod stripe_signature;

pub use config::{PaypalConfig, PaypalMode, StripeConfig, DEFAULT_SIGNATURE_TOLERANCE};
pub use error::GatewayApiError;
pub use paypal_api::PaypalApi;
pub use paypal_objects::{
    PaypalAmount,
    PaypalCapture,
    PaypalLink,
    PaypalOrder,
    PaypalRefund,
    PaypalWebhookEvent,
    PurchaseUnit,
    PaymentCollection,
    WebhookTransmission,
};
pub use stripe_api::StripeApi;
pub use stripe_objects::{
    LastPaymentError,
    PaymentIntent,
    StripeCharge,
    StripeEvent,
    StripeEventData,
    StripeList,
    StripeRefund,
};
