//! Adapters between the outside world and the settlement engine.
//!
//! * [`gateways`] implements the engine's `PaymentGateway` on top of the Stripe and PayPal REST clients.
//! * [`stripe`] and [`paypal`] reduce verified webhook payloads to the engine's `NormalizedEvent`.
//! * [`email`] implements the engine's `Mailer` over SMTP.
pub mod email;
pub mod gateways;
pub mod paypal;
pub mod stripe;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not interpret the provider event. {0}")]
pub struct EventConversionError(pub String);
