//! # Settlement engine public API
//!
//! The `stl_api` module exposes the programmatic API of the settlement engine. Each API is created by supplying a
//! backend that implements the backend traits it needs, plus any collaborators (payment gateway, mailer).
//!
//! * [`payment_flow_api`] opens payments with the providers, applies provider events, refunds, and reconciles stale
//!   payments.
//! * [`payout_api`] creates and moves payouts through their lifecycle.
//! * [`invoice_api`] issues, renders, emails and manages invoices for completed payouts.
//! * [`merchant_api`] answers merchant-facing questions: pending earnings, financial summaries, history.
//!
//! ```rust,ignore
//! use settlement_engine::{MerchantApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = MerchantApi::new(db);
//! let summary = api.pending_summary("merchant-1").await?;
//! ```
pub mod invoice_api;
pub mod invoice_objects;
pub mod merchant_api;
pub mod payment_flow_api;
pub mod payment_objects;
pub mod payout_api;

use std::{future::Future, time::Duration};

use crate::traits::ProviderError;

/// Bounds a provider call. A timeout is reported as the provider being unavailable, since the provider may still have
/// acted on the request.
pub(crate) async fn with_provider_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ProviderError>
where F: Future<Output = Result<T, ProviderError>> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Unavailable(format!("no response within {}s", timeout.as_secs_f32()))),
    }
}
