//! Settlement Engine
//!
//! The settlement engine is the financial core of the reservation marketplace. It records what payers pay, works out
//! what each merchant has earned, pays merchants out in batches, and issues the statutory invoice for every payout.
//! It is provider-agnostic: the payment processors and the email transport are collaborators behind traits.
//!
//! The library is divided into these sections:
//! 1. Backend contracts ([`mod@traits`]) and the data types they exchange ([`mod@db_types`]). The SQLite backend
//!    ([`SqliteDatabase`]) implements all of them. Merchant balances are only ever changed inside the backend, in the
//!    same transaction as the ledger change that causes them.
//! 2. The public API ([`mod@stl_api`]): payment flow, payouts, invoices and merchant queries.
//! 3. Invoice documents ([`mod@documents`]), rendered with askama templates.
//!
//! The engine also emits events ([`mod@events`]) when payments succeed or are refunded, payouts complete and invoices
//! are issued. Hooks can subscribe to these without touching engine state.
pub mod db_types;
pub mod documents;
pub mod events;
pub mod fees;
pub mod helpers;
#[cfg(feature = "sqlite")]
mod sqlite;
mod stl_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use stl_api::{
    invoice_api::InvoiceApi,
    invoice_objects,
    merchant_api::{FinancialSummary, MerchantApi},
    payment_flow_api::PaymentFlowApi,
    payment_objects,
    payout_api::PayoutApi,
};
