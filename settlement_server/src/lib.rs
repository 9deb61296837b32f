//! # Settlement server
//!
//! The HTTP face of the settlement engine. It is responsible for:
//! * Opening payments for the booking system and passing the payer on to Stripe or PayPal.
//! * Receiving provider webhooks, verifying them, and feeding the normalized events to the ledger.
//! * The admin back office: refunds, payouts, billing profiles and invoices.
//! * Read-only merchant views of pending earnings, payouts and invoices.
//! * A periodic reconciliation job that settles payments whose webhooks never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/stripe`, `/webhooks/paypal`: provider callbacks.
//! * `/api/...`: everything else. Requires a bearer JWT. See [routes](routes/index.html).
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
