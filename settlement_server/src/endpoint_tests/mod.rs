mod auth;
mod helpers;
mod invoices;
mod merchants;
mod mocks;
mod payouts;
