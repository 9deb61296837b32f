//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers obtain a connection from a pool, or open a transaction and pass `&mut *tx` through.
//!
//! Every transaction that writes must *start* with a write. SQLite then takes the write lock up front and concurrent
//! writers queue on the busy timeout, instead of failing when a read lock cannot be upgraded.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub(crate) mod balances;
pub mod invoices;
pub mod merchants;
pub mod payments;
pub mod payouts;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";
/// How long a writer waits for the write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn db_url() -> String {
    let result = env::var("STL_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ STL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options =
        SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true).busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
