//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction as
//! the need arises and call through to the functions without any other changes.
//!
//! Timestamps are always bound from the caller, never taken from `CURRENT_TIMESTAMP`, so that every time comparison
//! in the ledger is made against the same clock.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod activity;
pub mod earnings;
pub mod orders;
pub mod payouts;
pub mod reconciliations;

const SQLITE_DB_URL: &str = "sqlite://data/cod_settlement.db";

pub fn db_url() -> String {
    let result = env::var("COD_DATABASE_URL").unwrap_or_else(|_| {
        info!("COD_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
