//! SQLite backend for the settlement engine.
//!
//! The schema lives in `migrations/` next to this module and is embedded into the crate. Call
//! [`SqliteDatabase::migrate`] once at start-up to bring a database up to date.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
