//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with one table per value type:
//! - kvp_string(key, value TEXT)
//! - kvp_bool(key, value BOOLEAN)
//! - kvp_float(key, value REAL)
//! - kvp_int(key, value INTEGER)
//!
//! plus sqlitedatastore_metadata(key, value) for file identity.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, OpenOptions, SqliteStore, FORMAT_VERSION, MEMORY_PATH};
