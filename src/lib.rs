//! # kvpstore - Typed key-value datastore with change notification
//!
//! A durable, thread-safe store mapping string keys to typed scalar values,
//! backed by SQLite.
//!
//! kvpstore provides:
//! - Four scalar value types (string, bool, float, int), one table per type
//! - Strict typed accessors: a key is only visible under the type it was last written as
//! - Global change listeners and per-key listeners, dispatched on every mutation
//! - Per-key typed [`Binding`]s that de-register themselves when dropped
//! - File identity metadata (magic, format version, application name/version)

pub mod binding;
pub mod config;
pub mod datastore;
pub mod listener;
pub mod storage;
pub mod ui;
pub mod value;

// Re-exports for convenient access
pub use binding::Binding;
pub use datastore::{Datastore, FORMAT_VERSION};
pub use listener::{listener, DataListener};
pub use storage::OpenOptions;
pub use value::{Scalar, Value, ValueType};

/// Result type alias for kvpstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for kvpstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No row with `key` exists under `requested_type`. For removals and
    /// dynamic reads the type is `"unknown"`.
    #[error("No such key '{key}' for value of requested type '{requested_type}'")]
    NoSuchKey {
        key: String,
        requested_type: &'static str,
    },

    #[error("Storage error: {0}")]
    Engine(#[from] rusqlite::Error),

    #[error("Failed to open datastore at {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Datastore is closed")]
    Closed,

    #[error("Invalid key: keys must be non-empty")]
    EmptyKey,

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Unknown value type: {0}")]
    InvalidType(String),
}

impl Error {
    /// Build a `NoSuchKey` error for a typed lookup.
    pub fn no_such_key(key: &str, requested: Option<ValueType>) -> Self {
        Error::NoSuchKey {
            key: key.to_string(),
            requested_type: requested.map_or("unknown", |t| t.as_str()),
        }
    }

    /// Returns true if this is a `NoSuchKey` error.
    ///
    /// Callers commonly test for a key by attempting a read and switching on this.
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Error::NoSuchKey { .. })
    }
}
