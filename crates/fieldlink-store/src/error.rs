//! Error types for fieldlink-store.

use std::path::PathBuf;

/// Result type for fieldlink-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldlink-store.
///
/// Nothing here is retried; a failed save leaves the database as it was
/// before the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Timestamp could not be formatted for storage.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Metadata could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
