//! Error types for the storage crate.

use thiserror::Error;

/// Errors that can occur while reading or writing the database
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying database failure (connection, constraint, I/O)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A review write referenced a venue that was never upserted
    #[error("unknown venue: {place_id}")]
    UnknownVenue { place_id: String },

    /// The recommendation payload could not be serialized
    #[error("failed to encode recommendation payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StorageError>;
