//! Error types for the SQLite adapter.

use std::path::PathBuf;

use migrant_core::error::GenerationError;
use migrant_core::state::StateError;

/// Errors raised at the database and filesystem boundary.
#[derive(Debug, thiserror::Error)]
pub enum MigrantError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading or writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A live column whose declared SQLite type has no canonical counterpart.
    #[error("Column '{table}.{column}' has unsupported type '{declared}'")]
    UnsupportedColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Declared SQLite type.
        declared: String,
    },

    /// Malformed structure file.
    #[error("Invalid structure file: {0}")]
    Structure(String),

    /// Malformed migration file.
    #[error("Failed to parse migration file '{path}': {message}")]
    ParseError {
        /// Path to the migration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Migration file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A plan step does not fit the catalog it is rendered against.
    #[error(transparent)]
    State(#[from] StateError),

    /// Planning failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, MigrantError>;
