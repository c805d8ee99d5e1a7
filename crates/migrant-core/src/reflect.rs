//! Collaborator traits.
//!
//! Driver crates implement [`SchemaReflector`] and [`MigrationLedger`] to
//! expose the live database and the migration history. The core crate only
//! defines the traits so it stays driver-agnostic; [`crate::state`] has
//! in-memory implementations.

use crate::error::BoxError;
use crate::schema::{ExistingColumn, IndexSpec};

/// Live shape of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTable {
    /// Live columns, including the primary key.
    pub columns: Vec<ExistingColumn>,
    /// Live indexes.
    pub indexes: Vec<IndexSpec>,
}

/// Reads the current shape of tables.
pub trait SchemaReflector {
    /// Error type for reflection failures.
    type Error: Into<BoxError>;

    /// Returns whether the table exists.
    fn table_exists(&self, table: &str) -> Result<bool, Self::Error>;

    /// Returns the live columns of an existing table.
    fn current_columns(&self, table: &str) -> Result<Vec<ExistingColumn>, Self::Error>;

    /// Returns the live indexes of an existing table.
    fn current_indexes(&self, table: &str) -> Result<Vec<IndexSpec>, Self::Error>;

    /// Returns the live table, or `None` when it does not exist.
    fn live_table(&self, table: &str) -> Result<Option<LiveTable>, Self::Error> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        Ok(Some(LiveTable {
            columns: self.current_columns(table)?,
            indexes: self.current_indexes(table)?,
        }))
    }
}

/// Reports which migrations exist and which were applied.
pub trait MigrationLedger {
    /// Error type for ledger failures.
    type Error: Into<BoxError>;

    /// Identifiers of every known migration, applied or not.
    fn known_migrations(&self) -> Result<Vec<String>, Self::Error>;

    /// Identifiers of migrations that exist but were never applied.
    fn pending_migrations(&self) -> Result<Vec<String>, Self::Error>;
}
