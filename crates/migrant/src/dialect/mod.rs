//! SQL rendering for migration operations.
//!
//! A dialect turns the core's reversible operations into statements for one
//! database system.

mod sqlite;

pub use sqlite::{SqliteDialect, PRIMARY_KEY_COLUMN};

use migrant_core::operations::MigrationOp;
use migrant_core::schema::ColumnSpec;
use migrant_core::state::SchemaState;

use crate::error::Result;

/// Database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for a migration operation.
    ///
    /// `catalog` is the schema with `operation` already applied. Dialects
    /// that cannot alter a column in place rebuild the table from it.
    ///
    /// # Errors
    ///
    /// `State` when the catalog lacks a table the operation needs.
    fn generate_sql(&self, operation: &MigrationOp, catalog: &SchemaState) -> Result<Vec<String>>;

    /// Returns the SQL type name for a column.
    fn type_name(&self, column: &ColumnSpec) -> String;

    /// Generates a column definition.
    fn column_definition(&self, column: &ColumnSpec) -> String {
        format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(column)
        )
    }

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
