//! Migration operations.
//!
//! Every operation carries enough of the previous definition to be inverted,
//! so the `down` body of a step is always the reversed list of inverted `up`
//! operations.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSpec, IndexSpec};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOp {
    /// Create a table with an implicit primary key.
    CreateTable {
        /// Table name.
        table: String,
        /// Column definitions, in order.
        columns: Vec<ColumnSpec>,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
        /// Columns the table had, for reversal.
        columns: Vec<ColumnSpec>,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSpec,
    },

    /// Remove a column from a table.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column the table had, for reversal.
        column: ColumnSpec,
    },

    /// Change a column's definition.
    ChangeColumn {
        /// Table name.
        table: String,
        /// New definition.
        column: ColumnSpec,
        /// Definition being replaced, for reversal.
        previous: ColumnSpec,
    },

    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Indexed columns.
        columns: Vec<String>,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Columns the index covered, for reversal.
        columns: Vec<String>,
    },
}

impl MigrationOp {
    /// Creates a `CreateTable` operation.
    #[must_use]
    pub fn create_table(table: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self::CreateTable {
            table: table.into(),
            columns,
        }
    }

    /// Creates an `AddColumn` operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: ColumnSpec) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a `ChangeColumn` operation.
    #[must_use]
    pub fn change_column(
        table: impl Into<String>,
        column: ColumnSpec,
        previous: ColumnSpec,
    ) -> Self {
        Self::ChangeColumn {
            table: table.into(),
            column,
            previous,
        }
    }

    /// Creates a `CreateIndex` operation with the derived index name.
    #[must_use]
    pub fn create_index(table: impl Into<String>, index: &IndexSpec) -> Self {
        let table = table.into();
        Self::CreateIndex {
            name: index.name_for(&table),
            table,
            columns: index.columns.clone(),
        }
    }

    /// Returns the structural inverse of this operation.
    #[must_use]
    pub fn reverse(&self) -> Self {
        match self {
            Self::CreateTable { table, columns } => Self::DropTable {
                table: table.clone(),
                columns: columns.clone(),
            },
            Self::DropTable { table, columns } => Self::CreateTable {
                table: table.clone(),
                columns: columns.clone(),
            },
            Self::AddColumn { table, column } => Self::RemoveColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::RemoveColumn { table, column } => Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::ChangeColumn {
                table,
                column,
                previous,
            } => Self::ChangeColumn {
                table: table.clone(),
                column: previous.clone(),
                previous: column.clone(),
            },
            Self::CreateIndex {
                table,
                name,
                columns,
            } => Self::DropIndex {
                table: table.clone(),
                name: name.clone(),
                columns: columns.clone(),
            },
            Self::DropIndex {
                table,
                name,
                columns,
            } => Self::CreateIndex {
                table: table.clone(),
                name: name.clone(),
                columns: columns.clone(),
            },
        }
    }

    /// Returns the table this operation touches.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::RemoveColumn { table, .. }
            | Self::ChangeColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table, columns } => {
                format!("Create table '{table}' with {} columns", columns.len())
            }
            Self::DropTable { table, .. } => format!("Drop table '{table}'"),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' ({column}) to table '{table}'", column.name)
            }
            Self::RemoveColumn { table, column } => {
                format!("Remove column '{}' from table '{table}'", column.name)
            }
            Self::ChangeColumn {
                table,
                column,
                previous,
            } => format!(
                "Change column '{}' in table '{table}' from {previous} to {column}",
                column.name
            ),
            Self::CreateIndex { table, name, .. } => {
                format!("Create index '{name}' on table '{table}'")
            }
            Self::DropIndex { name, .. } => format!("Drop index '{name}'"),
        }
    }
}

/// The forward and backward operations of one migration step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationBody {
    /// Operations applying the change.
    pub up: Vec<MigrationOp>,
    /// Operations undoing the change, in execution order.
    pub down: Vec<MigrationOp>,
}

impl MigrationBody {
    /// Builds a body whose `down` inverts `up` in reverse order.
    #[must_use]
    pub fn from_up(up: Vec<MigrationOp>) -> Self {
        let down = up.iter().rev().map(MigrationOp::reverse).collect();
        Self { up, down }
    }

    /// Returns `true` if the body holds no operation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }
}
