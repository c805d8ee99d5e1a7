//! In-memory collaborators.
//!
//! [`SchemaState`] reconstructs a catalog by replaying migration operations
//! and answers reflection queries from it. [`MemoryLedger`] tracks known and
//! applied migration identifiers. Together they let a caller run the whole
//! generate, apply, regenerate cycle without a database.

use std::collections::BTreeSet;
use std::convert::Infallible;

use crate::operations::MigrationOp;
use crate::reflect::{MigrationLedger, SchemaReflector};
use crate::schema::{ExistingColumn, IndexSpec};
use crate::synthesizer::{MigrationPlan, MigrationStep};

/// Errors replaying operations onto a [`SchemaState`].
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The operation does not fit the current state.
    #[error("Invalid schema state: {0}")]
    InvalidState(String),
}

/// A named live index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedIndex {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
}

/// One table of a [`SchemaState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    /// Table name.
    pub name: String,
    /// Columns in order.
    pub columns: Vec<ExistingColumn>,
    /// Indexes in creation order.
    pub indexes: Vec<NamedIndex>,
}

impl TableState {
    /// Creates a table without indexes.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ExistingColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }

    /// Adds an index, builder style.
    #[must_use]
    pub fn index<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(NamedIndex {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut ExistingColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

/// An in-memory catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaState {
    tables: Vec<TableState>,
}

impl SchemaState {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table, builder style.
    #[must_use]
    pub fn with_table(mut self, table: TableState) -> Self {
        self.insert_table(table);
        self
    }

    /// Adds or replaces a table.
    pub fn insert_table(&mut self, table: TableState) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(slot) => *slot = table,
            None => self.tables.push(table),
        }
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableState> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// All tables in creation order.
    #[must_use]
    pub fn tables(&self) -> &[TableState] {
        &self.tables
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableState, StateError> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| StateError::InvalidState(format!("Table '{name}' does not exist")))
    }

    /// Applies every `up` operation of a plan, in order.
    ///
    /// # Errors
    ///
    /// `InvalidState` when an operation does not fit the catalog.
    pub fn apply(&mut self, plan: &MigrationPlan) -> Result<(), StateError> {
        plan.iter().try_for_each(|step| self.apply_step(step))
    }

    /// Runs every `down` operation of a plan, last step first.
    ///
    /// # Errors
    ///
    /// `InvalidState` when an operation does not fit the catalog.
    pub fn rollback(&mut self, plan: &MigrationPlan) -> Result<(), StateError> {
        plan.rollback_order()
            .try_for_each(|step| self.rollback_step(step))
    }

    /// Applies one step's `up` operations.
    ///
    /// # Errors
    ///
    /// `InvalidState` when an operation does not fit the catalog.
    pub fn apply_step(&mut self, step: &MigrationStep) -> Result<(), StateError> {
        step.body
            .up
            .iter()
            .try_for_each(|op| self.apply_operation(op))
    }

    /// Applies one step's `down` operations.
    ///
    /// # Errors
    ///
    /// `InvalidState` when an operation does not fit the catalog.
    pub fn rollback_step(&mut self, step: &MigrationStep) -> Result<(), StateError> {
        step.body
            .down
            .iter()
            .try_for_each(|op| self.apply_operation(op))
    }

    /// Applies a single operation.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the operation does not fit the catalog.
    pub fn apply_operation(&mut self, operation: &MigrationOp) -> Result<(), StateError> {
        match operation {
            MigrationOp::CreateTable { table, columns } => {
                if self.table(table).is_some() {
                    return Err(StateError::InvalidState(format!(
                        "Table '{table}' already exists"
                    )));
                }
                self.tables.push(TableState::new(
                    table.clone(),
                    columns.iter().map(ExistingColumn::from).collect(),
                ));
            }

            MigrationOp::DropTable { table, .. } => {
                let position = self
                    .tables
                    .iter()
                    .position(|t| t.name == *table)
                    .ok_or_else(|| {
                        StateError::InvalidState(format!("Table '{table}' does not exist"))
                    })?;
                self.tables.remove(position);
            }

            MigrationOp::AddColumn { table, column } => {
                let t = self.table_mut(table)?;
                if t.column_mut(&column.name).is_some() {
                    return Err(StateError::InvalidState(format!(
                        "Column '{}' already exists in table '{table}'",
                        column.name
                    )));
                }
                t.columns.push(ExistingColumn::from(column));
            }

            MigrationOp::RemoveColumn { table, column } => {
                let t = self.table_mut(table)?;
                let position = t
                    .columns
                    .iter()
                    .position(|c| c.name == column.name)
                    .ok_or_else(|| {
                        StateError::InvalidState(format!(
                            "Column '{}' does not exist in table '{table}'",
                            column.name
                        ))
                    })?;
                t.columns.remove(position);
            }

            MigrationOp::ChangeColumn { table, column, .. } => {
                let t = self.table_mut(table)?;
                let existing = t.column_mut(&column.name).ok_or_else(|| {
                    StateError::InvalidState(format!(
                        "Column '{}' does not exist in table '{table}'",
                        column.name
                    ))
                })?;
                *existing = ExistingColumn::from(column);
            }

            MigrationOp::CreateIndex {
                table,
                name,
                columns,
            } => {
                let t = self.table_mut(table)?;
                if t.indexes.iter().any(|i| i.name == *name) {
                    return Err(StateError::InvalidState(format!(
                        "Index '{name}' already exists"
                    )));
                }
                t.indexes.push(NamedIndex {
                    name: name.clone(),
                    columns: columns.clone(),
                });
            }

            MigrationOp::DropIndex { table, name, .. } => {
                let t = self.table_mut(table)?;
                let position = t
                    .indexes
                    .iter()
                    .position(|i| i.name == *name)
                    .ok_or_else(|| {
                        StateError::InvalidState(format!("Index '{name}' does not exist"))
                    })?;
                t.indexes.remove(position);
            }
        }
        Ok(())
    }
}

impl SchemaReflector for SchemaState {
    type Error = Infallible;

    fn table_exists(&self, table: &str) -> Result<bool, Self::Error> {
        Ok(self.table(table).is_some())
    }

    fn current_columns(&self, table: &str) -> Result<Vec<ExistingColumn>, Self::Error> {
        Ok(self
            .table(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn current_indexes(&self, table: &str) -> Result<Vec<IndexSpec>, Self::Error> {
        Ok(self
            .table(table)
            .map(|t| {
                t.indexes
                    .iter()
                    .map(|i| IndexSpec::new(i.columns.iter().cloned()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// An in-memory migration ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLedger {
    known: Vec<String>,
    applied: BTreeSet<String>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger from known identifiers and the applied subset.
    #[must_use]
    pub fn from_parts<I>(known: Vec<String>, applied: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            known,
            applied: applied.into_iter().collect(),
        }
    }

    /// Adds an applied migration, builder style.
    #[must_use]
    pub fn with_applied(mut self, identifier: impl Into<String>) -> Self {
        self.record_applied(identifier);
        self
    }

    /// Adds a migration that was never applied, builder style.
    #[must_use]
    pub fn with_pending(mut self, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        if !self.known.contains(&identifier) {
            self.known.push(identifier);
        }
        self
    }

    /// Records a migration as known and applied.
    pub fn record_applied(&mut self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        if !self.known.contains(&identifier) {
            self.known.push(identifier.clone());
        }
        self.applied.insert(identifier);
    }

    /// Records every step of a plan as written and applied.
    pub fn record_plan(&mut self, plan: &MigrationPlan) {
        for step in plan {
            self.record_applied(step.identifier.to_string());
        }
    }
}

impl MigrationLedger for MemoryLedger {
    type Error = Infallible;

    fn known_migrations(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.known.clone())
    }

    fn pending_migrations(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .known
            .iter()
            .filter(|id| !self.applied.contains(*id))
            .cloned()
            .collect())
    }
}
