//! Error types for schema generation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Boxed error from a collaborator (reflection or ledger).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One column whose live definition cannot be converted to the declared one
/// without possibly discarding data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossyChange {
    /// Entity owning the table.
    pub entity: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Live definition, rendered.
    pub from: String,
    /// Declared definition, rendered.
    pub to: String,
}

impl fmt::Display for LossyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({} -> {}) on {}",
            self.table, self.column, self.from, self.to, self.entity
        )
    }
}

fn list_lossy(changes: &[LossyChange]) -> String {
    changes
        .iter()
        .map(|c| format!("  - {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that abort a generation run.
///
/// No failure is downgraded or retried: the first one ends the run and no
/// plan is returned.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No column type could be inferred for an example.
    #[error("Cannot infer a column type for '{entity}.{column}' from {shape}")]
    UnresolvedType {
        /// Entity declaring the field.
        entity: String,
        /// Field name.
        column: String,
        /// Description of the example that did not match.
        shape: String,
    },

    /// A belongs-to association names an entity that is not declared.
    #[error("Association '{association}' on '{entity}' refers to unknown entity '{target}'")]
    UnknownAssociationTarget {
        /// Entity declaring the association.
        entity: String,
        /// Association name.
        association: String,
        /// Entity the association resolves to.
        target: String,
    },

    /// An entity inherits from an entity that is not declared.
    #[error("Entity '{entity}' inherits from unknown entity '{parent}'")]
    UnknownParentEntity {
        /// Inheriting entity.
        entity: String,
        /// Missing parent.
        parent: String,
    },

    /// Two declarations produce the same column with different definitions.
    #[error("Column '{column}' is defined more than once for '{entity}'")]
    ConflictingColumnDefinition {
        /// Entity whose schema has the duplicate.
        entity: String,
        /// Duplicated column name.
        column: String,
    },

    /// One or more declared changes may lose data and `force` is not set.
    #[error("Refusing to generate migrations, these changes may lose data:\n{}", list_lossy(.0))]
    LossyAlter(Vec<LossyChange>),

    /// Migrations exist that were never applied.
    #[error("Pending migrations must be applied first: {}", .0.join(", "))]
    PendingMigrationsExist(Vec<String>),

    /// Entities reference each other in a cycle.
    #[error("Dependency cycle between entities: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// The same migration identifier was produced twice.
    #[error("Migration identifier '{0}' was assigned more than once")]
    IdentifierCollision(String),

    /// An operation referenced an entity that is not declared.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The schema reflection collaborator failed.
    #[error("Schema reflection failed: {0}")]
    Reflection(#[source] BoxError),

    /// The migration ledger collaborator failed.
    #[error("Migration ledger query failed: {0}")]
    Ledger(#[source] BoxError),
}

impl GenerationError {
    /// Wraps a reflection collaborator error.
    pub fn reflection(err: impl Into<BoxError>) -> Self {
        Self::Reflection(err.into())
    }

    /// Wraps a ledger collaborator error.
    pub fn ledger(err: impl Into<BoxError>) -> Self {
        Self::Ledger(err.into())
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_alter_names_every_column() {
        let err = GenerationError::LossyAlter(vec![
            LossyChange {
                entity: "Business".into(),
                table: "businesses".into(),
                column: "landline".into(),
                from: "text".into(),
                to: "integer".into(),
            },
            LossyChange {
                entity: "Business".into(),
                table: "businesses".into(),
                column: "mobile".into(),
                from: "string".into(),
                to: "boolean".into(),
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("businesses.landline (text -> integer)"));
        assert!(message.contains("businesses.mobile (string -> boolean)"));
    }

    #[test]
    fn test_collaborator_errors_keep_source() {
        use std::error::Error as _;

        let io = std::io::Error::other("connection reset");
        let err = GenerationError::reflection(io);
        assert!(err.to_string().contains("connection reset"));
        assert!(err.source().is_some());
    }
}
