//! Comparison of desired and live schemas.
//!
//! Columns are compared by name. Attributes a column does not record are
//! compared at their effective defaults (`string` limit 255, `integer` width
//! 4, `decimal` precision 10 and scale 0), so a live `varchar(255)` equals a
//! declared `string` without limit.
//!
//! Changes are classified conservatively: only the type pairs listed in
//! [`classify`] are safe, everything else is lossy. Live columns that are no
//! longer declared are left alone, and index removal is never inferred.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GenerationError, LossyChange, Result};
use crate::reflect::LiveTable;
use crate::schema::{
    ColumnSpec, ColumnType, ExistingColumn, IndexSpec, ModelSchema, DEFAULT_DECIMAL_PRECISION,
    DEFAULT_INTEGER_WIDTH, DEFAULT_STRING_LIMIT, SMALLINT_WIDTH,
};

/// How one column changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Effective definitions are equal.
    Unchanged,
    /// Every storable value survives the change.
    Safe,
    /// Some storable values may not survive the change.
    Lossy,
}

/// Outcome for one declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnDiff {
    /// The column does not exist yet.
    Add {
        /// Declared definition.
        column: ColumnSpec,
    },
    /// The column exists and can be converted without loss.
    SafeAlter {
        /// Declared definition.
        column: ColumnSpec,
        /// Live definition.
        existing: ExistingColumn,
    },
    /// The column exists and converting it may lose data.
    LossyAlter {
        /// Declared definition.
        column: ColumnSpec,
        /// Live definition.
        existing: ExistingColumn,
    },
    /// The column exists as declared.
    Unchanged {
        /// Column name.
        name: String,
    },
}

impl ColumnDiff {
    /// Returns `true` for [`ColumnDiff::Unchanged`].
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged { .. })
    }
}

/// Outcome for one declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexDiff {
    /// No live index covers these columns.
    Add {
        /// Declared index.
        index: IndexSpec,
    },
    /// A live index covers exactly these columns.
    Unchanged {
        /// Declared index.
        index: IndexSpec,
    },
}

/// Differences between one table's desired and live shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Entity owning the table.
    pub entity: String,
    /// Table name.
    pub table: String,
    /// Whether the table exists.
    pub table_exists: bool,
    /// Per declared column, in declaration order.
    pub columns: Vec<ColumnDiff>,
    /// Per declared index, in declaration order.
    pub indexes: Vec<IndexDiff>,
}

impl SchemaDiff {
    /// Returns `true` if the table exists and nothing differs.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.table_exists
            && self.columns.iter().all(ColumnDiff::is_unchanged)
            && self
                .indexes
                .iter()
                .all(|i| matches!(i, IndexDiff::Unchanged { .. }))
    }

    /// Returns every lossy column change.
    #[must_use]
    pub fn lossy_changes(&self) -> Vec<LossyChange> {
        self.columns
            .iter()
            .filter_map(|diff| match diff {
                ColumnDiff::LossyAlter { column, existing } => Some(LossyChange {
                    entity: self.entity.clone(),
                    table: self.table.clone(),
                    column: column.name.clone(),
                    from: existing.to_string(),
                    to: column.to_string(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Options for the differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifferOptions {
    /// Accept lossy changes instead of failing.
    pub force: bool,
}

/// Compares desired schemas with live tables.
#[derive(Debug, Default)]
pub struct SchemaDiffer {
    options: DifferOptions,
}

impl SchemaDiffer {
    /// Creates a differ that refuses lossy changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a differ with custom options.
    #[must_use]
    pub const fn with_options(options: DifferOptions) -> Self {
        Self { options }
    }

    /// Diffs one desired table against its live counterpart, `None` when the
    /// table does not exist.
    #[must_use]
    pub fn diff(&self, desired: &ModelSchema, live: Option<&LiveTable>) -> SchemaDiff {
        let Some(live) = live else {
            return SchemaDiff {
                entity: desired.entity.clone(),
                table: desired.table.clone(),
                table_exists: false,
                columns: desired
                    .columns
                    .iter()
                    .map(|column| ColumnDiff::Add {
                        column: column.clone(),
                    })
                    .collect(),
                indexes: desired
                    .indexes
                    .iter()
                    .map(|index| IndexDiff::Add {
                        index: index.clone(),
                    })
                    .collect(),
            };
        };

        let columns = desired
            .columns
            .iter()
            .map(|column| {
                let Some(existing) = live.columns.iter().find(|c| c.name == column.name) else {
                    return ColumnDiff::Add {
                        column: column.clone(),
                    };
                };
                match classify(column, existing) {
                    Change::Unchanged => ColumnDiff::Unchanged {
                        name: column.name.clone(),
                    },
                    Change::Safe => ColumnDiff::SafeAlter {
                        column: column.clone(),
                        existing: existing.clone(),
                    },
                    Change::Lossy => ColumnDiff::LossyAlter {
                        column: column.clone(),
                        existing: existing.clone(),
                    },
                }
            })
            .collect();

        let indexes = desired
            .indexes
            .iter()
            .map(|index| {
                if live.indexes.iter().any(|live| live.columns == index.columns) {
                    IndexDiff::Unchanged {
                        index: index.clone(),
                    }
                } else {
                    IndexDiff::Add {
                        index: index.clone(),
                    }
                }
            })
            .collect();

        let diff = SchemaDiff {
            entity: desired.entity.clone(),
            table: desired.table.clone(),
            table_exists: true,
            columns,
            indexes,
        };
        debug!(
            entity = %diff.entity,
            table = %diff.table,
            unchanged = diff.is_unchanged(),
            "Diffed table"
        );
        diff
    }

    /// Fails closed when any diff holds a lossy change, unless forced.
    ///
    /// # Errors
    ///
    /// `LossyAlter` naming every offending column.
    pub fn check(&self, diffs: &[SchemaDiff]) -> Result<()> {
        let lossy: Vec<LossyChange> = diffs.iter().flat_map(SchemaDiff::lossy_changes).collect();
        if lossy.is_empty() {
            return Ok(());
        }
        for change in &lossy {
            warn!(
                table = %change.table,
                column = %change.column,
                from = %change.from,
                to = %change.to,
                forced = self.options.force,
                "Column change may lose data"
            );
        }
        if self.options.force {
            Ok(())
        } else {
            Err(GenerationError::LossyAlter(lossy))
        }
    }
}

/// Effective storage shape of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    String { limit: u32 },
    Text,
    Integer { width: u32 },
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Boolean,
    DateTime,
}

impl Shape {
    fn of(
        column_type: ColumnType,
        limit: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> Self {
        match column_type {
            ColumnType::String => Self::String {
                limit: limit.unwrap_or(DEFAULT_STRING_LIMIT),
            },
            ColumnType::Text => Self::Text,
            ColumnType::Integer => Self::Integer {
                width: limit.unwrap_or(DEFAULT_INTEGER_WIDTH),
            },
            ColumnType::SmallInt => Self::Integer {
                width: SMALLINT_WIDTH,
            },
            ColumnType::Float => Self::Float,
            ColumnType::Double => Self::Double,
            ColumnType::Decimal => Self::Decimal {
                precision: precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                scale: scale.unwrap_or(0),
            },
            ColumnType::Boolean => Self::Boolean,
            ColumnType::DateTime => Self::DateTime,
        }
    }
}

/// Classifies the change from a live column to a declared one.
///
/// Safe changes:
/// - `string` to `text`, or to a `string` with a larger limit
/// - an integer to a wider integer, or (up to four bytes) to `double`
/// - `float` to `double`
/// - `decimal` to a `decimal` keeping both precision and scale or growing them
///
/// Every other difference is lossy.
#[must_use]
pub fn classify(desired: &ColumnSpec, existing: &ExistingColumn) -> Change {
    let from = Shape::of(
        existing.column_type,
        existing.limit,
        existing.precision,
        existing.scale,
    );
    let to = Shape::of(
        desired.column_type,
        desired.limit,
        desired.precision,
        desired.scale,
    );
    if from == to {
        return Change::Unchanged;
    }
    let safe = match (from, to) {
        (Shape::String { limit: a }, Shape::String { limit: b }) => b >= a,
        (Shape::String { .. }, Shape::Text) | (Shape::Float, Shape::Double) => true,
        (Shape::Integer { width: a }, Shape::Integer { width: b }) => b >= a,
        (Shape::Integer { width }, Shape::Double) => width <= DEFAULT_INTEGER_WIDTH,
        (
            Shape::Decimal {
                precision: p1,
                scale: s1,
            },
            Shape::Decimal {
                precision: p2,
                scale: s2,
            },
        ) => p2 >= p1 && s2 >= s1,
        _ => false,
    };
    if safe {
        Change::Safe
    } else {
        Change::Lossy
    }
}
