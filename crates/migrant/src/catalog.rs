//! SQLite schema reflection.
//!
//! Loads the live catalog into a [`SchemaState`], which the core planner
//! reads through its reflection trait. Declared SQLite types are mapped back
//! to the canonical column vocabulary. The implicit `id` primary key is not
//! reported, matching the columns a `CreateTable` operation declares.

use migrant_core::schema::{ColumnType, ExistingColumn};
use migrant_core::state::{SchemaState, TableState};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::dialect::PRIMARY_KEY_COLUMN;
use crate::error::{MigrantError, Result};
use crate::history::HISTORY_TABLE;

/// Reads table, column and index definitions from a SQLite database.
#[derive(Debug, Clone, Copy)]
pub struct SqliteCatalog;

impl SqliteCatalog {
    /// Loads every user table except the migration history.
    ///
    /// Only explicitly created indexes are reported; the implicit indexes
    /// behind `UNIQUE` and primary key constraints are skipped.
    ///
    /// # Errors
    ///
    /// Database errors, or `UnsupportedColumnType` for a declared type with
    /// no canonical counterpart.
    pub async fn load(pool: &SqlitePool) -> Result<SchemaState> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ? \
             ORDER BY name",
        )
        .bind(HISTORY_TABLE)
        .fetch_all(pool)
        .await?;

        let mut state = SchemaState::new();
        for (table,) in tables {
            state.insert_table(Self::load_table(pool, &table).await?);
        }
        Ok(state)
    }

    async fn load_table(pool: &SqlitePool, table: &str) -> Result<TableState> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT name, type, pk FROM pragma_table_info(?) ORDER BY cid")
                .bind(table)
                .fetch_all(pool)
                .await?;
        let columns = rows
            .iter()
            .filter(|(name, _, pk)| !(*pk > 0 && name == PRIMARY_KEY_COLUMN))
            .map(|(name, declared, _)| parse_declared_type(table, name, declared))
            .collect::<Result<Vec<_>>>()?;

        let mut state = TableState::new(table, columns);
        let indexes: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM pragma_index_list(?) WHERE origin = 'c' ORDER BY name",
        )
        .bind(table)
        .fetch_all(pool)
        .await?;
        for (index,) in indexes {
            let columns: Vec<(String,)> =
                sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                    .bind(&index)
                    .fetch_all(pool)
                    .await?;
            state = state.index(index, columns.into_iter().map(|(name,)| name));
        }

        debug!(
            table = %table,
            columns = state.columns.len(),
            indexes = state.indexes.len(),
            "Loaded live table"
        );
        Ok(state)
    }
}

/// Maps a declared SQLite column type to a canonical column.
///
/// # Errors
///
/// `UnsupportedColumnType` when the declared type is not recognized.
pub fn parse_declared_type(table: &str, column: &str, declared: &str) -> Result<ExistingColumn> {
    let unsupported = || MigrantError::UnsupportedColumnType {
        table: table.to_string(),
        column: column.to_string(),
        declared: declared.to_string(),
    };

    let normalized = declared.trim().to_ascii_lowercase();
    let (base, args) = match normalized.split_once('(') {
        Some((base, rest)) => (
            base.trim(),
            rest.trim_end_matches(')')
                .split(',')
                .map(|arg| arg.trim().parse::<u32>().map_err(|_| unsupported()))
                .collect::<Result<Vec<_>>>()?,
        ),
        None => (normalized.as_str(), Vec::new()),
    };
    let first = args.first().copied();

    let existing = match base {
        "varchar" | "character varying" | "char" | "character" | "string" => {
            let column = ExistingColumn::new(column, ColumnType::String);
            match first {
                Some(limit) => column.limit(limit),
                None => column,
            }
        }
        "text" | "clob" => ExistingColumn::new(column, ColumnType::Text),
        "tinyint" => ExistingColumn::new(column, ColumnType::Integer).limit(1),
        "smallint" => ExistingColumn::new(column, ColumnType::Integer).limit(2),
        "mediumint" => ExistingColumn::new(column, ColumnType::Integer).limit(3),
        "bigint" => ExistingColumn::new(column, ColumnType::Integer).limit(8),
        "integer" | "int" => {
            let column = ExistingColumn::new(column, ColumnType::Integer);
            match first {
                Some(width) => column.limit(width),
                None => column,
            }
        }
        "float" | "real" => ExistingColumn::new(column, ColumnType::Float),
        "double" | "double precision" => ExistingColumn::new(column, ColumnType::Double),
        "decimal" | "numeric" => {
            let narrow = |value: u32| u8::try_from(value).map_err(|_| unsupported());
            let mut column = ExistingColumn::new(column, ColumnType::Decimal);
            if let Some(precision) = first {
                column = column.precision(narrow(precision)?);
            }
            if let Some(scale) = args.get(1).copied() {
                column = column.scale(narrow(scale)?);
            }
            column
        }
        "boolean" | "bool" => ExistingColumn::new(column, ColumnType::Boolean),
        "datetime" | "timestamp" | "date" => ExistingColumn::new(column, ColumnType::DateTime),
        _ => return Err(unsupported()),
    };
    Ok(existing)
}
