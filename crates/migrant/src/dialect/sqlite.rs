//! SQLite dialect for migrations.
//!
//! Tables get an implicit auto-increment `id` primary key. SQLite cannot
//! change a column's type in place, so a column change rebuilds the table:
//! create `<table>_new` with the new definitions, copy the rows, drop the
//! old table, rename, then recreate its indexes. Declared types keep the canonical vocabulary (`varchar(255)`,
//! `decimal(10, 2)`, `tinyint`) so the catalog reads back what was written.

use migrant_core::operations::MigrationOp;
use migrant_core::schema::{
    ColumnSpec, ColumnType, DEFAULT_DECIMAL_PRECISION, DEFAULT_STRING_LIMIT,
};
use migrant_core::state::{SchemaState, StateError, TableState};

use super::MigrationDialect;
use crate::error::Result;

/// Name of the implicit primary key column.
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, table: &str, columns: &[ColumnSpec]) -> String {
        let mut definitions = Vec::with_capacity(columns.len() + 1);
        if !columns.iter().any(|c| c.name == PRIMARY_KEY_COLUMN) {
            definitions.push(format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                self.quote_identifier(PRIMARY_KEY_COLUMN)
            ));
        }
        definitions.extend(columns.iter().map(|c| self.column_definition(c)));

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(table),
            definitions.join(",\n  ")
        )
    }

    fn add_column_sql(&self, table: &str, column: &ColumnSpec) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// SQLite 3.35.0+.
    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Rebuilds `table` with the column definitions it currently holds.
    fn recreate_table_sql(&self, table: &TableState) -> Vec<String> {
        let staging = format!("{}_new", table.name);
        let columns: Vec<ColumnSpec> = table.columns.iter().map(ColumnSpec::from).collect();

        let mut copied = Vec::with_capacity(columns.len() + 1);
        if !columns.iter().any(|c| c.name == PRIMARY_KEY_COLUMN) {
            copied.push(self.quote_identifier(PRIMARY_KEY_COLUMN));
        }
        copied.extend(columns.iter().map(|c| self.quote_identifier(&c.name)));
        let copied = copied.join(", ");

        let mut sql = vec![
            self.create_table_sql(&staging, &columns),
            format!(
                "INSERT INTO {} ({copied}) SELECT {copied} FROM {}",
                self.quote_identifier(&staging),
                self.quote_identifier(&table.name)
            ),
            format!("DROP TABLE {}", self.quote_identifier(&table.name)),
            format!(
                "ALTER TABLE {} RENAME TO {}",
                self.quote_identifier(&staging),
                self.quote_identifier(&table.name)
            ),
        ];
        sql.extend(
            table
                .indexes
                .iter()
                .map(|index| self.create_index_sql(&table.name, &index.name, &index.columns)),
        );
        sql
    }

    fn create_index_sql(&self, table: &str, name: &str, columns: &[String]) -> String {
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote_identifier(name),
            self.quote_identifier(table),
            quoted.join(", ")
        )
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn generate_sql(&self, operation: &MigrationOp, catalog: &SchemaState) -> Result<Vec<String>> {
        let sql = match operation {
            MigrationOp::CreateTable { table, columns } => {
                vec![self.create_table_sql(table, columns)]
            }
            MigrationOp::DropTable { table, .. } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(table))]
            }
            MigrationOp::AddColumn { table, column } => vec![self.add_column_sql(table, column)],
            MigrationOp::RemoveColumn { table, column } => {
                vec![self.drop_column_sql(table, &column.name)]
            }
            MigrationOp::ChangeColumn { table, .. } => {
                let rebuilt = catalog.table(table).ok_or_else(|| {
                    StateError::InvalidState(format!("Table '{table}' does not exist"))
                })?;
                self.recreate_table_sql(rebuilt)
            }
            MigrationOp::CreateIndex {
                table,
                name,
                columns,
            } => vec![self.create_index_sql(table, name, columns)],
            MigrationOp::DropIndex { name, .. } => {
                vec![format!("DROP INDEX {}", self.quote_identifier(name))]
            }
        };
        Ok(sql)
    }

    fn type_name(&self, column: &ColumnSpec) -> String {
        match column.column_type {
            ColumnType::String => {
                format!("varchar({})", column.limit.unwrap_or(DEFAULT_STRING_LIMIT))
            }
            ColumnType::Text => "text".to_string(),
            ColumnType::Integer => match column.limit {
                None | Some(4) => "integer".to_string(),
                Some(1) => "tinyint".to_string(),
                Some(2) => "smallint".to_string(),
                Some(3) => "mediumint".to_string(),
                Some(8) => "bigint".to_string(),
                Some(width) => format!("integer({width})"),
            },
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Float => "float".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Decimal => format!(
                "decimal({}, {})",
                column.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                column.scale.unwrap_or(0)
            ),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::DateTime => "datetime".to_string(),
        }
    }
}
