//! Migration history tracking.
//!
//! The `migrant_migrations` table records the identifier of every migration
//! file applied to the database. Pending migrations are the files on disk
//! whose identifier is missing here.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::error::Result;

/// Name of the history table.
pub const HISTORY_TABLE: &str = "migrant_migrations";

/// SQL to create the history table.
pub const CREATE_HISTORY_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS migrant_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL to record an applied migration.
pub const RECORD_APPLIED_SQL: &str =
    "INSERT INTO migrant_migrations (identifier, name) VALUES (?, ?)";

/// SQL to forget an applied migration.
pub const RECORD_UNAPPLIED_SQL: &str = "DELETE FROM migrant_migrations WHERE identifier = ?";

/// A record of an applied migration.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Row id in the history table.
    pub id: i64,
    /// Migration identifier, as written in the file name.
    pub identifier: String,
    /// Derived migration name.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Reads and writes the history table.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    pool: SqlitePool,
}

impl MigrationHistory {
    /// Creates a history manager over `pool`.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensures the history table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_HISTORY_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a migration as applied.
    pub async fn record_applied(&self, identifier: &str, name: &str) -> Result<()> {
        sqlx::query(RECORD_APPLIED_SQL)
            .bind(identifier)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes a migration record. Returns whether a record existed.
    pub async fn record_unapplied(&self, identifier: &str) -> Result<bool> {
        let result = sqlx::query(RECORD_UNAPPLIED_SQL)
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Checks if a migration has been applied.
    pub async fn is_applied(&self, identifier: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM migrant_migrations WHERE identifier = ?")
                .bind(identifier)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Gets all applied migrations in the order they were applied.
    pub async fn get_applied(&self) -> Result<Vec<AppliedMigration>> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, identifier, name, applied_at FROM migrant_migrations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, identifier, name, applied_at)| AppliedMigration {
                id,
                identifier,
                name,
                applied_at: parse_applied_at(&applied_at),
            })
            .collect())
    }

    /// Gets the set of applied identifiers.
    pub async fn applied_set(&self) -> Result<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT identifier FROM migrant_migrations")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(identifier,)| identifier).collect())
    }
}

fn parse_applied_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}
