//! Migration executor.
//!
//! Applies pending migration files and rolls back the latest one. Each file
//! runs in its own transaction together with its history record.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::directory::{MigrationDirectory, MigrationFile};
use crate::error::Result;
use crate::history::{MigrationHistory, RECORD_APPLIED_SQL, RECORD_UNAPPLIED_SQL};

/// Executes migration files against a database.
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    pool: SqlitePool,
    history: MigrationHistory,
}

impl MigrationExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        let history = MigrationHistory::new(pool.clone());
        Self { pool, history }
    }

    /// Ensures the history table exists.
    pub async fn init(&self) -> Result<()> {
        self.history.ensure_table().await
    }

    /// Returns the migration history.
    #[must_use]
    pub const fn history(&self) -> &MigrationHistory {
        &self.history
    }

    /// Applies every pending file in identifier order. Returns the applied
    /// identifiers.
    pub async fn apply_pending(&self, directory: &MigrationDirectory) -> Result<Vec<String>> {
        self.init().await?;
        let applied = self.history.applied_set().await?;
        let mut done = Vec::new();
        for file in directory.scan()? {
            if applied.contains(&file.identifier) {
                continue;
            }
            self.apply(&file).await?;
            done.push(file.identifier);
        }
        info!(count = done.len(), "Applied pending migrations");
        Ok(done)
    }

    /// Applies one file and records it.
    pub async fn apply(&self, file: &MigrationFile) -> Result<()> {
        info!(identifier = %file.identifier, name = %file.name, "Applying migration");
        let sql = file.read()?;

        let mut tx = self.pool.begin().await?;
        for statement in &sql.up {
            debug!(sql = %statement, "Executing SQL");
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(RECORD_APPLIED_SQL)
            .bind(&file.identifier)
            .bind(&file.name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Rolls back the most recently applied migration. Returns its
    /// identifier, or `None` when nothing is applied.
    pub async fn rollback_last(&self, directory: &MigrationDirectory) -> Result<Option<String>> {
        self.init().await?;
        let Some(last) = self.history.get_applied().await?.pop() else {
            info!("No migrations to roll back");
            return Ok(None);
        };
        let Some(file) = directory
            .scan()?
            .into_iter()
            .find(|f| f.identifier == last.identifier)
        else {
            warn!(
                identifier = %last.identifier,
                "Applied migration has no file, forgetting it without running SQL"
            );
            self.history.record_unapplied(&last.identifier).await?;
            return Ok(Some(last.identifier));
        };

        info!(identifier = %file.identifier, name = %file.name, "Rolling back migration");
        let sql = file.read()?;
        let mut tx = self.pool.begin().await?;
        for statement in &sql.down {
            debug!(sql = %statement, "Executing SQL");
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(RECORD_UNAPPLIED_SQL)
            .bind(&file.identifier)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(file.identifier))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap();
        rows.into_iter().map(|(name,)| name).collect()
    }

    #[tokio::test]
    async fn test_apply_and_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("001_create_users.sql"),
            "-- migrant:up\nCREATE TABLE \"users\" (\n  \"name\" varchar(255)\n);\n\n\
             -- migrant:down\nDROP TABLE \"users\";\n",
        )
        .unwrap();
        let directory = MigrationDirectory::new(dir.path());
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone());

        let applied = executor.apply_pending(&directory).await.unwrap();
        assert_eq!(applied, vec!["001".to_string()]);
        assert_eq!(table_names(&pool).await, vec!["migrant_migrations", "users"]);
        assert!(executor.apply_pending(&directory).await.unwrap().is_empty());

        let rolled_back = executor.rollback_last(&directory).await.unwrap();
        assert_eq!(rolled_back.as_deref(), Some("001"));
        assert_eq!(table_names(&pool).await, vec!["migrant_migrations"]);
        assert!(!executor.history().is_applied("001").await.unwrap());
        assert!(executor.rollback_last(&directory).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("001_broken.sql"),
            "-- migrant:up\nCREATE TABLE t (a text);\nNOT SQL AT ALL;\n-- migrant:down\n",
        )
        .unwrap();
        let directory = MigrationDirectory::new(dir.path());
        let pool = create_test_pool().await;
        let executor = MigrationExecutor::new(pool.clone());

        assert!(executor.apply_pending(&directory).await.is_err());
        assert!(!executor.history().is_applied("001").await.unwrap());
        assert_eq!(table_names(&pool).await, vec!["migrant_migrations"]);
    }
}
