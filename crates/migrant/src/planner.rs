//! Planning against a live SQLite database.

use chrono::{NaiveDateTime, Utc};
use migrant_core::config::GeneratorConfig;
use migrant_core::declaration::DeclarationSet;
use migrant_core::generator::MigrationGenerator;
use migrant_core::state::{MemoryLedger, SchemaState};
use migrant_core::synthesizer::MigrationPlan;
use sqlx::sqlite::SqlitePool;

use crate::catalog::SqliteCatalog;
use crate::directory::MigrationDirectory;
use crate::error::Result;
use crate::history::MigrationHistory;

/// Loads the live catalog and the ledger of a migrations directory.
pub async fn snapshot(
    pool: &SqlitePool,
    directory: &MigrationDirectory,
) -> Result<(SchemaState, MemoryLedger)> {
    let history = MigrationHistory::new(pool.clone());
    history.ensure_table().await?;
    let ledger = directory.ledger(&history.applied_set().await?)?;
    let catalog = SqliteCatalog::load(pool).await?;
    Ok((catalog, ledger))
}

/// Plans migrations for `declarations` against the database and directory.
pub async fn plan_migrations(
    pool: &SqlitePool,
    directory: &MigrationDirectory,
    declarations: &DeclarationSet,
    config: &GeneratorConfig,
) -> Result<MigrationPlan> {
    plan_migrations_at(pool, directory, declarations, config, Utc::now().naive_utc()).await
}

/// Same as [`plan_migrations`], stamping identifiers as of `now`.
pub async fn plan_migrations_at(
    pool: &SqlitePool,
    directory: &MigrationDirectory,
    declarations: &DeclarationSet,
    config: &GeneratorConfig,
    now: NaiveDateTime,
) -> Result<MigrationPlan> {
    let (catalog, ledger) = snapshot(pool, directory).await?;
    let plan = MigrationGenerator::new(declarations, config.clone())
        .generate_plan_at(&catalog, &ledger, now)?;
    Ok(plan)
}
