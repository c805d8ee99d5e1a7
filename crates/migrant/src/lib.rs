//! SQLite adapter and CLI for structure-by-example migrations.
//!
//! `migrant` connects the planner in `migrant-core` to a SQLite database
//! and a directory of migration files:
//! - **Catalog** - Reads live tables, columns and indexes
//! - **History** - Tracks applied migration identifiers
//! - **Directory** - Scans and writes `<identifier>_<name>.sql` files
//! - **Dialect** - Renders operations as SQLite SQL
//! - **Executor** - Applies and rolls back migration files
//! - **Structure** - Reads entity declarations from JSON
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the migrations the structure file calls for
//! migrant --structure structure.json plan
//!
//! # Write them, then apply them
//! migrant --structure structure.json plan --write
//! migrant migrate
//!
//! # Show known and pending migrations
//! migrant status
//!
//! # Print a mock row
//! migrant --structure structure.json mock --entity Business
//! ```

pub mod catalog;
pub mod dialect;
pub mod directory;
pub mod error;
pub mod executor;
pub mod history;
pub mod planner;
pub mod structure;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{parse_declared_type, SqliteCatalog};
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::directory::{MigrationDirectory, MigrationFile, MigrationSql};
    pub use crate::error::{MigrantError, Result};
    pub use crate::executor::MigrationExecutor;
    pub use crate::history::{AppliedMigration, MigrationHistory};
    pub use crate::planner::{plan_migrations, plan_migrations_at, snapshot};
    pub use crate::structure::Structure;
}
