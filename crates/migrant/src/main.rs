//! migrant CLI
//!
//! Plans, writes and applies structure-by-example migrations for SQLite.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use migrant::directory::render_plan;
use migrant::prelude::*;
use migrant_core::prelude::{IdentifierConvention, MigrationLedger};

/// Structure-by-example migrations for SQLite.
#[derive(Parser)]
#[command(name = "migrant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Structure file declaring the entities.
    #[arg(short, long, default_value = "structure.json")]
    structure: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan the migrations the structure file calls for.
    Plan {
        /// Emit changes that may lose data instead of refusing.
        #[arg(long)]
        force: bool,

        /// Use sequential identifiers instead of timestamps.
        #[arg(long)]
        sequential: bool,

        /// Longest allowed file name.
        #[arg(long)]
        max_file_name_len: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Sql)]
        format: Format,

        /// Write the migration files instead of printing them.
        #[arg(long)]
        write: bool,
    },

    /// Apply pending migrations.
    Migrate,

    /// Roll back the latest applied migration.
    Rollback,

    /// Show known and pending migrations.
    Status,

    /// Print one mock row for an entity.
    Mock {
        /// Entity name.
        #[arg(short, long)]
        entity: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Sql,
    Json,
}

async fn connect(database: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let directory = MigrationDirectory::new(&cli.migrations_dir);

    match cli.command {
        Commands::Plan {
            force,
            sequential,
            max_file_name_len,
            format,
            write,
        } => {
            let structure = Structure::load(&cli.structure)?;
            let mut config = structure.config.clone().unwrap_or_default();
            if force {
                config = config.force(true);
            }
            if sequential {
                config = config.convention(IdentifierConvention::Sequential);
            }
            if let Some(len) = max_file_name_len {
                config = config.max_file_name_len(len);
            }
            debug!(
                force = config.force,
                convention = ?config.convention,
                max_file_name_len = config.max_file_name_len,
                "Generator configuration"
            );

            let pool = connect(&cli.database).await?;
            let plan = plan_migrations(&pool, &directory, &structure.declarations, &config).await?;
            if plan.is_empty() {
                info!("Schema is up to date.");
                return Ok(());
            }

            let dialect = SqliteDialect::new();
            let catalog = SqliteCatalog::load(&pool).await?;
            if write {
                for path in directory.write_plan(&plan, &dialect, &catalog)? {
                    println!("{}", path.display());
                }
            } else {
                match format {
                    Format::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                    Format::Sql => {
                        let rendered = render_plan(&plan, &dialect, &catalog)?;
                        for (step, content) in plan.iter().zip(rendered) {
                            println!("-- {}", step.file_name);
                            println!("{content}");
                        }
                    }
                }
            }
        }

        Commands::Migrate => {
            let pool = connect(&cli.database).await?;
            let applied = MigrationExecutor::new(pool)
                .apply_pending(&directory)
                .await?;
            if applied.is_empty() {
                info!("No pending migrations.");
            }
        }

        Commands::Rollback => {
            let pool = connect(&cli.database).await?;
            if let Some(identifier) = MigrationExecutor::new(pool)
                .rollback_last(&directory)
                .await?
            {
                info!(identifier = %identifier, "Rolled back.");
            }
        }

        Commands::Status => {
            let pool = connect(&cli.database).await?;
            let (_, ledger) = snapshot(&pool, &directory).await?;
            let pending = ledger.pending_migrations()?;
            let mut known = ledger.known_migrations()?;
            known.sort();

            println!("\nMigrations:");
            println!("{:-<60}", "");
            for identifier in &known {
                let mark = if pending.contains(identifier) { ' ' } else { 'X' };
                println!(" [{mark}] {identifier}");
            }
            println!();
            info!(known = known.len(), pending = pending.len(), "Status");
        }

        Commands::Mock { entity } => {
            let structure = Structure::load(&cli.structure)?;
            let row = migrant_core::generator::mock_row(&structure.declarations, &entity)?;
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
    }

    Ok(())
}
