//! Migration files on disk.
//!
//! Files are named `<identifier>_<name>.<ext>`. Each holds an `up` section
//! and a `down` section of `;`-terminated statements:
//!
//! ```sql
//! -- migrant:up
//! CREATE TABLE "businesses" (...);
//!
//! -- migrant:down
//! DROP TABLE "businesses";
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use migrant_core::operations::MigrationOp;
use migrant_core::state::{MemoryLedger, SchemaState};
use migrant_core::synthesizer::{parse_identifier, MigrationPlan, MigrationStep};
use tracing::{debug, info};

use crate::dialect::MigrationDialect;
use crate::error::{MigrantError, Result};

/// Marker opening the forward section.
pub const UP_MARKER: &str = "-- migrant:up";

/// Marker opening the rollback section.
pub const DOWN_MARKER: &str = "-- migrant:down";

/// One migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Identifier prefix of the file name.
    pub identifier: String,
    /// Name between the identifier and the extension.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
}

impl MigrationFile {
    /// Reads the file's statements.
    ///
    /// # Errors
    ///
    /// IO errors, or `ParseError` when a section marker is missing.
    pub fn read(&self) -> Result<MigrationSql> {
        let content = fs::read_to_string(&self.path)?;
        MigrationSql::parse(&content).ok_or_else(|| MigrantError::ParseError {
            path: self.path.clone(),
            message: format!("expected '{UP_MARKER}' followed by '{DOWN_MARKER}'"),
        })
    }
}

/// Statements of one migration file, comments removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSql {
    /// Forward statements.
    pub up: Vec<String>,
    /// Rollback statements.
    pub down: Vec<String>,
}

impl MigrationSql {
    /// Splits file content into sections and statements.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let (_, rest) = content.split_once(UP_MARKER)?;
        let (up, down) = rest.split_once(DOWN_MARKER)?;
        Some(Self {
            up: statements(up),
            down: statements(down),
        })
    }
}

fn statements(section: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    for line in section.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        buffer.push(line);
        if trimmed.ends_with(';') {
            let statement = buffer.join("\n");
            let statement = statement.trim().trim_end_matches(';').trim_end();
            out.push(statement.to_string());
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        out.push(buffer.join("\n").trim().to_string());
    }
    out
}

/// Renders one step as file content.
///
/// `catalog` is the schema the step applies to. Each operation is rendered
/// against the catalog as it stands once that operation has run.
///
/// # Errors
///
/// `State` when the step does not fit `catalog`.
pub fn render_step<D: MigrationDialect + ?Sized>(
    step: &MigrationStep,
    dialect: &D,
    catalog: &SchemaState,
) -> Result<String> {
    let mut state = catalog.clone();
    let up = render_operations(&step.body.up, dialect, &mut state)?;
    let down = render_operations(&step.body.down, dialect, &mut state)?;
    Ok(format!("{UP_MARKER}\n{up}\n\n{DOWN_MARKER}\n{down}\n"))
}

/// Renders every step of a plan, each against the catalog left by the
/// steps before it.
///
/// # Errors
///
/// `State` when a step does not fit the catalog.
pub fn render_plan<D: MigrationDialect + ?Sized>(
    plan: &MigrationPlan,
    dialect: &D,
    catalog: &SchemaState,
) -> Result<Vec<String>> {
    let mut state = catalog.clone();
    let mut rendered = Vec::with_capacity(plan.len());
    for step in plan {
        rendered.push(render_step(step, dialect, &state)?);
        state.apply_step(step)?;
    }
    Ok(rendered)
}

fn render_operations<D: MigrationDialect + ?Sized>(
    operations: &[MigrationOp],
    dialect: &D,
    state: &mut SchemaState,
) -> Result<String> {
    let mut statements = Vec::new();
    for operation in operations {
        state.apply_operation(operation)?;
        statements.extend(
            dialect
                .generate_sql(operation, state)?
                .into_iter()
                .map(|sql| format!("{sql};")),
        );
    }
    Ok(statements.join("\n\n"))
}

/// Splits `<identifier>_<name>.<ext>` into identifier and name.
#[must_use]
pub fn parse_file_name(file_name: &str) -> Option<(String, String)> {
    let (identifier, rest) = file_name.split_once('_')?;
    if identifier.is_empty() || !identifier.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = rest.rsplit_once('.').map_or(rest, |(name, _)| name);
    if name.is_empty() {
        return None;
    }
    Some((identifier.to_string(), name.to_string()))
}

/// A directory of migration files.
#[derive(Debug, Clone)]
pub struct MigrationDirectory {
    path: PathBuf,
}

impl MigrationDirectory {
    /// Creates a handle; the directory need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists migration files in identifier order. A missing directory holds
    /// no migrations.
    ///
    /// # Errors
    ///
    /// IO errors while listing the directory.
    pub fn scan(&self) -> Result<Vec<MigrationFile>> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some((identifier, name)) = parse_file_name(&file_name) else {
                debug!(file = %file_name, "Skipping file without a migration identifier");
                continue;
            };
            files.push(MigrationFile {
                identifier,
                name,
                path: entry.path(),
            });
        }
        files.sort_by(|a, b| {
            parse_identifier(&a.identifier)
                .cmp(&parse_identifier(&b.identifier))
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(files)
    }

    /// Builds a ledger from the files on disk and the applied identifiers.
    ///
    /// Applied identifiers without a file still count as known, so new
    /// identifiers never reuse them.
    ///
    /// # Errors
    ///
    /// IO errors while scanning.
    pub fn ledger(&self, applied: &BTreeSet<String>) -> Result<MemoryLedger> {
        let mut known: Vec<String> = self.scan()?.into_iter().map(|f| f.identifier).collect();
        for identifier in applied {
            if !known.contains(identifier) {
                known.push(identifier.clone());
            }
        }
        Ok(MemoryLedger::from_parts(known, applied.iter().cloned()))
    }

    /// Writes one file per plan step, rendered against `catalog`.
    ///
    /// # Errors
    ///
    /// `MigrationExists` if a file name is taken, `State` if the plan does
    /// not fit `catalog`, or IO errors.
    pub fn write_plan<D: MigrationDialect + ?Sized>(
        &self,
        plan: &MigrationPlan,
        dialect: &D,
        catalog: &SchemaState,
    ) -> Result<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = plan.iter().map(|s| self.path.join(&s.file_name)).collect();
        if let Some(taken) = paths.iter().find(|p| p.exists()) {
            return Err(MigrantError::MigrationExists(taken.clone()));
        }
        let contents = render_plan(plan, dialect, catalog)?;

        fs::create_dir_all(&self.path)?;
        for ((step, path), content) in plan.iter().zip(&paths).zip(contents) {
            fs::write(path, content)?;
            info!(file = %path.display(), entity = %step.entity, "Wrote migration");
        }
        Ok(paths)
    }
}
