//! The generation pipeline.
//!
//! One run: check the ledger for pending migrations, build every desired
//! table, diff each against the live schema, fail closed on lossy changes
//! and synthesize the plan. Any failure ends the run without a plan.

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::builder::{SchemaBuilder, TableModel};
use crate::config::GeneratorConfig;
use crate::declaration::DeclarationSet;
use crate::differ::{DifferOptions, SchemaDiffer};
use crate::error::{GenerationError, Result};
use crate::guard::MigrationGuard;
use crate::mock::{MockGenerator, MockRow};
use crate::reflect::{MigrationLedger, SchemaReflector};
use crate::synthesizer::{MigrationPlan, MigrationSynthesizer, PlannedTable};

/// Plans migrations for one set of declarations.
#[derive(Debug)]
pub struct MigrationGenerator<'a> {
    declarations: &'a DeclarationSet,
    config: GeneratorConfig,
}

impl<'a> MigrationGenerator<'a> {
    /// Creates a generator.
    #[must_use]
    pub const fn new(declarations: &'a DeclarationSet, config: GeneratorConfig) -> Self {
        Self {
            declarations,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Builds the desired table models, one per table-owning entity.
    ///
    /// # Errors
    ///
    /// The first inference, association, inheritance or conflict error.
    pub fn desired_tables(&self) -> Result<Vec<TableModel>> {
        for entity in self.declarations.entities() {
            self.declarations.lineage(&entity.name)?;
        }
        let builder = SchemaBuilder::new(self.declarations);
        self.declarations
            .roots()
            .map(|root| builder.build_table(&root.name))
            .collect()
    }

    /// Plans migrations, stamping timestamp identifiers with the current time.
    ///
    /// # Errors
    ///
    /// See [`MigrationGenerator::generate_plan_at`].
    pub fn generate_plan<R, L>(&self, reflector: &R, ledger: &L) -> Result<MigrationPlan>
    where
        R: SchemaReflector + ?Sized,
        L: MigrationLedger + ?Sized,
    {
        self.generate_plan_at(reflector, ledger, Utc::now().naive_utc())
    }

    /// Plans migrations as of `now`.
    ///
    /// # Errors
    ///
    /// `PendingMigrationsExist`, un-forced `LossyAlter`, `DependencyCycle`,
    /// `UnresolvedType`, `UnknownAssociationTarget`, `UnknownParentEntity`,
    /// `ConflictingColumnDefinition`, and wrapped collaborator failures.
    pub fn generate_plan_at<R, L>(
        &self,
        reflector: &R,
        ledger: &L,
        now: NaiveDateTime,
    ) -> Result<MigrationPlan>
    where
        R: SchemaReflector + ?Sized,
        L: MigrationLedger + ?Sized,
    {
        MigrationGuard::check(ledger)?;

        let tables = self.desired_tables()?;
        let differ = SchemaDiffer::with_options(DifferOptions {
            force: self.config.force,
        });

        let mut planned = Vec::with_capacity(tables.len());
        for table in tables {
            let live = reflector
                .live_table(&table.schema.table)
                .map_err(GenerationError::reflection)?;
            let diff = differ.diff(&table.schema, live.as_ref());
            planned.push(PlannedTable {
                diff,
                references: table.references,
            });
        }

        let diffs: Vec<_> = planned.iter().map(|p| p.diff.clone()).collect();
        differ.check(&diffs)?;

        let known = ledger
            .known_migrations()
            .map_err(GenerationError::ledger)?;
        debug!(known = known.len(), tables = planned.len(), "Synthesizing plan");

        let plan = MigrationSynthesizer::new(&self.config).synthesize(&planned, &known, now)?;
        info!(
            steps = plan.len(),
            forced = self.config.force,
            convention = ?self.config.convention,
            "Generated migration plan"
        );
        Ok(plan)
    }

    /// Builds one mock row for an entity.
    ///
    /// # Errors
    ///
    /// Any error building the entity's schema.
    pub fn mock_row(&self, entity: &str) -> Result<MockRow> {
        MockGenerator::new(self.declarations).mock_row(entity)
    }
}

/// Plans migrations for `declarations` against a live schema and ledger.
///
/// # Errors
///
/// See [`MigrationGenerator::generate_plan_at`].
pub fn generate_plan<R, L>(
    declarations: &DeclarationSet,
    reflector: &R,
    ledger: &L,
    config: &GeneratorConfig,
) -> Result<MigrationPlan>
where
    R: SchemaReflector + ?Sized,
    L: MigrationLedger + ?Sized,
{
    MigrationGenerator::new(declarations, config.clone()).generate_plan(reflector, ledger)
}

/// Builds one mock row for `entity`.
///
/// # Errors
///
/// Any error building the entity's schema.
pub fn mock_row(declarations: &DeclarationSet, entity: &str) -> Result<MockRow> {
    MockGenerator::new(declarations).mock_row(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{EntityDeclaration, Example};
    use crate::state::{MemoryLedger, SchemaState};

    #[test]
    fn test_guard_runs_before_build() {
        let set = DeclarationSet::new().with(
            EntityDeclaration::new("Business").field("tags", Example::Opaque("an array".into())),
        );
        let ledger = MemoryLedger::new().with_pending("001");
        let err = generate_plan(&set, &SchemaState::new(), &ledger, &GeneratorConfig::default())
            .unwrap_err();
        assert!(matches!(err, GenerationError::PendingMigrationsExist(_)));
    }

    #[test]
    fn test_orphaned_parent_cycle_is_reported() {
        let set = DeclarationSet::new()
            .with(EntityDeclaration::new("A").inherits("B"))
            .with(EntityDeclaration::new("B").inherits("A"));
        let err = MigrationGenerator::new(&set, GeneratorConfig::default())
            .desired_tables()
            .unwrap_err();
        assert!(matches!(err, GenerationError::DependencyCycle(_)));
    }

    #[test]
    fn test_empty_declarations_plan_nothing() {
        let plan = generate_plan(
            &DeclarationSet::new(),
            &SchemaState::new(),
            &MemoryLedger::new(),
            &GeneratorConfig::default(),
        )
        .unwrap();
        assert!(plan.is_empty());
    }
}
