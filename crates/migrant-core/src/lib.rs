//! Structure-by-example migrations.
//!
//! `migrant-core` infers a relational schema from example values declared
//! on each entity, compares it with the live database, and plans the
//! migrations that close the gap:
//! - Column types come from representative values (`"Acme"` is a string,
//!   `4.5` a double, `0..=6` a one-byte integer)
//! - Belongs-to associations expand to reference columns and indexes
//! - Changes that may lose data fail the run unless forced
//! - Every step is reversible and ordered so referenced tables come first
//!
//! The crate is synchronous and driver-agnostic. Databases plug in through
//! the [`reflect::SchemaReflector`] and [`reflect::MigrationLedger`] traits.
//!
//! # Architecture
//!
//! - **Declaration** - Ordered, example-carrying entity descriptions
//! - **Inference** / **Association** / **Builder** - Desired table schemas
//! - **Differ** - Safe and lossy change classification
//! - **Synthesizer** - Ordered, named, reversible migration steps
//! - **Guard** - Refuses to plan over pending migrations
//! - **Mock** - One plausible value per column
//!
//! # Example
//!
//! ```
//! use migrant_core::prelude::*;
//!
//! let declarations = DeclarationSet::new().with(
//!     EntityDeclaration::new("Business")
//!         .field("name", "Acme")
//!         .field("rating", 4.5)
//!         .field("verified", true),
//! );
//!
//! let plan = generate_plan(
//!     &declarations,
//!     &SchemaState::new(),
//!     &MemoryLedger::new(),
//!     &GeneratorConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan.steps[0].name, "create_businesses");
//! ```

pub mod association;
pub mod builder;
pub mod config;
pub mod declaration;
pub mod differ;
pub mod error;
pub mod generator;
pub mod guard;
pub mod inference;
pub mod mock;
pub mod operations;
pub mod reflect;
pub mod schema;
pub mod state;
pub mod synthesizer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{SchemaBuilder, TableModel, DISCRIMINATOR_COLUMN};
    pub use crate::config::{GeneratorConfig, IdentifierConvention};
    pub use crate::declaration::{
        AssociationSpec, DeclarationSet, EntityDeclaration, Example, FieldOptions, SemanticType,
    };
    pub use crate::differ::{ColumnDiff, DifferOptions, IndexDiff, SchemaDiff, SchemaDiffer};
    pub use crate::error::{GenerationError, LossyChange, Result};
    pub use crate::generator::{generate_plan, mock_row, MigrationGenerator};
    pub use crate::guard::MigrationGuard;
    pub use crate::mock::{MockGenerator, MockRow, MockValue};
    pub use crate::operations::{MigrationBody, MigrationOp};
    pub use crate::reflect::{LiveTable, MigrationLedger, SchemaReflector};
    pub use crate::schema::{ColumnSpec, ColumnType, ExistingColumn, IndexSpec, ModelSchema};
    pub use crate::state::{MemoryLedger, SchemaState, TableState};
    pub use crate::synthesizer::{MigrationId, MigrationPlan, MigrationStep};
}
