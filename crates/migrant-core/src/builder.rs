//! Desired schema construction.
//!
//! [`SchemaBuilder`] folds an entity's fields and associations into a
//! [`ModelSchema`], keeping declaration order. Single-table inheritance is
//! resolved here: a child sees its ancestors' columns followed by its own,
//! and the table as a whole holds the root's columns, a `type`
//! discriminator, and every descendant's own columns.

use std::collections::BTreeSet;

use tracing::debug;

use crate::association;
use crate::declaration::{DeclarationSet, EntityDeclaration, Member};
use crate::error::{GenerationError, Result};
use crate::inference::infer_column;
use crate::schema::{ColumnSpec, ColumnType, IndexSpec, ModelSchema};

/// Column distinguishing the entities stored in one inheritance table.
pub const DISCRIMINATOR_COLUMN: &str = "type";

/// Desired shape of one table, with the entities it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableModel {
    /// Table-level schema; `schema.entity` is the owning root entity.
    pub schema: ModelSchema,
    /// Root entities of every table referenced by a plain association.
    pub references: BTreeSet<String>,
}

/// Builds desired schemas from declarations.
#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder<'a> {
    declarations: &'a DeclarationSet,
}

impl<'a> SchemaBuilder<'a> {
    /// Creates a builder over one run's declarations.
    #[must_use]
    pub const fn new(declarations: &'a DeclarationSet) -> Self {
        Self { declarations }
    }

    /// Builds the schema one entity sees.
    ///
    /// An inheriting entity that declares nothing of its own gets its
    /// parent's schema unchanged.
    ///
    /// # Errors
    ///
    /// Inference and association failures, `ConflictingColumnDefinition`
    /// when a name repeats along the inheritance chain, and lineage errors.
    pub fn build(&self, entity: &str) -> Result<ModelSchema> {
        self.assemble(entity).map(|(schema, _)| schema)
    }

    /// Builds the table-level schema owned by a root entity.
    ///
    /// Descendants' own columns are appended after the root's. Siblings may
    /// declare the same column only with an identical definition.
    ///
    /// # Errors
    ///
    /// Same as [`SchemaBuilder::build`], for the root and every descendant.
    pub fn build_table(&self, root: &str) -> Result<TableModel> {
        let root = self.declarations.root_of(root)?;
        let (mut schema, mut references) = self.assemble(&root.name)?;

        for descendant in self.declarations.descendants(&root.name) {
            let (child, child_references) = self.assemble(&descendant.name)?;
            for column in child.columns {
                match schema.column(&column.name) {
                    Some(existing) if *existing == column => {}
                    Some(_) => {
                        return Err(GenerationError::ConflictingColumnDefinition {
                            entity: descendant.name.clone(),
                            column: column.name,
                        })
                    }
                    None => schema.columns.push(column),
                }
            }
            for index in child.indexes {
                schema.push_index(index);
            }
            references.extend(child_references);
        }

        references.remove(&root.name);
        debug!(
            entity = %root.name,
            table = %schema.table,
            columns = schema.columns.len(),
            indexes = schema.indexes.len(),
            "Built table schema"
        );
        Ok(TableModel { schema, references })
    }

    fn assemble(&self, entity: &str) -> Result<(ModelSchema, BTreeSet<String>)> {
        let lineage = self.declarations.lineage(entity)?;
        let (Some(root), Some(leaf)) = (lineage.first(), lineage.last()) else {
            return Err(GenerationError::UnknownEntity(entity.to_string()));
        };

        if let Some(parent) = leaf.parent.as_deref() {
            if !leaf.declares_members() {
                return self.assemble(parent);
            }
        }

        let mut schema = ModelSchema::new(entity, root.table_name());
        let mut references = BTreeSet::new();

        for (depth, declaration) in lineage.iter().enumerate() {
            self.fold_members(declaration, entity, &mut schema, &mut references)?;
            if depth == 0
                && !self.declarations.children(&root.name).is_empty()
                && !schema.has_column(DISCRIMINATOR_COLUMN)
            {
                schema
                    .columns
                    .push(ColumnSpec::new(DISCRIMINATOR_COLUMN, ColumnType::String));
            }
        }
        Ok((schema, references))
    }

    fn fold_members(
        &self,
        declaration: &EntityDeclaration,
        entity: &str,
        schema: &mut ModelSchema,
        references: &mut BTreeSet<String>,
    ) -> Result<()> {
        for member in &declaration.members {
            match member {
                Member::Field(field) => {
                    let column = infer_column(&declaration.name, field)?;
                    if field.options.index {
                        schema.push_index(IndexSpec::single(column.name.clone()));
                    }
                    push_column(schema, entity, column)?;
                }
                Member::Association(spec) => {
                    let resolved =
                        association::resolve(&declaration.name, spec, self.declarations)?;
                    for column in resolved.columns {
                        push_column(schema, entity, column)?;
                    }
                    schema.push_index(resolved.index);
                    if let Some(target) = resolved.references {
                        references.insert(self.declarations.root_of(&target)?.name.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

fn push_column(schema: &mut ModelSchema, entity: &str, column: ColumnSpec) -> Result<()> {
    if schema.has_column(&column.name) {
        return Err(GenerationError::ConflictingColumnDefinition {
            entity: entity.to_string(),
            column: column.name,
        });
    }
    schema.columns.push(column);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::declaration::{Example, FieldOptions};

    fn column_names(schema: &ModelSchema) -> Vec<&str> {
        schema.column_names().collect()
    }

    #[test]
    fn test_business_scenario() {
        let set = DeclarationSet::new().with(
            EntityDeclaration::new("Business")
                .field("name", "Acme")
                .field("rating", 4.5)
                .field("verified", true),
        );
        let schema = SchemaBuilder::new(&set).build("Business").unwrap();
        assert_eq!(schema.table, "businesses");
        assert_eq!(
            schema.columns,
            vec![
                ColumnSpec::new("name", ColumnType::String),
                ColumnSpec::new("rating", ColumnType::Double),
                ColumnSpec::new("verified", ColumnType::Boolean),
            ]
        );
        assert!(schema.indexes.is_empty());
    }

    #[test]
    fn test_associations_interleave_in_order() {
        let set = DeclarationSet::new()
            .with(EntityDeclaration::new("User").field("name", "Kelvin"))
            .with(
                EntityDeclaration::new("Business")
                    .field("name", "Kitchen")
                    .belongs_to("user")
                    .belongs_to_polymorphic("owner")
                    .field_with(
                        "title",
                        ColumnType::String,
                        FieldOptions::new().indexed(),
                    ),
            );
        let table = SchemaBuilder::new(&set).build_table("Business").unwrap();
        assert_eq!(
            column_names(&table.schema),
            vec!["name", "user_id", "owner_type", "owner_id", "title"]
        );
        assert_eq!(
            table.schema.indexes,
            vec![
                IndexSpec::single("user_id"),
                IndexSpec::new(["owner_type", "owner_id"]),
                IndexSpec::single("title"),
            ]
        );
        assert_eq!(
            table.references.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["User"]
        );
    }

    #[test]
    fn test_duplicate_field_conflicts() {
        let set = DeclarationSet::new().with(
            EntityDeclaration::new("Business")
                .field("name", "Acme")
                .field("name", 3),
        );
        assert!(matches!(
            SchemaBuilder::new(&set).build("Business"),
            Err(GenerationError::ConflictingColumnDefinition { column, .. }) if column == "name"
        ));
    }

    fn sti_declarations() -> DeclarationSet {
        DeclarationSet::new()
            .with(
                EntityDeclaration::new("User")
                    .field("name", "Kelvin")
                    .field("email", Example::Email("somebody@somewhere.com".into())),
            )
            .with(
                EntityDeclaration::new("Customer")
                    .inherits("User")
                    .field("average_rating", Decimal::new(500, 2)),
            )
            .with(EntityDeclaration::new("Admin").inherits("User"))
    }

    #[test]
    fn test_sti_child_sees_parent_columns() {
        let set = sti_declarations();
        let builder = SchemaBuilder::new(&set);

        let customer = builder.build("Customer").unwrap();
        assert_eq!(customer.table, "users");
        assert_eq!(customer.entity, "Customer");
        assert_eq!(
            column_names(&customer),
            vec!["name", "email", "type", "average_rating"]
        );

        let admin = builder.build("Admin").unwrap();
        assert_eq!(admin, builder.build("User").unwrap());
    }

    #[test]
    fn test_sti_table_merges_descendants() {
        let set = sti_declarations();
        let table = SchemaBuilder::new(&set).build_table("User").unwrap();
        assert_eq!(table.schema.entity, "User");
        assert_eq!(
            column_names(&table.schema),
            vec!["name", "email", "type", "average_rating"]
        );
    }

    #[test]
    fn test_sti_child_redefining_parent_column_conflicts() {
        let set = sti_declarations().with(
            EntityDeclaration::new("Guest")
                .inherits("User")
                .field("name", 5),
        );
        assert!(matches!(
            SchemaBuilder::new(&set).build("Guest"),
            Err(GenerationError::ConflictingColumnDefinition { entity, column })
                if entity == "Guest" && column == "name"
        ));
    }

    #[test]
    fn test_sti_siblings_share_identical_columns() {
        let set = sti_declarations()
            .with(
                EntityDeclaration::new("Vendor")
                    .inherits("User")
                    .field("average_rating", Decimal::new(100, 2)),
            )
            .with(
                EntityDeclaration::new("Partner")
                    .inherits("User")
                    .field("average_rating", "high"),
            );
        let builder = SchemaBuilder::new(&set);
        assert!(matches!(
            builder.build_table("User"),
            Err(GenerationError::ConflictingColumnDefinition { column, .. })
                if column == "average_rating"
        ));

        let set = sti_declarations().with(
            EntityDeclaration::new("Vendor")
                .inherits("User")
                .field("average_rating", Decimal::new(100, 2)),
        );
        let table = SchemaBuilder::new(&set).build_table("User").unwrap();
        assert_eq!(
            table
                .schema
                .columns
                .iter()
                .filter(|c| c.name == "average_rating")
                .count(),
            1
        );
    }

    #[test]
    fn test_references_map_to_table_owner() {
        let set = sti_declarations().with(
            EntityDeclaration::new("Review")
                .field("stars", 5)
                .belongs_to("customer"),
        );
        let table = SchemaBuilder::new(&set).build_table("Review").unwrap();
        assert!(table.references.contains("User"));
        assert!(!table.references.contains("Customer"));
    }
}
