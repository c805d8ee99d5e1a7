//! Belongs-to association expansion.

use crate::declaration::{AssociationSpec, DeclarationSet};
use crate::error::{GenerationError, Result};
use crate::schema::{ColumnSpec, ColumnType, IndexSpec};

/// Columns and index produced by one association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssociation {
    /// Reference columns, in storage order.
    pub columns: Vec<ColumnSpec>,
    /// Index over the reference columns.
    pub index: IndexSpec,
    /// Referenced entity, for plain associations.
    pub references: Option<String>,
}

/// Expands an association declared on `entity`.
///
/// A plain association yields `<name>_id: integer` plus an index on it and
/// must resolve to a declared entity. A polymorphic one yields
/// `<name>_type: string` and `<name>_id: integer` with one composite index;
/// its target is only known at runtime, so it never fails to resolve.
///
/// # Errors
///
/// `UnknownAssociationTarget` when a plain association names no declared
/// entity.
pub fn resolve(
    entity: &str,
    association: &AssociationSpec,
    declarations: &DeclarationSet,
) -> Result<ResolvedAssociation> {
    let id_column = format!("{}_id", association.name);

    if association.polymorphic {
        let type_column = format!("{}_type", association.name);
        return Ok(ResolvedAssociation {
            columns: vec![
                ColumnSpec::new(type_column.clone(), ColumnType::String),
                ColumnSpec::new(id_column.clone(), ColumnType::Integer),
            ],
            index: IndexSpec::new([type_column, id_column]),
            references: None,
        });
    }

    let target = match &association.class_name {
        Some(class_name) => declarations.get(class_name),
        None => declarations.find_by_key(&association.name),
    };
    let Some(target) = target else {
        return Err(GenerationError::UnknownAssociationTarget {
            entity: entity.to_string(),
            association: association.name.clone(),
            target: association
                .class_name
                .clone()
                .unwrap_or_else(|| association.name.clone()),
        });
    };

    Ok(ResolvedAssociation {
        columns: vec![ColumnSpec::new(id_column.clone(), ColumnType::Integer)],
        index: IndexSpec::single(id_column),
        references: Some(target.name.clone()),
    })
}
