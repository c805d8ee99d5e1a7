//! Structure declarations.
//!
//! An entity describes its storage by example: an ordered list of fields,
//! each carrying a representative value or an explicit type, interleaved with
//! belongs-to associations. Declaration order is preserved verbatim and becomes
//! column order.
//!
//! ```
//! use migrant_core::declaration::EntityDeclaration;
//!
//! let business = EntityDeclaration::new("Business")
//!     .field("name", "Acme")
//!     .field("rating", 4.5)
//!     .field("verified", true)
//!     .belongs_to("user")
//!     .timestamps();
//! assert_eq!(business.table_name(), "businesses");
//! assert_eq!(business.members.len(), 6);
//! ```

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use convert_case::{Case, Casing};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::{GenerationError, Result};
use crate::mock::MockValue;
use crate::schema::ColumnType;

/// A semantic type tag given without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// Monetary amount with two fractional digits.
    Currency,
    /// E-mail address.
    Email,
}

/// The example attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Example {
    /// No example at all: the field is a presence flag.
    Flag,
    /// A text value.
    Text(String),
    /// A text value whose length is the intended storage limit.
    Verbatim(String),
    /// An integer value.
    Integer(i64),
    /// An inclusive integer range.
    Range(i64, i64),
    /// A floating point value.
    Float(f64),
    /// A boolean value.
    Boolean(bool),
    /// A calendar date.
    Date(NaiveDate),
    /// A date and time.
    DateTime(NaiveDateTime),
    /// A monetary amount.
    Currency(Decimal),
    /// An e-mail address.
    Email(String),
    /// A semantic type tag without a value.
    Semantic(SemanticType),
    /// An explicit type token.
    Type(ColumnType),
    /// A value the declaration source could not classify, with a description
    /// of its shape.
    Opaque(String),
}

impl From<&str> for Example {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Example {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Example {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Example {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Example {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Example {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<RangeInclusive<i64>> for Example {
    fn from(value: RangeInclusive<i64>) -> Self {
        Self::Range(*value.start(), *value.end())
    }
}

impl From<NaiveDate> for Example {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for Example {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Example {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.naive_utc())
    }
}

impl From<Decimal> for Example {
    fn from(value: Decimal) -> Self {
        Self::Currency(value)
    }
}

impl From<ColumnType> for Example {
    fn from(value: ColumnType) -> Self {
        Self::Type(value)
    }
}

impl From<SemanticType> for Example {
    fn from(value: SemanticType) -> Self {
        Self::Semantic(value)
    }
}

/// Explicit options attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Type override; wins over whatever the example suggests.
    pub column_type: Option<ColumnType>,
    /// Verbatim storage limit.
    pub limit: Option<u32>,
    /// Decimal precision.
    pub precision: Option<u8>,
    /// Decimal scale.
    pub scale: Option<u8>,
    /// Whether the column gets its own index.
    pub index: bool,
}

impl FieldOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the column type.
    #[must_use]
    pub const fn of_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Records a verbatim limit.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the decimal precision.
    #[must_use]
    pub const fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Sets the decimal scale.
    #[must_use]
    pub const fn scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Requests an index on the column.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.index = true;
        self
    }
}

/// One example-carrying field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    /// Column name.
    pub name: String,
    /// Representative value or type.
    pub example: Example,
    /// Explicit options.
    pub options: FieldOptions,
}

/// A belongs-to reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSpec {
    /// Association name; the id column is `<name>_id`.
    pub name: String,
    /// Referenced entity when it differs from the association name.
    pub class_name: Option<String>,
    /// Whether the target entity is chosen at runtime by a type column.
    pub polymorphic: bool,
}

impl AssociationSpec {
    /// A plain belongs-to whose target is the entity named like `name`.
    #[must_use]
    pub fn belongs_to(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            polymorphic: false,
        }
    }

    /// A polymorphic belongs-to.
    #[must_use]
    pub fn polymorphic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            polymorphic: true,
        }
    }

    /// Points the association at an explicitly named entity.
    #[must_use]
    pub fn class_name(mut self, entity: impl Into<String>) -> Self {
        self.class_name = Some(entity.into());
        self
    }
}

/// One member of an entity declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// An example-carrying field.
    Field(FieldDeclaration),
    /// A belongs-to association.
    Association(AssociationSpec),
}

/// The structure declaration of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDeclaration {
    /// Entity name, e.g. `BusinessCategory`.
    pub name: String,
    /// Explicit table name.
    pub table: Option<String>,
    /// Entity this one inherits its table from.
    pub parent: Option<String>,
    /// Declared members in order.
    pub members: Vec<Member>,
    /// Mock values overriding the per-type defaults, keyed by column.
    pub mock_overrides: IndexMap<String, MockValue>,
}

impl EntityDeclaration {
    /// Starts an empty declaration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            parent: None,
            members: Vec::new(),
            mock_overrides: IndexMap::new(),
        }
    }

    /// Overrides the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Stores this entity in its parent's table.
    #[must_use]
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares a field by example.
    #[must_use]
    pub fn field(self, name: impl Into<String>, example: impl Into<Example>) -> Self {
        self.field_with(name, example, FieldOptions::default())
    }

    /// Declares a field by example with explicit options.
    #[must_use]
    pub fn field_with(
        mut self,
        name: impl Into<String>,
        example: impl Into<Example>,
        options: FieldOptions,
    ) -> Self {
        self.members.push(Member::Field(FieldDeclaration {
            name: name.into(),
            example: example.into(),
            options,
        }));
        self
    }

    /// Declares a field without an example.
    #[must_use]
    pub fn flag(self, name: impl Into<String>) -> Self {
        self.field(name, Example::Flag)
    }

    /// Declares `created_at` and `updated_at` at this position.
    #[must_use]
    pub fn timestamps(self) -> Self {
        self.field("created_at", ColumnType::DateTime)
            .field("updated_at", ColumnType::DateTime)
    }

    /// Declares a belongs-to association.
    #[must_use]
    pub fn belongs_to(self, name: impl Into<String>) -> Self {
        self.association(AssociationSpec::belongs_to(name))
    }

    /// Declares a polymorphic belongs-to association.
    #[must_use]
    pub fn belongs_to_polymorphic(self, name: impl Into<String>) -> Self {
        self.association(AssociationSpec::polymorphic(name))
    }

    /// Declares any association.
    #[must_use]
    pub fn association(mut self, association: AssociationSpec) -> Self {
        self.members.push(Member::Association(association));
        self
    }

    /// Overrides the mock value of one column.
    #[must_use]
    pub fn mock(mut self, column: impl Into<String>, value: impl Into<MockValue>) -> Self {
        self.mock_overrides.insert(column.into(), value.into());
        self
    }

    /// Snake-case key of the entity, as used by association names.
    #[must_use]
    pub fn key(&self) -> String {
        self.name.to_case(Case::Snake)
    }

    /// Table name: the explicit one, else the pluralized key.
    #[must_use]
    pub fn table_name(&self) -> String {
        self.table.clone().unwrap_or_else(|| pluralize(&self.key()))
    }

    /// Whether the declaration carries any member of its own.
    #[must_use]
    pub fn declares_members(&self) -> bool {
        !self.members.is_empty()
    }
}

/// Pluralizes the last word of a snake-case name.
#[must_use]
pub fn pluralize(word: &str) -> String {
    let consonant_y = word.len() > 1
        && word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// Every entity declaration of one run, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationSet {
    entities: Vec<EntityDeclaration>,
}

impl DeclarationSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration, builder style.
    #[must_use]
    pub fn with(mut self, entity: EntityDeclaration) -> Self {
        self.push(entity);
        self
    }

    /// Adds a declaration, replacing one with the same name.
    pub fn push(&mut self, entity: EntityDeclaration) {
        match self.entities.iter_mut().find(|e| e.name == entity.name) {
            Some(slot) => *slot = entity,
            None => self.entities.push(entity),
        }
    }

    /// All declarations in order.
    #[must_use]
    pub fn entities(&self) -> &[EntityDeclaration] {
        &self.entities
    }

    /// Returns `true` when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up a declaration by entity name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityDeclaration> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Looks up a declaration by entity name, failing when absent.
    pub fn require(&self, name: &str) -> Result<&EntityDeclaration> {
        self.get(name)
            .ok_or_else(|| GenerationError::UnknownEntity(name.to_string()))
    }

    /// Looks up a declaration by its snake-case key.
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<&EntityDeclaration> {
        self.entities.iter().find(|e| e.key() == key)
    }

    /// Entities that own their table.
    pub fn roots(&self) -> impl Iterator<Item = &EntityDeclaration> {
        self.entities.iter().filter(|e| e.parent.is_none())
    }

    /// Direct children of an entity, ordered by name.
    #[must_use]
    pub fn children(&self, name: &str) -> Vec<&EntityDeclaration> {
        let mut children: Vec<_> = self
            .entities
            .iter()
            .filter(|e| e.parent.as_deref() == Some(name))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// All descendants of an entity, depth first, siblings ordered by name.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&EntityDeclaration> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_descendants(name, &mut out, &mut seen);
        out
    }

    fn collect_descendants<'a>(
        &'a self,
        name: &str,
        out: &mut Vec<&'a EntityDeclaration>,
        seen: &mut HashSet<&'a str>,
    ) {
        for child in self.children(name) {
            if seen.insert(child.name.as_str()) {
                out.push(child);
                self.collect_descendants(&child.name, out, seen);
            }
        }
    }

    /// The inheritance chain of an entity, root first.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` or `UnknownParentEntity` for missing declarations,
    /// `DependencyCycle` when the parent chain loops.
    pub fn lineage(&self, name: &str) -> Result<Vec<&EntityDeclaration>> {
        let mut current = self.require(name)?;
        let mut chain = vec![current];
        let mut seen: HashSet<&str> = HashSet::from([current.name.as_str()]);
        while let Some(parent) = current.parent.as_deref() {
            if !seen.insert(parent) {
                let mut cycle: Vec<String> = chain.iter().map(|e| e.name.clone()).collect();
                cycle.sort();
                return Err(GenerationError::DependencyCycle(cycle));
            }
            current = self
                .get(parent)
                .ok_or_else(|| GenerationError::UnknownParentEntity {
                    entity: current.name.clone(),
                    parent: parent.to_string(),
                })?;
            chain.push(current);
        }
        chain.reverse();
        Ok(chain)
    }

    /// The entity that owns the table an entity is stored in.
    pub fn root_of(&self, name: &str) -> Result<&EntityDeclaration> {
        let lineage = self.lineage(name)?;
        lineage
            .first()
            .copied()
            .ok_or_else(|| GenerationError::UnknownEntity(name.to_string()))
    }
}
