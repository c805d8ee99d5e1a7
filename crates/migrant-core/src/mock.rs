//! Mock row generation.
//!
//! A mock row holds one plausible value per column of an entity's schema,
//! in column order. Explicit overrides win, then the declared example, then
//! a per-type default.

use chrono::{DateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::builder::{SchemaBuilder, DISCRIMINATOR_COLUMN};
use crate::declaration::{DeclarationSet, EntityDeclaration, Example, Member};
use crate::error::Result;
use crate::schema::{ColumnSpec, ColumnType};

const STRING_PLACEHOLDER: &str = "Lorem ipsum";

const TEXT_PLACEHOLDER: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis \
nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.";

/// One mock value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MockValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Fixed point value.
    Decimal(Decimal),
    /// Boolean value.
    Boolean(bool),
    /// Date and time value.
    DateTime(DateTime<Utc>),
}

impl MockValue {
    /// Default value for a column.
    #[must_use]
    pub fn for_column(column: &ColumnSpec, now: DateTime<Utc>) -> Self {
        match column.column_type {
            ColumnType::String => Self::Text(STRING_PLACEHOLDER.to_string()),
            ColumnType::Text => Self::Text(TEXT_PLACEHOLDER.to_string()),
            ColumnType::Integer | ColumnType::SmallInt => Self::Integer(5),
            ColumnType::Float | ColumnType::Double => Self::Float(5.5),
            ColumnType::Decimal => {
                let mut amount = Decimal::new(1999, 2);
                amount.rescale(u32::from(column.scale.unwrap_or(0)));
                Self::Decimal(amount)
            }
            ColumnType::Boolean => Self::Boolean(true),
            ColumnType::DateTime => Self::DateTime(now),
        }
    }
}

impl MockValue {
    /// The value of a concrete example, shaped for `column`.
    ///
    /// Returns `None` for examples without a value (flags, type tokens,
    /// semantic tags) and for values that do not fit the column type.
    #[must_use]
    pub fn from_example(example: &Example, column: &ColumnSpec) -> Option<Self> {
        let value = match (example, column.column_type) {
            (
                Example::Text(text) | Example::Verbatim(text) | Example::Email(text),
                ColumnType::String | ColumnType::Text,
            ) => Self::Text(text.clone()),
            (Example::Integer(value), ColumnType::Integer | ColumnType::SmallInt) => {
                Self::Integer(*value)
            }
            (Example::Range(low, _), ColumnType::Integer | ColumnType::SmallInt) => {
                Self::Integer(*low)
            }
            (Example::Float(value), ColumnType::Float | ColumnType::Double) => Self::Float(*value),
            (Example::Currency(amount), ColumnType::Decimal) => {
                let mut amount = *amount;
                if let Some(scale) = column.scale {
                    amount.rescale(u32::from(scale));
                }
                Self::Decimal(amount)
            }
            (Example::Boolean(value), ColumnType::Boolean) => Self::Boolean(*value),
            (Example::Date(date), ColumnType::DateTime) => {
                Self::DateTime(date.and_time(NaiveTime::MIN).and_utc())
            }
            (Example::DateTime(stamp), ColumnType::DateTime) => Self::DateTime(stamp.and_utc()),
            _ => return None,
        };
        Some(value)
    }
}

impl From<&str> for MockValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MockValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MockValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MockValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MockValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for MockValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for MockValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for MockValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// A mock row keyed by column name, in column order.
pub type MockRow = IndexMap<String, MockValue>;

/// Produces mock rows for declared entities.
#[derive(Debug, Clone, Copy)]
pub struct MockGenerator<'a> {
    declarations: &'a DeclarationSet,
    now: DateTime<Utc>,
}

impl<'a> MockGenerator<'a> {
    /// Creates a generator stamping `datetime` columns with the current time.
    #[must_use]
    pub fn new(declarations: &'a DeclarationSet) -> Self {
        Self::at(declarations, Utc::now())
    }

    /// Creates a generator stamping `datetime` columns with `now`.
    #[must_use]
    pub const fn at(declarations: &'a DeclarationSet, now: DateTime<Utc>) -> Self {
        Self { declarations, now }
    }

    /// Builds one mock row for `entity`.
    ///
    /// Each column takes the entity's own override, else the nearest
    /// ancestor's override, else the declared example, else the type
    /// default. The inheritance discriminator holds the entity name.
    ///
    /// # Errors
    ///
    /// Any error building the entity's schema.
    pub fn mock_row(&self, entity: &str) -> Result<MockRow> {
        let schema = SchemaBuilder::new(self.declarations).build(entity)?;
        let lineage = self.declarations.lineage(entity)?;
        let inherits = lineage.len() > 1
            || !self.declarations.children(entity).is_empty();

        let mut row = MockRow::new();
        for column in &schema.columns {
            let overridden = lineage
                .iter()
                .rev()
                .find_map(|declaration| declaration.mock_overrides.get(&column.name));
            let value = match overridden {
                Some(value) => value.clone(),
                None if inherits && column.name == DISCRIMINATOR_COLUMN => {
                    MockValue::Text(entity.to_string())
                }
                None => declared_example(&lineage, &column.name)
                    .and_then(|example| MockValue::from_example(example, column))
                    .unwrap_or_else(|| MockValue::for_column(column, self.now)),
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

fn declared_example<'d>(lineage: &[&'d EntityDeclaration], column: &str) -> Option<&'d Example> {
    lineage.iter().rev().find_map(|declaration| {
        declaration.members.iter().find_map(|member| match member {
            Member::Field(field) if field.name == column => Some(&field.example),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::declaration::SemanticType;

    fn declarations() -> DeclarationSet {
        DeclarationSet::new()
            .with(
                EntityDeclaration::new("User")
                    .field("name", "Kelvin")
                    .field("bio", "line one\nline two")
                    .field("age", 30)
                    .field("score", 0.5)
                    .field("active", false)
                    .field("email", Example::Email("somebody@somewhere.com".into()))
                    .field("joined_at", ColumnType::DateTime),
            )
            .with(
                EntityDeclaration::new("Customer")
                    .inherits("User")
                    .field("average_rating", Decimal::new(500, 2))
                    .field("money_spent", SemanticType::Currency),
            )
    }

    #[test]
    fn test_examples_become_values() {
        let set = declarations();
        let now = Utc::now();
        let row = MockGenerator::at(&set, now).mock_row("User").unwrap();

        assert_eq!(row["name"], MockValue::Text("Kelvin".into()));
        assert_eq!(row["bio"], MockValue::Text("line one\nline two".into()));
        assert_eq!(row["age"], MockValue::Integer(30));
        assert_eq!(row["score"], MockValue::Float(0.5));
        assert_eq!(row["active"], MockValue::Boolean(false));
        assert_eq!(row["email"], MockValue::Text("somebody@somewhere.com".into()));
        assert_eq!(row["joined_at"], MockValue::DateTime(now));
        assert_eq!(row["type"], MockValue::Text("User".into()));
    }

    #[test]
    fn test_type_defaults() {
        let set = DeclarationSet::new().with(
            EntityDeclaration::new("Note")
                .field("title", ColumnType::String)
                .field("body", ColumnType::Text)
                .field("views", ColumnType::Integer)
                .field("ratio", ColumnType::Float)
                .field("pinned", Example::Flag),
        );
        let row = MockGenerator::new(&set).mock_row("Note").unwrap();

        assert!(matches!(&row["title"], MockValue::Text(s) if s == STRING_PLACEHOLDER));
        assert!(matches!(&row["body"], MockValue::Text(s) if s == TEXT_PLACEHOLDER));
        assert_eq!(row["views"], MockValue::Integer(5));
        assert_eq!(row["ratio"], MockValue::Float(5.5));
        assert_eq!(row["pinned"], MockValue::Boolean(true));
        assert!(!row.contains_key("type"));
    }

    #[test]
    fn test_ranges_and_dates() {
        let set = DeclarationSet::new().with(
            EntityDeclaration::new("Shop")
                .field("operating_days", 1_i64..=6)
                .field("opened_on", NaiveDate::from_ymd_opt(2001, 1, 1).unwrap()),
        );
        let row = MockGenerator::new(&set).mock_row("Shop").unwrap();

        assert_eq!(row["operating_days"], MockValue::Integer(1));
        match &row["opened_on"] {
            MockValue::DateTime(stamp) => {
                assert_eq!(stamp.date_naive(), NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
            }
            other => panic!("Expected DateTime, got {other:?}"),
        }
    }

    #[test]
    fn test_rows_keep_column_order() {
        let set = declarations();
        let row = MockGenerator::new(&set).mock_row("Customer").unwrap();
        let columns: Vec<_> = row.keys().map(String::as_str).collect();
        assert_eq!(
            columns,
            vec![
                "name",
                "bio",
                "age",
                "score",
                "active",
                "email",
                "joined_at",
                "type",
                "average_rating",
                "money_spent"
            ]
        );
    }

    #[test]
    fn test_decimal_honors_scale() {
        let set = declarations();
        let row = MockGenerator::new(&set).mock_row("Customer").unwrap();
        assert_eq!(row["average_rating"], MockValue::Decimal(Decimal::new(500, 2)));
        match &row["money_spent"] {
            MockValue::Decimal(amount) => {
                assert_eq!(amount.scale(), 2);
                assert_eq!(amount.to_string(), "19.99");
            }
            other => panic!("Expected Decimal, got {other:?}"),
        }

        let mut column = ColumnSpec::new("price", ColumnType::Decimal).scale(4);
        match MockValue::for_column(&column, Utc::now()) {
            MockValue::Decimal(amount) => assert_eq!(amount.to_string(), "19.9900"),
            other => panic!("Expected Decimal, got {other:?}"),
        }
        match MockValue::from_example(&Example::Currency(Decimal::new(5, 0)), &column) {
            Some(MockValue::Decimal(amount)) => assert_eq!(amount.to_string(), "5.0000"),
            other => panic!("Expected Decimal, got {other:?}"),
        }
        column.scale = None;
        match MockValue::for_column(&column, Utc::now()) {
            MockValue::Decimal(amount) => assert_eq!(amount.scale(), 0),
            other => panic!("Expected Decimal, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_example_falls_back_to_default() {
        let column = ColumnSpec::new("count", ColumnType::Integer);
        assert_eq!(MockValue::from_example(&Example::Text("many".into()), &column), None);
        assert_eq!(MockValue::from_example(&Example::Flag, &column), None);
    }

    #[test]
    fn test_overrides_beat_examples() {
        let set = declarations()
            .with(
                EntityDeclaration::new("User")
                    .field("name", "Kelvin")
                    .field("email", Example::Email("somebody@somewhere.com".into()))
                    .mock("name", "Ada"),
            )
            .with(
                EntityDeclaration::new("Vendor")
                    .inherits("User")
                    .field("rank", 1)
                    .mock("email", "vendor@somewhere.com")
                    .mock("rank", 9),
            );
        let row = MockGenerator::new(&set).mock_row("Vendor").unwrap();
        assert_eq!(row["name"], MockValue::Text("Ada".into()));
        assert_eq!(row["email"], MockValue::Text("vendor@somewhere.com".into()));
        assert_eq!(row["rank"], MockValue::Integer(9));
        assert_eq!(row["type"], MockValue::Text("Vendor".into()));
    }
}
