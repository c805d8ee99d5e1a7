//! JSON structure files.
//!
//! A structure file lists entities and their members by example, plus an
//! optional generator configuration:
//!
//! ```json
//! {
//!   "config": { "convention": "sequential" },
//!   "entities": [
//!     {
//!       "name": "Business",
//!       "members": [
//!         { "name": "name", "example": "Kitchen" },
//!         { "name": "operating_days", "range": [0, 6] },
//!         { "name": "location", "type": "string", "limit": 127 },
//!         { "belongs_to": "user" },
//!         { "belongs_to": "owner", "polymorphic": true },
//!         { "timestamps": true }
//!       ],
//!       "mock": { "name": "Kitchen" }
//!     }
//!   ]
//! }
//! ```
//!
//! Values that have no column type (arrays, objects, unknown type tokens)
//! are kept as opaque examples and fail at inference.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use migrant_core::config::GeneratorConfig;
use migrant_core::declaration::{
    AssociationSpec, DeclarationSet, EntityDeclaration, Example, FieldOptions, SemanticType,
};
use migrant_core::mock::MockValue;
use migrant_core::schema::ColumnType;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{MigrantError, Result};

/// A parsed structure file.
#[derive(Debug, Clone)]
pub struct Structure {
    /// Declared entities.
    pub declarations: DeclarationSet,
    /// Configuration from the file, if any.
    pub config: Option<GeneratorConfig>,
}

impl Structure {
    /// Reads and parses a structure file.
    ///
    /// # Errors
    ///
    /// IO errors, JSON errors, or `Structure` for malformed values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for Structure {
    type Err = MigrantError;

    fn from_str(content: &str) -> Result<Self> {
        let file: StructureFile = serde_json::from_str(content)?;
        let mut declarations = DeclarationSet::new();
        for entity in file.entities {
            declarations.push(entity.into_declaration()?);
        }
        Ok(Self {
            declarations,
            config: file.config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StructureFile {
    #[serde(default)]
    config: Option<GeneratorConfig>,
    #[serde(default)]
    entities: Vec<EntityFile>,
}

#[derive(Debug, Deserialize)]
struct EntityFile {
    name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    inherits: Option<String>,
    #[serde(default)]
    members: Vec<MemberFile>,
    #[serde(default)]
    mock: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MemberFile {
    Association(AssociationFile),
    Timestamps(TimestampsFile),
    Field(Box<FieldFile>),
}

#[derive(Debug, Deserialize)]
struct AssociationFile {
    belongs_to: String,
    #[serde(default)]
    polymorphic: bool,
    #[serde(default)]
    class_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimestampsFile {
    timestamps: bool,
}

#[derive(Debug, Deserialize)]
struct FieldFile {
    name: String,
    #[serde(default)]
    example: Option<Value>,
    #[serde(default, rename = "type")]
    column_type: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    precision: Option<u8>,
    #[serde(default)]
    scale: Option<u8>,
    #[serde(default)]
    index: bool,
    #[serde(default)]
    range: Option<(i64, i64)>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    datetime: Option<NaiveDateTime>,
    #[serde(default)]
    currency: Option<Value>,
    #[serde(default)]
    email: Option<Value>,
    #[serde(default)]
    verbatim: Option<String>,
}

impl EntityFile {
    fn into_declaration(self) -> Result<EntityDeclaration> {
        let mut entity = EntityDeclaration::new(&self.name);
        if let Some(table) = self.table {
            entity = entity.table(table);
        }
        if let Some(parent) = self.inherits {
            entity = entity.inherits(parent);
        }
        for member in self.members {
            entity = match member {
                MemberFile::Association(association) => {
                    let mut spec = if association.polymorphic {
                        AssociationSpec::polymorphic(association.belongs_to)
                    } else {
                        AssociationSpec::belongs_to(association.belongs_to)
                    };
                    if let Some(class_name) = association.class_name {
                        spec = spec.class_name(class_name);
                    }
                    entity.association(spec)
                }
                MemberFile::Timestamps(TimestampsFile { timestamps: true }) => entity.timestamps(),
                MemberFile::Timestamps(_) => entity,
                MemberFile::Field(field) => {
                    let (name, example, options) = field.into_parts(&self.name)?;
                    entity.field_with(name, example, options)
                }
            };
        }
        for (column, value) in self.mock {
            let value = mock_value(&self.name, &column, value)?;
            entity = entity.mock(column, value);
        }
        Ok(entity)
    }
}

impl FieldFile {
    fn into_parts(self, entity: &str) -> Result<(String, Example, FieldOptions)> {
        let invalid = |what: &str| {
            MigrantError::Structure(format!("'{entity}.{}': invalid {what}", self.name))
        };

        let mut options = FieldOptions::new();
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        if let Some(precision) = self.precision {
            options = options.precision(precision);
        }
        if let Some(scale) = self.scale {
            options = options.scale(scale);
        }
        if self.index {
            options = options.indexed();
        }

        let example = if let Some((low, high)) = self.range {
            Some(Example::Range(low, high))
        } else if let Some(date) = self.date {
            Some(Example::Date(date))
        } else if let Some(datetime) = self.datetime {
            Some(Example::DateTime(datetime))
        } else if let Some(currency) = &self.currency {
            Some(match currency {
                Value::Bool(true) => Example::Semantic(SemanticType::Currency),
                Value::String(amount) => {
                    Example::Currency(Decimal::from_str(amount).map_err(|_| invalid("currency"))?)
                }
                Value::Number(amount) => Example::Currency(
                    Decimal::from_str(&amount.to_string()).map_err(|_| invalid("currency"))?,
                ),
                _ => return Err(invalid("currency")),
            })
        } else if let Some(email) = &self.email {
            Some(match email {
                Value::Bool(true) => Example::Semantic(SemanticType::Email),
                Value::String(address) => Example::Email(address.clone()),
                _ => return Err(invalid("email")),
            })
        } else if let Some(verbatim) = &self.verbatim {
            Some(Example::Verbatim(verbatim.clone()))
        } else {
            self.example.as_ref().map(example_from_json)
        };

        let example = match (self.column_type.as_deref(), example) {
            (Some(token), example) => match ColumnType::parse(token) {
                Some(column_type) => match example {
                    Some(example) => {
                        options = options.of_type(column_type);
                        example
                    }
                    None => Example::Type(column_type),
                },
                None => Example::Opaque(format!("unknown type token '{token}'")),
            },
            (None, Some(example)) => example,
            (None, None) => Example::Flag,
        };

        Ok((self.name, example, options))
    }
}

fn example_from_json(value: &Value) -> Example {
    match value {
        Value::Null => Example::Flag,
        Value::Bool(flag) => Example::Boolean(*flag),
        Value::Number(number) => number.as_i64().map_or_else(
            || number.as_f64().map_or_else(|| Example::Opaque(number.to_string()), Example::Float),
            Example::Integer,
        ),
        Value::String(text) => Example::Text(text.clone()),
        Value::Array(_) => Example::Opaque("an array".to_string()),
        Value::Object(_) => Example::Opaque("an object".to_string()),
    }
}

/// Converts a JSON mock override. Objects tag values JSON cannot carry:
/// `{"decimal": "5.00"}` and `{"datetime": "2024-03-15T09:30:05Z"}`.
fn mock_value(entity: &str, column: &str, value: Value) -> Result<MockValue> {
    let invalid = || MigrantError::Structure(format!("'{entity}.{column}': invalid mock value"));
    match value {
        Value::Bool(flag) => Ok(MockValue::Boolean(flag)),
        Value::String(text) => Ok(MockValue::Text(text)),
        Value::Number(number) => number
            .as_i64()
            .map(MockValue::Integer)
            .or_else(|| number.as_f64().map(MockValue::Float))
            .ok_or_else(invalid),
        Value::Object(map) => {
            if let Some(Value::String(amount)) = map.get("decimal") {
                Decimal::from_str(amount)
                    .map(MockValue::Decimal)
                    .map_err(|_| invalid())
            } else if let Some(Value::String(stamp)) = map.get("datetime") {
                stamp
                    .parse::<DateTime<Utc>>()
                    .map(MockValue::DateTime)
                    .map_err(|_| invalid())
            } else {
                Err(invalid())
            }
        }
        Value::Null | Value::Array(_) => Err(invalid()),
    }
}
