//! Schema representation types.
//!
//! These types describe tables in one dialect-independent vocabulary. The
//! inference layer produces the *desired* shape ([`ColumnSpec`],
//! [`IndexSpec`], [`ModelSchema`]); reflection collaborators report the
//! *live* shape ([`ExistingColumn`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage limit of a `string` column that records none.
pub const DEFAULT_STRING_LIMIT: u32 = 255;

/// Width in bytes of an `integer` column that records no limit.
pub const DEFAULT_INTEGER_WIDTH: u32 = 4;

/// Width in bytes of a `smallint` column.
pub const SMALLINT_WIDTH: u32 = 2;

/// Precision of a `decimal` column that records none.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 10;

/// Canonical column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Short text with a storage limit.
    String,
    /// Unbounded text.
    Text,
    /// Integer; `limit` is its width in bytes.
    Integer,
    /// Two-byte integer.
    SmallInt,
    /// Single precision floating point.
    Float,
    /// Double precision floating point.
    Double,
    /// Fixed point with precision and scale.
    Decimal,
    /// Boolean.
    Boolean,
    /// Date and time.
    DateTime,
}

impl ColumnType {
    /// Every canonical type, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::String,
        Self::Text,
        Self::Integer,
        Self::SmallInt,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::DateTime,
    ];

    /// Returns the canonical token for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::SmallInt => "smallint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
        }
    }

    /// Parses a type token, accepting a few common aliases.
    ///
    /// Returns `None` for tokens outside the canonical vocabulary.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        let parsed = match token.as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "smallint" => Self::SmallInt,
            "float" => Self::Float,
            "double" => Self::Double,
            "decimal" => Self::Decimal,
            "boolean" | "bool" => Self::Boolean,
            "datetime" | "date" | "time" | "timestamp" => Self::DateTime,
            _ => return None,
        };
        Some(parsed)
    }

    /// Whether a `limit` is meaningful for this type.
    #[must_use]
    pub const fn accepts_limit(self) -> bool {
        matches!(self, Self::String | Self::Integer)
    }

    /// Whether this type is one of the integer types.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Integer | Self::SmallInt)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired definition of one column.
///
/// `limit` is only ever recorded for types that accept one, `scale` and
/// `precision` only for `decimal`. The builder methods silently drop
/// attributes that do not apply to the column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Canonical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Storage limit (characters for strings, bytes for integers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Decimal scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    /// Decimal precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
}

impl ColumnSpec {
    /// Creates a column with no extra attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            limit: None,
            scale: None,
            precision: None,
        }
    }

    /// Sets the storage limit.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        if self.column_type.accepts_limit() {
            self.limit = Some(limit);
        }
        self
    }

    /// Sets the decimal scale.
    #[must_use]
    pub fn scale(mut self, scale: u8) -> Self {
        if matches!(self.column_type, ColumnType::Decimal) {
            self.scale = Some(scale);
        }
        self
    }

    /// Sets the decimal precision.
    #[must_use]
    pub fn precision(mut self, precision: u8) -> Self {
        if matches!(self.column_type, ColumnType::Decimal) {
            self.precision = Some(precision);
        }
        self
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(f, self.column_type, self.limit, self.precision, self.scale)
    }
}

/// Live definition of one column, as reported by a reflection collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExistingColumn {
    /// Column name.
    pub name: String,
    /// Canonical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Storage limit, when the database records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Decimal scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    /// Decimal precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
}

impl ExistingColumn {
    /// Creates a snapshot with no extra attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            limit: None,
            scale: None,
            precision: None,
        }
    }

    /// Sets the storage limit.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the decimal scale.
    #[must_use]
    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Sets the decimal precision.
    #[must_use]
    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Converts the snapshot back into a column definition, e.g. to revert a
    /// change in a `down` body.
    #[must_use]
    pub fn to_spec(&self) -> ColumnSpec {
        let mut spec = ColumnSpec::new(self.name.clone(), self.column_type);
        if let Some(limit) = self.limit {
            spec = spec.limit(limit);
        }
        if let Some(scale) = self.scale {
            spec = spec.scale(scale);
        }
        if let Some(precision) = self.precision {
            spec = spec.precision(precision);
        }
        spec
    }
}

impl From<&ColumnSpec> for ExistingColumn {
    fn from(spec: &ColumnSpec) -> Self {
        Self {
            name: spec.name.clone(),
            column_type: spec.column_type,
            limit: spec.limit,
            scale: spec.scale,
            precision: spec.precision,
        }
    }
}

impl From<&ExistingColumn> for ColumnSpec {
    fn from(existing: &ExistingColumn) -> Self {
        Self {
            name: existing.name.clone(),
            column_type: existing.column_type,
            limit: existing.limit,
            scale: existing.scale,
            precision: existing.precision,
        }
    }
}

impl fmt::Display for ExistingColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(f, self.column_type, self.limit, self.precision, self.scale)
    }
}

fn describe(
    f: &mut fmt::Formatter<'_>,
    column_type: ColumnType,
    limit: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
) -> fmt::Result {
    write!(f, "{column_type}")?;
    if let Some(limit) = limit {
        write!(f, "(limit {limit})")?;
    }
    match (precision, scale) {
        (Some(p), Some(s)) => write!(f, "({p}, {s})"),
        (Some(p), None) => write!(f, "({p})"),
        (None, Some(s)) => write!(f, "(scale {s})"),
        (None, None) => Ok(()),
    }
}

/// A (possibly composite) index over one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed columns, in order.
    pub columns: Vec<String>,
}

impl IndexSpec {
    /// Creates an index over the given columns.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a single-column index.
    #[must_use]
    pub fn single(column: impl Into<String>) -> Self {
        Self {
            columns: vec![column.into()],
        }
    }

    /// Derives the index name for `table`: `index_<table>_on_<a>_and_<b>`.
    #[must_use]
    pub fn name_for(&self, table: &str) -> String {
        format!("index_{table}_on_{}", self.columns.join("_and_"))
    }
}

/// Desired shape of one table.
///
/// Columns keep the order in which they were declared. The implicit primary
/// key is never listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    /// Entity the schema was built for.
    pub entity: String,
    /// Storage name of the table.
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
    /// Indexes in declaration order.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl ModelSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Adds an index unless an identical one is already present.
    pub fn push_index(&mut self, index: IndexSpec) {
        if !self.indexes.contains(&index) {
            self.indexes.push(index);
        }
    }
}
