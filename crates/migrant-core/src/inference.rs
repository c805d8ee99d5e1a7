//! Type inference from example values.
//!
//! Each field is inferred on its own: the result depends only on the example
//! and the field's explicit options, never on other fields or on the live
//! schema.

use tracing::{trace, warn};

use crate::declaration::{Example, FieldDeclaration, FieldOptions, SemanticType};
use crate::error::{GenerationError, Result};
use crate::schema::{ColumnSpec, ColumnType};

/// Text longer than this many characters is inferred as `text`.
pub const SENTENCE_LENGTH_THRESHOLD: usize = 255;

/// Scale of columns inferred from monetary examples.
pub const CURRENCY_SCALE: u8 = 2;

/// Infers the column for one field of `entity`.
///
/// An explicit type override wins outright. Otherwise the example decides;
/// explicit `limit`, `precision` and `scale` options are applied afterwards.
///
/// # Errors
///
/// `UnresolvedType` when the example has no recognizable shape.
pub fn infer_column(entity: &str, field: &FieldDeclaration) -> Result<ColumnSpec> {
    let base = match field.options.column_type {
        Some(column_type) => ColumnSpec::new(field.name.clone(), column_type),
        None => from_example(entity, &field.name, &field.example)?,
    };
    for option in ignored_options(base.column_type, &field.options) {
        warn!(
            entity,
            column = %field.name,
            column_type = %base.column_type,
            option,
            "Option does not apply to the column type and is ignored"
        );
    }
    let column = apply_options(base, &field.options);
    trace!(entity, column = %column.name, inferred = %column, "Inferred column");
    Ok(column)
}

fn from_example(entity: &str, name: &str, example: &Example) -> Result<ColumnSpec> {
    let column = match example {
        Example::Flag | Example::Boolean(_) => ColumnSpec::new(name, ColumnType::Boolean),
        Example::Date(_) | Example::DateTime(_) => ColumnSpec::new(name, ColumnType::DateTime),
        Example::Currency(_) | Example::Semantic(SemanticType::Currency) => {
            ColumnSpec::new(name, ColumnType::Decimal).scale(CURRENCY_SCALE)
        }
        Example::Email(_) | Example::Semantic(SemanticType::Email) => {
            ColumnSpec::new(name, ColumnType::String)
        }
        Example::Float(_) => ColumnSpec::new(name, ColumnType::Double),
        Example::Integer(value) => integer_column(name, [*value]),
        Example::Range(start, end) => integer_column(name, [*start, *end]),
        Example::Text(value) => {
            if is_paragraph(value) {
                ColumnSpec::new(name, ColumnType::Text)
            } else {
                ColumnSpec::new(name, ColumnType::String)
            }
        }
        Example::Verbatim(value) => {
            let column = ColumnSpec::new(name, ColumnType::String);
            match u32::try_from(value.chars().count()) {
                Ok(0) | Err(_) => column,
                Ok(len) => column.limit(len),
            }
        }
        Example::Type(column_type) => ColumnSpec::new(name, *column_type),
        Example::Opaque(shape) => {
            return Err(GenerationError::UnresolvedType {
                entity: entity.to_string(),
                column: name.to_string(),
                shape: shape.clone(),
            })
        }
    };
    Ok(column)
}

/// Integers that all fit one signed byte get `limit = 1`.
fn integer_column<const N: usize>(name: &str, values: [i64; N]) -> ColumnSpec {
    let column = ColumnSpec::new(name, ColumnType::Integer);
    if values.iter().all(|v| i8::try_from(*v).is_ok()) {
        column.limit(1)
    } else {
        column
    }
}

fn is_paragraph(value: &str) -> bool {
    value.contains('\n') || value.chars().count() > SENTENCE_LENGTH_THRESHOLD
}

/// Names of the options in `options` that `column_type` has no use for.
fn ignored_options(column_type: ColumnType, options: &FieldOptions) -> Vec<&'static str> {
    let decimal = matches!(column_type, ColumnType::Decimal);
    let mut ignored = Vec::new();
    if options.limit.is_some() && !column_type.accepts_limit() {
        ignored.push("limit");
    }
    if options.precision.is_some() && !decimal {
        ignored.push("precision");
    }
    if options.scale.is_some() && !decimal {
        ignored.push("scale");
    }
    ignored
}

fn apply_options(mut column: ColumnSpec, options: &FieldOptions) -> ColumnSpec {
    if let Some(limit) = options.limit {
        column = column.limit(limit);
    }
    if let Some(precision) = options.precision {
        column = column.precision(precision);
    }
    if let Some(scale) = options.scale {
        column = column.scale(scale);
    }
    column
}
