use indexmap::IndexMap;

use crate::error::FormatError;
use crate::parser;
use crate::types::{FieldSchema, FieldScope, FieldType, FieldValue, Fields, Sample, Value};

fn scalar(kind: FieldType, token: &str) -> Value {
    match kind {
        FieldType::Integer => Value::Integer(parser::leading_integer(token)),
        FieldType::Float => Value::Float(parser::leading_float(token)),
        FieldType::Character => Value::Character(token.chars().next().unwrap_or('.')),
        FieldType::String => Value::String(token.to_owned()),
        FieldType::Flag => Value::Flag(true),
    }
}

pub(crate) fn field_value(schema: &FieldSchema, token: &str) -> FieldValue {
    let kind = schema.kind();
    if kind == FieldType::Flag {
        FieldValue::Scalar(Value::Flag(true))
    } else if schema.number().is_scalar() {
        FieldValue::Scalar(scalar(kind, token))
    } else {
        FieldValue::List(token.split(',').map(|t| scalar(kind, t)).collect())
    }
}

fn undeclared(scope: FieldScope, field: &str) -> FormatError {
    FormatError::UndeclaredField {
        scope,
        field: field.into(),
    }
}

/// Decodes the `;`-separated INFO column. Flags map to `true`, `KEY=VALUE`
/// pairs are typed according to their schema.
pub(crate) fn info(
    column: &str,
    schemas: &IndexMap<String, FieldSchema>,
) -> Result<Fields, FormatError> {
    if column == "." {
        return Ok(Fields::new());
    }
    column
        .split(';')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let (key, raw) = token.split_once('=').unwrap_or((token, ""));
            let schema = schemas
                .get(key)
                .ok_or_else(|| undeclared(FieldScope::Info, key))?;
            Ok((key.to_owned(), field_value(schema, raw)))
        })
        .collect()
}

/// Decodes the FORMAT keys and one `:`-separated column per sample.
/// Columns beyond the declared samples are ignored, as are missing
/// trailing values within a sample column.
pub(crate) fn genotypes(
    keys: &str,
    columns: &[String],
    samples: &[Sample],
    schemas: &IndexMap<String, FieldSchema>,
) -> Result<IndexMap<Sample, Fields>, FormatError> {
    if keys == "." || keys.is_empty() {
        return Ok(IndexMap::new());
    }
    let keys = keys
        .split(':')
        .map(|key| {
            schemas
                .get(key)
                .ok_or_else(|| undeclared(FieldScope::Format, key))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(columns
        .iter()
        .zip(samples)
        .map(|(column, sample)| {
            let fields = keys
                .iter()
                .zip(column.split(':'))
                .map(|(schema, token)| (schema.id().clone(), field_value(schema, token)))
                .collect();
            (sample.clone(), fields)
        })
        .collect())
}
