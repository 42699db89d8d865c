//! Value codecs shared by sources, writers and readers.
//!
//! JSON carries every type (lists as arrays). Non-finite floats have no
//! JSON number form and travel as the strings `"NaN"`, `"inf"`, `"-inf"`.
//! CSV carries flat columns only, with an empty cell standing for null; an
//! empty Utf8 cell is the empty string, so CSV cannot hold nullable Utf8.

use hepflow_core::schema::{DataType, Field, Schema};
use hepflow_core::types::Scalar;

use crate::error::{Error, Result};

pub fn scalar_to_json(v: &Scalar) -> serde_json::Value {
    use Scalar::*;
    match v {
        Null => serde_json::Value::Null,
        Bool(b) => serde_json::Value::Bool(*b),
        I32(i) => serde_json::Value::from(*i),
        I64(i) => serde_json::Value::from(*i),
        F32(f) => float_to_json(*f as f64),
        F64(f) => float_to_json(*f),
        Str(s) => serde_json::Value::String(s.clone()),
        List(items) => serde_json::Value::Array(items.iter().map(scalar_to_json).collect()),
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    if f.is_finite() {
        serde_json::Value::from(f)
    } else if f.is_nan() {
        serde_json::Value::String("NaN".into())
    } else if f > 0.0 {
        serde_json::Value::String("inf".into())
    } else {
        serde_json::Value::String("-inf".into())
    }
}

fn json_float(v: &serde_json::Value) -> Option<f64> {
    v.as_f64().or_else(|| match v.as_str()? {
        "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    })
}

/// Decode a JSON value into the field's declared type.
pub fn json_to_scalar(v: &serde_json::Value, field: &Field, context: &str) -> Result<Scalar> {
    if v.is_null() {
        return if field.nullable {
            Ok(Scalar::Null)
        } else {
            Err(decode(context, format!("null in non-nullable column '{}'", field.name)))
        };
    }
    json_value(v, &field.data_type, &field.name, context)
}

fn json_value(v: &serde_json::Value, dt: &DataType, name: &str, context: &str) -> Result<Scalar> {
    let mismatch = || decode(context, format!("column '{name}': expected {dt}, got {v}"));
    Ok(match dt {
        DataType::Boolean => Scalar::Bool(v.as_bool().ok_or_else(mismatch)?),
        DataType::Int32 => {
            let i = v.as_i64().ok_or_else(mismatch)?;
            Scalar::I32(i32::try_from(i).map_err(|_| mismatch())?)
        }
        DataType::Int64 => Scalar::I64(v.as_i64().ok_or_else(mismatch)?),
        DataType::Float32 => Scalar::F32(json_float(v).ok_or_else(mismatch)? as f32),
        DataType::Float64 => Scalar::F64(json_float(v).ok_or_else(mismatch)?),
        DataType::Utf8 => Scalar::Str(v.as_str().ok_or_else(mismatch)?.to_string()),
        DataType::List(inner) => {
            let items = v.as_array().ok_or_else(mismatch)?;
            Scalar::List(
                items
                    .iter()
                    .map(|item| json_value(item, inner, name, context))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
    })
}

/// Render a flat value as a CSV cell.
pub fn scalar_to_cell(v: &Scalar, column: &str) -> Result<String> {
    use Scalar::*;
    Ok(match v {
        Null => String::new(),
        Bool(b) => b.to_string(),
        I32(i) => i.to_string(),
        I64(i) => i.to_string(),
        F32(f) => f.to_string(),
        F64(f) => f.to_string(),
        Str(s) => s.clone(),
        List(_) => {
            return Err(Error::Unsupported(format!(
                "CSV holds flat columns only; '{column}' is a list"
            )))
        }
    })
}

/// Parse a CSV cell into the field's declared (flat) type.
pub fn cell_to_scalar(cell: &str, field: &Field, context: &str) -> Result<Scalar> {
    if cell.is_empty() && !matches!(field.data_type, DataType::Utf8) {
        return if field.nullable {
            Ok(Scalar::Null)
        } else {
            Err(decode(context, format!("empty cell in non-nullable column '{}'", field.name)))
        };
    }
    Ok(match &field.data_type {
        DataType::Boolean => Scalar::Bool(parse_cell(cell, field, context)?),
        DataType::Int32 => Scalar::I32(parse_cell(cell, field, context)?),
        DataType::Int64 => Scalar::I64(parse_cell(cell, field, context)?),
        DataType::Float32 => Scalar::F32(parse_cell(cell, field, context)?),
        DataType::Float64 => Scalar::F64(parse_cell(cell, field, context)?),
        DataType::Utf8 => Scalar::Str(cell.to_string()),
        DataType::List(_) => {
            return Err(Error::Unsupported(format!(
                "CSV holds flat columns only; '{}' is declared {}",
                field.name, field.data_type
            )))
        }
    })
}

fn parse_cell<T>(cell: &str, field: &Field, context: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    cell.trim().parse().map_err(|e: T::Err| {
        decode(
            context,
            format!(
                "column '{}': cannot parse '{cell}' as {}: {e}",
                field.name, field.data_type
            ),
        )
    })
}

/// CSV cannot tell a null string from an empty one.
pub fn check_csv_schema(schema: &Schema) -> Result<()> {
    for f in &schema.fields {
        if f.data_type.is_list() {
            return Err(Error::Unsupported(format!(
                "CSV holds flat columns only; '{}' is declared {}",
                f.name, f.data_type
            )));
        }
        if f.nullable && f.data_type == DataType::Utf8 {
            return Err(Error::Unsupported(format!(
                "CSV cannot hold nullable Utf8 column '{}'",
                f.name
            )));
        }
    }
    Ok(())
}

fn decode(context: &str, msg: String) -> Error {
    Error::Decode {
        context: context.to_string(),
        msg,
    }
}
