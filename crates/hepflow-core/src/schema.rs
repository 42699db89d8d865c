//! Explicit schema descriptors. Pure data; no Arrow dependency here.
//!
//! Every source declares an ordered list of typed columns up front. Loaders
//! validate requested columns against it at construction time, so a missing
//! column surfaces as `ColumnNotFound` before any chunk is read.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    /// Jagged column: one variable-length list per row (e.g. muons of an event).
    List(Box<DataType>),
}

impl DataType {
    /// Parse the spellings accepted in workflow files: `Float64`, `f64`,
    /// `List<Float64>`, `list<i32>`, ...
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let inner = s
            .strip_prefix("List<")
            .or_else(|| s.strip_prefix("list<"))
            .and_then(|rest| rest.strip_suffix('>'));
        if let Some(inner) = inner {
            return Ok(DataType::List(Box::new(DataType::parse(inner)?)));
        }
        Ok(match s {
            "Boolean" | "bool" => DataType::Boolean,
            "Int32" | "i32" => DataType::Int32,
            "Int64" | "i64" => DataType::Int64,
            "Float32" | "f32" => DataType::Float32,
            "Float64" | "f64" => DataType::Float64,
            "Utf8" | "str" | "string" => DataType::Utf8,
            other => return Err(Error::Schema(format!("unknown data type '{other}'"))),
        })
    }

    pub fn is_list(&self) -> bool {
        matches!(self, DataType::List(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
        )
    }

    /// Rough in-memory width of one value, used for chunk sizing.
    pub fn estimated_width(&self) -> u64 {
        match self {
            DataType::Boolean => 1,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
            DataType::Utf8 => 32, // Average string size estimate
            // Assume a handful of objects per event.
            DataType::List(inner) => 8 + 4 * inner.estimated_width(),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::List(inner) => write!(f, "List<{inner}>"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field or fail with `ColumnNotFound`; `context` names the
    /// schema owner in the error message.
    pub fn require(&self, name: &str, context: &str) -> Result<&Field> {
        self.field_named(name).ok_or_else(|| Error::ColumnNotFound {
            column: name.to_string(),
            context: context.to_string(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Sub-schema with `columns` in the requested order.
    pub fn project(&self, columns: &[String], context: &str) -> Result<Schema> {
        let fields = columns
            .iter()
            .map(|c| self.require(c, context).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new(fields))
    }

    /// Reject duplicate column names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for f in &self.fields {
            if !seen.insert(f.name.as_str()) {
                return Err(Error::Schema(format!("duplicate column '{}'", f.name)));
            }
        }
        Ok(())
    }

    /// Sum of estimated per-column widths (at least one byte).
    pub fn estimated_row_bytes(&self) -> u64 {
        self.fields
            .iter()
            .map(|f| f.data_type.estimated_width())
            .sum::<u64>()
            .max(1)
    }
}
