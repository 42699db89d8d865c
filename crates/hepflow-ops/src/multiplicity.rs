//! Multiplicity: per-row length of a jagged column as a new Int32 column.

use hepflow_core::schema::{DataType, Field, Schema};
use hepflow_core::types::{Column, RecordBatch, Scalar};
use serde_json::json;

use crate::plan::{Footprint, OpPlan};
use crate::traits::{OpError, Transform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiplicity {
    pub column: String,
    pub alias: String,
}

impl Transform for Multiplicity {
    fn name(&self) -> &'static str {
        "multiplicity"
    }

    fn params(&self) -> serde_json::Value {
        json!({ "column": self.column, "alias": self.alias })
    }

    fn memory_need(&self, _rows: u64, _bytes: u64) -> Footprint {
        Footprint {
            bytes_per_row: 4,
            overhead_bytes: 0,
        }
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let field = input.require(&self.column, "multiplicity input")?;
        if !field.data_type.is_list() {
            return Err(OpError::Plan(format!(
                "multiplicity needs a list column, '{}' is {}",
                self.column, field.data_type
            )));
        }
        if input.index_of(&self.alias).is_some() {
            return Err(OpError::Plan(format!(
                "multiplicity alias '{}' already exists",
                self.alias
            )));
        }
        let mut out = input.clone();
        out.fields
            .push(Field::new(self.alias.clone(), DataType::Int32, field.nullable));
        Ok(OpPlan::new(out, self.memory_need(0, 0)))
    }

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError> {
        let col = batch.require_column(&self.column)?;
        let values = col
            .values
            .iter()
            .map(|v| match v {
                Scalar::List(items) => i32::try_from(items.len())
                    .map(Scalar::I32)
                    .map_err(|_| OpError::Exec(format!("'{}' list too long", self.column))),
                Scalar::Null => Ok(Scalar::Null),
                other => Err(OpError::Exec(format!(
                    "multiplicity of non-list value {other:?} in '{}'",
                    self.column
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batch.with_column(Column::new(self.alias.clone(), values))?)
    }
}
