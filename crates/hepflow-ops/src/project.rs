//! Projection: keep the listed columns, in the listed order.

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde_json::json;

use crate::plan::{Footprint, OpPlan};
use crate::traits::{OpError, Transform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub columns: Vec<String>,
}

impl Project {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl Transform for Project {
    fn name(&self) -> &'static str {
        "project"
    }

    fn params(&self) -> serde_json::Value {
        json!({ "columns": self.columns })
    }

    fn memory_need(&self, _rows: u64, _bytes: u64) -> Footprint {
        Footprint::default()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        if self.columns.is_empty() {
            return Err(OpError::Plan("project needs at least one column".into()));
        }
        let out = input.project(&self.columns, "project input")?;
        out.validate()?;
        Ok(OpPlan::new(out, self.memory_need(0, 0)))
    }

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError> {
        Ok(batch.select(&self.columns)?)
    }
}
