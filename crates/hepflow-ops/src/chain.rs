//! Sequential composition of transforms.

use std::sync::Arc;

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;

use crate::plan::{Footprint, OpPlan};
use crate::traits::{OpError, Transform};

/// Applies its stages in order. The identity of a chain is the list of its
/// stage identities, so a chain and the same stages applied one by one
/// describe the same computation.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Transform>>,
}

impl Chain {
    pub fn new(stages: Vec<Arc<dyn Transform>>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Arc<dyn Transform>] {
        &self.stages
    }

    /// Output schema after every stage; first entry is the input.
    pub fn plan_all(&self, input: &Schema) -> Result<Vec<OpPlan>, OpError> {
        let mut plans = Vec::with_capacity(self.stages.len());
        let mut schema = input.clone();
        for stage in &self.stages {
            let plan = stage.plan(&schema)?;
            schema = plan.output_schema.clone();
            plans.push(plan);
        }
        Ok(plans)
    }
}

impl Transform for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.stages
                .iter()
                .map(|s| serde_json::to_value(s.identity()).unwrap_or(serde_json::Value::Null))
                .collect(),
        )
    }

    fn memory_need(&self, rows: u64, bytes: u64) -> Footprint {
        // Stages run one after another, so the largest stage dominates.
        self.stages
            .iter()
            .map(|s| s.memory_need(rows, bytes))
            .max_by_key(|f| f.estimate_live(rows, bytes))
            .unwrap_or_default()
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let plans = self.plan_all(input)?;
        let schema = plans
            .last()
            .map(|p| p.output_schema.clone())
            .unwrap_or_else(|| input.clone());
        Ok(OpPlan::new(schema, self.memory_need(0, 0)))
    }

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError> {
        let mut current = batch.clone();
        for stage in &self.stages {
            current = stage.apply(&current)?;
        }
        Ok(current)
    }
}
