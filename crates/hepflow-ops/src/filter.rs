//! Filter transform: keep rows where a predicate expression holds.
//!
//! See `expr` for the predicate grammar. Surviving rows keep their order.

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde_json::json;

use crate::expr::Expr;
use crate::plan::{Footprint, OpPlan};
use crate::traits::{OpError, Transform};

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(expr: &str) -> Result<Self, OpError> {
        Ok(Self {
            predicate: Expr::parse(expr)?,
        })
    }

    pub fn from_expr(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }

    /// A single filter equivalent to applying `self` then `other`.
    pub fn conjoin(&self, other: &Filter) -> Filter {
        Filter::from_expr(Expr::and(self.predicate.clone(), other.predicate.clone()))
    }
}

impl Transform for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn params(&self) -> serde_json::Value {
        // Normalized form, so spacing differences share one identity.
        json!({ "expr": self.predicate.to_string() })
    }

    fn memory_need(&self, _rows: u64, _bytes: u64) -> Footprint {
        // One mask byte per row; output is at most the input size.
        Footprint {
            bytes_per_row: 1,
            overhead_bytes: 0,
        }
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        self.predicate.check(input)?;
        Ok(OpPlan::new(input.clone(), self.memory_need(0, 0)))
    }

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError> {
        let mask = self.predicate.eval(batch)?;
        Ok(batch.filter(&mask)?)
    }
}
