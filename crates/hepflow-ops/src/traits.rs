//! Transform trait + common interfaces.
//!
//! The planner calls `plan(...)` to validate a stage chain and obtain output
//! schemas; the executor calls `apply(...)` once per chunk.

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{Footprint, OpPlan};

#[derive(Debug, Error)]
pub enum OpError {
    #[error("planning error: {0}")]
    Plan(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error("expression error: {0}")]
    Expr(String),

    #[error("row {row}: expected one positive and one negative candidate, found {positive} positive and {negative} negative")]
    CardinalityMismatch {
        row: usize,
        positive: usize,
        negative: usize,
    },

    #[error("incompatible aggregation domains: {0}")]
    IncompatibleDomain(String),

    #[error(transparent)]
    Core(#[from] hepflow_core::Error),
}

/// What makes two transform applications "the same call".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformIdentity {
    pub name: String,
    pub version: u32,
    pub params: serde_json::Value,
}

/// A pure batch → batch function.
///
/// Invariants:
/// - `apply` is deterministic given the same input batch.
/// - Surviving rows keep their relative order; row count may only shrink.
/// - Two transforms with equal `identity()` compute the same function.
pub trait Transform: Send + Sync + std::fmt::Debug + 'static {
    /// Stable name, part of the content identity.
    fn name(&self) -> &'static str;

    /// Bump when the semantics of `apply` change.
    fn version(&self) -> u32 {
        1
    }

    /// Canonical parameters, part of the content identity.
    fn params(&self) -> serde_json::Value;

    /// Rough memory footprint for a chunk flowing through this transform.
    fn memory_need(&self, rows: u64, bytes: u64) -> Footprint;

    /// Validate against the input schema and return the output schema.
    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError>;

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError>;

    fn identity(&self) -> TransformIdentity {
        TransformIdentity {
            name: self.name().to_string(),
            version: self.version(),
            params: self.params(),
        }
    }
}
