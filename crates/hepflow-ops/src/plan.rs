//! Transform planning surfaces: `Footprint` and `OpPlan`.

use hepflow_core::schema::Schema;
use serde::{Deserialize, Serialize};

/// Coarse memory model for a chunk flowing through a transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Estimated extra bytes per input row (mask, derived columns).
    pub bytes_per_row: u64,
    /// Fixed overhead per chunk.
    pub overhead_bytes: u64,
}

impl Footprint {
    /// Estimate live bytes for a chunk of `rows` rows carrying `bytes` of input.
    pub fn estimate_live(&self, rows: u64, bytes: u64) -> u64 {
        bytes
            .saturating_add(self.overhead_bytes)
            .saturating_add(self.bytes_per_row.saturating_mul(rows))
    }
}

/// Transform plan: output schema plus a cached footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpPlan {
    pub output_schema: Schema,
    pub footprint: Footprint,
}

impl OpPlan {
    pub fn new(output_schema: Schema, footprint: Footprint) -> Self {
        Self {
            output_schema,
            footprint,
        }
    }
}
