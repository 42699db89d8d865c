//! Deterministic replay & provenance helpers.
//!
//! Manifest hashes are computed from the serialized workflow spec, the chunk
//! ranges it was split into, and the materialized outputs. Identical inputs
//! and configuration produce identical hashes.

use hepflow_core::dag::WorkflowSpec;
use hepflow_core::hash::{hash_all, hash_serde, Hash256};
use hepflow_core::range::ChunkRange;
use hepflow_io::WriteResult;
use hepflow_ops::Partial;

use crate::ExecError;

pub fn hash_workflow(spec: &WorkflowSpec) -> Result<Hash256, ExecError> {
    Ok(hash_serde(spec)?)
}

pub fn hash_chunk_plan(chunks: &[ChunkRange]) -> Result<Hash256, ExecError> {
    Ok(hash_serde(&chunks)?)
}

/// Digest over aggregate results (in declaration order) and the write result.
pub fn hash_outputs(partials: &[Partial], written: Option<&WriteResult>) -> Result<Hash256, ExecError> {
    let mut parts = Vec::with_capacity(partials.len() + 1);
    for p in partials {
        parts.push(hash_serde(p)?);
    }
    if let Some(w) = written {
        // Rows and layout only: the destination path does not change the data.
        parts.push(hash_serde(&(&w.schema, &w.rows_per_partition, &w.strategy, w.format))?);
    }
    Ok(hash_all(&parts))
}
