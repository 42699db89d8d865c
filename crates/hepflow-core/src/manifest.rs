//! Deterministic run manifest for audit/replay.
//!
//! The runner emits a manifest after a successful run; identical workflow,
//! inputs and chunk plan produce identical hashes and output digests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: ManifestId,

    /// Stable hash of the workflow spec (sources, steps, aggregates, sink).
    pub workflow_hash: Hash256,

    /// Stable hash of the chunk ranges the run was split into.
    pub chunk_plan_hash: Hash256,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Digest of the materialized outputs (aggregates and write result).
    pub outputs_digest: Option<Hash256>,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(workflow_hash: Hash256, chunk_plan_hash: Hash256, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            workflow_hash,
            chunk_plan_hash,
            engine_version: crate::VERSION.to_string(),
            outputs_digest: None,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64, outputs_digest: Option<Hash256>) -> Self {
        self.finished_ms = finished_ms;
        self.outputs_digest = outputs_digest;
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_ms.saturating_sub(self.started_ms)
    }
}
