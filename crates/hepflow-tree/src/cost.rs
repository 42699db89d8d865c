//! Very lightweight work model used to size chunks.
//!
//! Work is estimated in rows and bytes across all sources, plus the number
//! of chunks that may be resident at once.

use serde::{Deserialize, Serialize};

/// Summary of a workflow's input (used to pick a chunk size).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEstimate {
    /// Total records across all sources.
    pub total_rows: u64,
    /// Estimated in-memory bytes of the loaded columns.
    pub total_bytes: u64,
    /// Chunks processed concurrently (bounds resident batches).
    pub concurrency: u32,
}

impl WorkEstimate {
    /// Estimate from per-source record counts and an estimated row width.
    pub fn from_sources(record_counts: &[u64], row_bytes: u64, concurrency: usize) -> Self {
        let total_rows: u64 = record_counts.iter().sum();
        Self {
            total_rows,
            total_bytes: total_rows.saturating_mul(row_bytes.max(1)),
            concurrency: concurrency.max(1) as u32,
        }
    }

    /// Merge estimates of two independent inputs.
    pub fn combine(a: Self, b: Self) -> Self {
        Self {
            total_rows: a.total_rows + b.total_rows,
            total_bytes: a.total_bytes + b.total_bytes,
            concurrency: a.concurrency.max(b.concurrency),
        }
    }

    pub fn bytes_per_row(&self) -> Option<f64> {
        (self.total_rows > 0 && self.total_bytes > 0)
            .then(|| (self.total_bytes as f64 / self.total_rows as f64).max(1.0))
    }
}
