//! Chunk-size selection logic.
//!
//! Inputs:
//! - Memory cap (bytes).
//! - `WorkEstimate` (rows/bytes/concurrency).
//!
//! Output:
//! - A rows-per-chunk hint the planner uses when no chunk size is configured.

use crate::cost::WorkEstimate;
use serde::{Deserialize, Serialize};

/// Copies of a chunk assumed resident per running task (input, derived, partial).
const COPIES_PER_TASK: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSizeHint {
    pub rows_per_chunk: u64,
}

pub fn choose_chunk_size(mem_cap_bytes: usize, work: &WorkEstimate) -> ChunkSizeHint {
    // Budget per chunk ≈ mem_cap / (K * concurrency + 1).
    let concurrency = (work.concurrency as f64).max(1.0);
    let chunk_bytes = (mem_cap_bytes as f64 / (COPIES_PER_TASK * concurrency + 1.0)).max(1.0);

    let rows = match work.bytes_per_row() {
        Some(bpr) => ((chunk_bytes / bpr).max(1.0) as u64).clamp(1, work.total_rows.max(1)),
        // Nothing known about row width: sqrt(total_rows) keeps chunk count and size balanced.
        None => (work.total_rows as f64).sqrt().max(1.0) as u64,
    };

    ChunkSizeHint {
        rows_per_chunk: rows.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_fits_memory_share() {
        let work = WorkEstimate::from_sources(&[1_000_000], 100, 4);
        let hint = choose_chunk_size(13_000, &work);
        // 13000 / (3*4 + 1) = 1000 bytes → 10 rows
        assert_eq!(hint.rows_per_chunk, 10);
    }

    #[test]
    fn never_exceeds_total_rows() {
        let work = WorkEstimate::from_sources(&[50], 8, 1);
        assert_eq!(choose_chunk_size(1 << 30, &work).rows_per_chunk, 50);
    }

    #[test]
    fn unknown_width_falls_back_to_sqrt() {
        let work = WorkEstimate {
            total_rows: 10_000,
            total_bytes: 0,
            concurrency: 1,
        };
        assert_eq!(choose_chunk_size(1024, &work).rows_per_chunk, 100);
    }
}
