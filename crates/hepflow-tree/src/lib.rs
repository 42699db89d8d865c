#![forbid(unsafe_code)]
//! hepflow-tree: chunk layout and reduction-tree planning.
//!
//! Responsibilities:
//! - Split each source's `[0, total)` into near-even chunk ranges.
//! - Choose a chunk size from the memory cap when none is configured.
//! - Shape N per-chunk partials into a bounded fan-in reduction tree.
//! - Track the live frontier of that tree (peak resident partials).
//! - Provide debug-time verification helpers.
//!
//! **No I/O, no async** here. The exec crate drives these plans.

pub mod chunk;
pub mod cost;
pub mod frontier;
pub mod reduce;
pub mod schedule;
pub mod verify;

pub use chunk::{chunk_count, plan_chunks, plan_sources};
pub use cost::WorkEstimate;
pub use frontier::{compute_max_frontier, FrontierStats, FrontierTracker};
pub use reduce::{tree_reduce, ReduceNode, ReducePlan};
pub use schedule::{choose_chunk_size, ChunkSizeHint};
