#![forbid(unsafe_code)]
//! hepflow-ops: pure per-chunk transforms and associative aggregates.
//!
//! Design intent:
//! - Everything here is synchronous and side-effect free; the exec crate
//!   decides when and where a transform runs.
//! - Each transform has a stable content identity (`name`, `version`,
//!   `params`) that the executor hashes into task keys.
//! - Each transform exposes a planning surface (`OpPlan`) with an output
//!   schema and footprint so the planner can validate and size chunks.

pub mod plan;
pub mod registry;
pub mod traits;

pub mod aggregate;
pub mod chain;
pub mod expr;
pub mod filter;
pub mod kinematics;
pub mod multiplicity;
pub mod pair;
pub mod project;

pub use aggregate::{Aggregator, CountAggregator, Histogram, HistogramAggregator, Partial, RowCount};
pub use chain::Chain;
pub use plan::{Footprint, OpPlan};
pub use registry::{build_aggregator, build_transform};
pub use traits::{OpError, Transform, TransformIdentity};
