//! Associative, commutative aggregates over record batches.
//!
//! An `Aggregator` folds one batch into a `Partial`; partials of the same
//! domain combine with `Partial::combine`, and `identity()` is the neutral
//! element. That is all tree reduction needs.

mod count;
mod histogram;

pub use count::{CountAggregator, RowCount};
pub use histogram::{find_bin, Histogram, HistogramAggregator};

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::traits::{OpError, TransformIdentity};

/// A per-chunk (or combined) aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partial {
    Histogram(Histogram),
    Count(RowCount),
}

impl Partial {
    /// Output name the partial belongs to.
    pub fn name(&self) -> &str {
        match self {
            Partial::Histogram(h) => &h.name,
            Partial::Count(c) => &c.name,
        }
    }

    pub fn combine(&self, other: &Partial) -> Result<Partial, OpError> {
        match (self, other) {
            (Partial::Histogram(a), Partial::Histogram(b)) => Ok(Partial::Histogram(a.combine(b)?)),
            (Partial::Count(a), Partial::Count(b)) => Ok(Partial::Count(a.combine(b)?)),
            (a, b) => Err(OpError::IncompatibleDomain(format!(
                "cannot combine '{}' with '{}' of a different kind",
                a.name(),
                b.name()
            ))),
        }
    }

    /// Combine a whole group left to right. Empty groups are an error:
    /// a reduction step never runs without inputs.
    pub fn combine_all(parts: &[Partial]) -> Result<Partial, OpError> {
        let (first, rest) = parts
            .split_first()
            .ok_or_else(|| OpError::Exec("combine of an empty group".into()))?;
        rest.iter().try_fold(first.clone(), |acc, p| acc.combine(p))
    }

    /// Tree-reduce `parts` in groups of `group_size`; no parts → `identity`.
    pub fn reduce(parts: Vec<Partial>, group_size: usize, identity: Partial) -> Result<Partial, OpError> {
        hepflow_tree::tree_reduce(parts, group_size, || identity, |group| {
            Partial::combine_all(&group)
        })
    }

    pub fn as_histogram(&self) -> Option<&Histogram> {
        match self {
            Partial::Histogram(h) => Some(h),
            Partial::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<&RowCount> {
        match self {
            Partial::Count(c) => Some(c),
            Partial::Histogram(_) => None,
        }
    }
}

pub trait Aggregator: Send + Sync + std::fmt::Debug + 'static {
    /// Name of the aggregate output (histogram/counter name).
    fn name(&self) -> &str;

    /// Stable kind, part of the content identity.
    fn kind(&self) -> &'static str;

    fn version(&self) -> u32 {
        1
    }

    fn params(&self) -> serde_json::Value;

    /// Validate inputs against the schema at the tap point.
    fn check(&self, input: &Schema) -> Result<(), OpError>;

    /// Neutral element: `identity().combine(p) == p`.
    fn identity(&self) -> Partial;

    fn accumulate(&self, batch: &RecordBatch) -> Result<Partial, OpError>;

    fn identity_key(&self) -> TransformIdentity {
        TransformIdentity {
            name: self.kind().to_string(),
            version: self.version(),
            params: self.params(),
        }
    }
}
