//! Debug-time verification helpers for chunk and reduction plans.
//!
//! Intended for tests and debug builds to catch violations early. They
//! panic on failure and should be cheap.

use std::collections::HashSet;

use hepflow_core::id::NodeId;
use hepflow_core::range::ChunkRange;

use crate::reduce::ReducePlan;

/// Ranges of one source must tile `[0, total)` in order without gaps.
pub fn assert_partitions(ranges: &[ChunkRange], total: u64) {
    let mut cursor = 0;
    for r in ranges {
        assert_eq!(r.start, cursor, "gap or overlap before {r}");
        assert!(r.start < r.stop, "empty range {r}");
        cursor = r.stop;
    }
    assert_eq!(cursor, total, "ranges end at {cursor}, source has {total}");
}

/// Every combine node's inputs must be produced before it.
pub fn assert_topological(plan: &ReducePlan) {
    let mut seen: HashSet<NodeId> = (0..plan.leaves as u64).map(NodeId::new).collect();
    for n in &plan.combines {
        for d in &n.inputs {
            assert!(
                seen.contains(d),
                "input {d} not produced before node {}",
                n.id
            );
        }
        seen.insert(n.id);
    }
}

/// Fan-in of every combine node stays within `max_fanin`.
pub fn assert_bounded_fanin(plan: &ReducePlan, max_fanin: usize) {
    for n in &plan.combines {
        assert!(
            n.inputs.len() <= max_fanin,
            "node {} has fan-in {} > {}",
            n.id,
            n.inputs.len(),
            max_fanin
        );
    }
}
