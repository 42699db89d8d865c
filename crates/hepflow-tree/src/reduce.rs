//! Tree reduction: N partials → groups of `group_size` → ... → one root.
//!
//! Leaves are `NodeId(0..n)`. Each level combines consecutive groups of the
//! previous level; a trailing singleton group is carried up unchanged, so
//! every combine node has fan-in in `2..=group_size`.

use hepflow_core::error::{Error, Result};
use hepflow_core::id::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceNode {
    pub id: NodeId,
    /// 1 for nodes combining leaves, increasing toward the root.
    pub level: usize,
    pub inputs: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducePlan {
    pub leaves: usize,
    pub group_size: usize,
    /// Combine nodes in dependency order (inputs always precede the node).
    pub combines: Vec<ReduceNode>,
    /// `None` when there are no leaves (result is the identity).
    pub root: Option<NodeId>,
}

impl ReducePlan {
    pub fn new(leaves: usize, group_size: usize) -> Result<Self> {
        if group_size < 2 {
            return Err(Error::Config(format!(
                "reduce group size must be >= 2, got {group_size}"
            )));
        }
        let mut next_id = leaves as u64;
        let mut combines = Vec::new();
        let mut current: Vec<NodeId> = (0..leaves as u64).map(NodeId::new).collect();
        let mut level = 0;

        while current.len() > 1 {
            level += 1;
            let mut upper = Vec::with_capacity(current.len().div_ceil(group_size));
            for group in current.chunks(group_size) {
                if let [single] = group {
                    upper.push(*single);
                    continue;
                }
                let id = NodeId::new(next_id);
                next_id += 1;
                combines.push(ReduceNode {
                    id,
                    level,
                    inputs: group.to_vec(),
                });
                upper.push(id);
            }
            current = upper;
        }

        Ok(Self {
            leaves,
            group_size,
            combines,
            root: current.first().copied(),
        })
    }

    /// Number of combine levels (0 for zero or one leaf).
    pub fn depth(&self) -> usize {
        self.combines.last().map(|n| n.level).unwrap_or(0)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        (id.get() as usize) < self.leaves
    }

    /// `(input, consumer)` pairs for frontier analysis.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.combines
            .iter()
            .flat_map(|n| n.inputs.iter().map(move |i| (*i, n.id)))
            .collect()
    }

    /// Peak number of partials resident when combining as soon as a group is ready.
    pub fn peak_live(&self) -> usize {
        if self.leaves == 0 {
            return 0;
        }
        let mut order: Vec<(NodeId, Vec<NodeId>)> = (0..self.leaves as u64)
            .map(|i| (NodeId::new(i), Vec::new()))
            .collect();
        order.extend(self.combines.iter().map(|n| (n.id, n.inputs.clone())));
        crate::frontier::compute_max_frontier(&order)
    }
}

/// Reduce `items` in groups of `group_size` until one value remains.
///
/// Zero items yield `identity()`. The grouping matches `ReducePlan::new`,
/// so the result depends on `group_size` only through floating-point order.
pub fn tree_reduce<T, E>(
    items: Vec<T>,
    group_size: usize,
    identity: impl FnOnce() -> T,
    mut combine: impl FnMut(Vec<T>) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<Error>,
{
    if group_size < 2 {
        return Err(Error::Config(format!("reduce group size must be >= 2, got {group_size}")).into());
    }
    let mut current = items;
    while current.len() > 1 {
        let mut upper = Vec::with_capacity(current.len().div_ceil(group_size));
        let mut it = current.into_iter().peekable();
        while it.peek().is_some() {
            let mut group: Vec<T> = it.by_ref().take(group_size).collect();
            if group.len() == 1 {
                upper.extend(group.pop());
            } else {
                upper.push(combine(group)?);
            }
        }
        current = upper;
    }
    Ok(current.pop().unwrap_or_else(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shapes() {
        let p = ReducePlan::new(0, 4).unwrap();
        assert_eq!(p.root, None);
        assert!(p.combines.is_empty());

        let p = ReducePlan::new(1, 4).unwrap();
        assert_eq!(p.root, Some(NodeId::new(0)));
        assert_eq!(p.depth(), 0);

        let p = ReducePlan::new(5, 4).unwrap();
        // level 1: [0..4] → 5, leaf 4 carried; level 2: [5, 4] → 6
        assert_eq!(p.combines.len(), 2);
        assert_eq!(p.combines[1].inputs, vec![NodeId::new(5), NodeId::new(4)]);
        assert_eq!(p.root, Some(NodeId::new(6)));
        assert_eq!(p.depth(), 2);
    }

    #[test]
    fn group_size_below_two_rejected() {
        assert!(ReducePlan::new(3, 1).is_err());
        let r: std::result::Result<i32, Error> = tree_reduce(vec![1, 2], 1, || 0, |g| Ok(g.iter().sum()));
        assert!(r.is_err());
    }

    #[test]
    fn peak_live_bounded_by_fan_in() {
        let p = ReducePlan::new(64, 4).unwrap();
        assert!(p.peak_live() <= 4 * p.depth() + 1, "peak {}", p.peak_live());
        assert!(p.peak_live() < 64);
    }

    #[test]
    fn empty_reduces_to_identity() {
        let r: std::result::Result<i32, Error> = tree_reduce(Vec::new(), 4, || 42, |_| Ok(0));
        assert_eq!(r.unwrap(), 42);
    }

    #[test]
    fn combine_failure_propagates() {
        let r: std::result::Result<i32, Error> = tree_reduce(vec![1, 2, 3], 2, || 0, |g| {
            if g.contains(&3) {
                Err(Error::Invariant("boom".into()))
            } else {
                Ok(g.iter().sum())
            }
        });
        assert!(r.is_err());
    }

    proptest! {
        #[test]
        fn any_group_size_gives_same_sum(xs in proptest::collection::vec(0i64..1000, 0..200), g in 2usize..9) {
            let flat: i64 = xs.iter().sum();
            let r: std::result::Result<i64, Error> = tree_reduce(xs, g, || 0, |grp| Ok(grp.iter().sum()));
            prop_assert_eq!(r.unwrap(), flat);
        }

        #[test]
        fn plan_covers_every_leaf_once(n in 0usize..300, g in 2usize..9) {
            let p = ReducePlan::new(n, g).unwrap();
            let mut consumed = vec![0u32; n + p.combines.len()];
            for node in &p.combines {
                prop_assert!(node.inputs.len() >= 2 && node.inputs.len() <= g);
                for i in &node.inputs {
                    consumed[i.get() as usize] += 1;
                }
            }
            for (id, c) in consumed.iter().enumerate() {
                let is_root = p.root.map(|r| r.get() as usize) == Some(id);
                prop_assert_eq!(*c, if is_root { 0 } else { 1 });
            }
        }
    }
}
