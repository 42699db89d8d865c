//! Live-frontier tracking for reduction trees.
//!
//! The "frontier" is the set of partials that are materialized at the same
//! time. Bounded fan-in → bounded frontier → bounded peak memory.

use hepflow_core::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierStats {
    pub max_frontier_size: usize,
    pub steps: usize,
}

/// Frontier tracker for a DAG evaluated in dependency order.
///
/// Nodes that become ready are evaluated before older ready nodes, which
/// models combining a group as soon as its last input lands.
pub struct FrontierTracker {
    in_degree: BTreeMap<NodeId, usize>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    deps: HashMap<NodeId, Vec<NodeId>>,
    pending_consumers: HashMap<NodeId, usize>,
    ready: VecDeque<NodeId>,
    live: BTreeSet<NodeId>,
    max_frontier: usize,
    steps: usize,
}

impl FrontierTracker {
    /// `edges` are `(input, consumer)` pairs; `nodes` adds isolated nodes.
    pub fn new(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Self {
        let mut in_degree: BTreeMap<NodeId, usize> = nodes.iter().map(|n| (*n, 0)).collect();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut deps: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut pending_consumers: HashMap<NodeId, usize> = HashMap::new();

        for (u, v) in edges {
            *in_degree.entry(*v).or_default() += 1;
            in_degree.entry(*u).or_default();
            dependents.entry(*u).or_default().push(*v);
            deps.entry(*v).or_default().push(*u);
            *pending_consumers.entry(*u).or_default() += 1;
        }

        // BTreeMap iteration keeps the initial ready order deterministic.
        let ready = in_degree
            .iter()
            .filter_map(|(n, &deg)| (deg == 0).then_some(*n))
            .collect();

        Self {
            in_degree,
            dependents,
            deps,
            pending_consumers,
            ready,
            live: BTreeSet::new(),
            max_frontier: 0,
            steps: 0,
        }
    }

    /// Evaluate one ready node, release inputs with no remaining consumers.
    pub fn step(&mut self) -> Option<NodeId> {
        let n = self.ready.pop_front()?;
        self.live.insert(n);
        self.max_frontier = self.max_frontier.max(self.live.len());
        self.steps += 1;

        for d in self.deps.get(&n).into_iter().flatten() {
            if let Some(left) = self.pending_consumers.get_mut(d) {
                *left -= 1;
                if *left == 0 {
                    self.live.remove(d);
                }
            }
        }

        if let Some(nexts) = self.dependents.get(&n) {
            for v in nexts {
                if let Some(deg) = self.in_degree.get_mut(v) {
                    *deg -= 1;
                    if *deg == 0 {
                        self.ready.push_front(*v);
                    }
                }
            }
        }
        Some(n)
    }

    pub fn stats(&self) -> FrontierStats {
        FrontierStats {
            max_frontier_size: self.max_frontier,
            steps: self.steps,
        }
    }
}

/// Maximum number of simultaneously live nodes for `(node, deps)` entries.
pub fn compute_max_frontier(order: &[(NodeId, Vec<NodeId>)]) -> usize {
    if order.is_empty() {
        return 0;
    }
    let nodes: Vec<NodeId> = order.iter().map(|(n, _)| *n).collect();
    let edges: Vec<(NodeId, NodeId)> = order
        .iter()
        .flat_map(|(n, deps)| deps.iter().map(move |d| (*d, *n)))
        .collect();

    let mut tracker = FrontierTracker::new(&nodes, &edges);
    while tracker.step().is_some() {}
    tracker.stats().max_frontier_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u64) -> NodeId {
        NodeId::new(i)
    }

    #[test]
    fn chain_keeps_two_live() {
        let order = vec![(id(0), vec![]), (id(1), vec![id(0)]), (id(2), vec![id(1)])];
        assert_eq!(compute_max_frontier(&order), 2);
    }

    #[test]
    fn pair_combine() {
        let order = vec![
            (id(0), vec![]),
            (id(1), vec![]),
            (id(2), vec![id(0), id(1)]),
        ];
        // both inputs plus the combined output
        assert_eq!(compute_max_frontier(&order), 3);
    }

    #[test]
    fn steps_visit_every_node() {
        let nodes = [id(0), id(1), id(2)];
        let mut t = FrontierTracker::new(&nodes, &[(id(0), id(2)), (id(1), id(2))]);
        while t.step().is_some() {}
        assert_eq!(t.stats().steps, 3);
    }
}
