//! Parallel evaluation of one request against the task graph.
//!
//! A request is the closure of its targets: every task they transitively
//! need, stopping at persisted results. Tasks start once all inputs are
//! available, run on the blocking pool under a shared semaphore, and their
//! values are dropped as soon as the last consumer has started.
//!
//! A failed task fails every task downstream of it; tasks that do not
//! depend on it keep running.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::metrics::Counters;
use crate::runtime::{ExecError, Node, PersistedValue};
use crate::task::{TaskKey, TaskValue};

/// Value or failure of one requested task.
pub type Outcome = Result<TaskValue, Arc<ExecError>>;

pub(crate) struct Request {
    nodes: HashMap<TaskKey, Arc<Node>>,
    persisted: HashMap<TaskKey, PersistedValue>,
    targets: Vec<TaskKey>,
}

impl Request {
    /// Collect the closure of `targets`. `fresh` is evaluated even if it is
    /// persisted (used when persisting it in the first place).
    pub(crate) fn build(
        graph: &HashMap<TaskKey, Arc<Node>>,
        persisted: &HashMap<TaskKey, PersistedValue>,
        targets: &[TaskKey],
        fresh: Option<TaskKey>,
    ) -> Result<Self, ExecError> {
        let mut nodes = HashMap::new();
        let mut reused = HashMap::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<TaskKey> = targets.to_vec();
        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                continue;
            }
            if Some(key) != fresh {
                if let Some(value) = persisted.get(&key) {
                    reused.insert(key, value.clone());
                    continue;
                }
            }
            let node = graph
                .get(&key)
                .ok_or_else(|| ExecError::Invalid(format!("unknown task [{key}]")))?;
            stack.extend(node.inputs.iter().copied());
            nodes.insert(key, Arc::clone(node));
        }
        Ok(Self {
            nodes,
            persisted: reused,
            targets: targets.to_vec(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len() + self.persisted.len()
    }
}

struct State {
    /// Unfinished inputs per node (counting repeated inputs).
    pending: HashMap<TaskKey, usize>,
    dependents: HashMap<TaskKey, Vec<TaskKey>>,
    /// Consumers that have not started yet, plus one per target occurrence.
    uses: HashMap<TaskKey, usize>,
    done: HashMap<TaskKey, Outcome>,
    settled: HashSet<TaskKey>,
}

impl State {
    fn new(req: &Request) -> Self {
        let mut pending = HashMap::new();
        let mut dependents: HashMap<TaskKey, Vec<TaskKey>> = HashMap::new();
        let mut uses: HashMap<TaskKey, usize> = HashMap::new();
        for (key, node) in &req.nodes {
            pending.insert(*key, node.inputs.len());
            for input in &node.inputs {
                dependents.entry(*input).or_default().push(*key);
                *uses.entry(*input).or_default() += 1;
            }
        }
        for t in &req.targets {
            *uses.entry(*t).or_default() += 1;
        }
        Self {
            pending,
            dependents,
            uses,
            done: HashMap::new(),
            settled: HashSet::new(),
        }
    }

    /// Take the inputs of `node`, releasing values nobody else needs.
    fn take_inputs(&mut self, node: &Node) -> Vec<TaskValue> {
        let mut values = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            if let Some(Ok(v)) = self.done.get(input) {
                values.push(v.clone());
            }
            if let Some(n) = self.uses.get_mut(input) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    self.done.remove(input);
                    trace!(task = %input, "released intermediate");
                }
            }
        }
        values
    }

    /// Mark everything downstream of a failed `key` as failed.
    fn fail_downstream(&mut self, req: &Request, key: TaskKey, cause: &Arc<ExecError>, counters: &Counters) {
        let mut work = vec![(key, Arc::clone(cause))];
        while let Some((failed, cause)) = work.pop() {
            let Some(deps) = self.dependents.get(&failed).cloned() else {
                continue;
            };
            for d in deps {
                if !self.settled.insert(d) {
                    continue;
                }
                let name = req.nodes.get(&d).map(|n| n.func.name()).unwrap_or("task");
                let err = Arc::new(ExecError::Upstream {
                    name,
                    key: d,
                    input: failed,
                    source: Arc::clone(&cause),
                });
                counters.failed();
                debug!(task = name, key = %d, input = %failed, "skipped: input failed");
                self.done.insert(d, Err(Arc::clone(&err)));
                work.push((d, err));
            }
        }
    }
}

/// Evaluate `req`; one outcome per target, in target order.
pub(crate) async fn run(req: Request, limit: Arc<Semaphore>, counters: Arc<Counters>) -> Vec<Outcome> {
    let mut state = State::new(&req);
    let mut running: JoinSet<(TaskKey, Outcome)> = JoinSet::new();

    for (key, value) in &req.persisted {
        let (key, value) = (*key, value.clone());
        state.settled.insert(key);
        trace!(task = %key, "awaiting persisted result");
        running.spawn(async move { (key, value.await) });
    }

    let ready: Vec<TaskKey> = state
        .pending
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    for key in ready {
        spawn_node(&req, &mut state, &mut running, key, &limit);
    }

    while let Some(joined) = running.join_next().await {
        let (key, outcome) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "scheduler task aborted");
                continue;
            }
        };
        match &outcome {
            Ok(_) if req.nodes.contains_key(&key) => {
                counters.executed();
                debug!(task = %key, "task finished");
            }
            Ok(_) => {
                counters.reused();
                debug!(task = %key, "persisted result reused");
            }
            Err(e) => {
                if req.nodes.contains_key(&key) {
                    counters.failed();
                }
                warn!(task = %key, error = %e, "task failed");
                state.fail_downstream(&req, key, e, &counters);
            }
        }
        let succeeded = outcome.is_ok();
        state.done.insert(key, outcome);
        if !succeeded {
            continue;
        }
        let deps = state.dependents.get(&key).cloned().unwrap_or_default();
        for d in deps {
            let Some(n) = state.pending.get_mut(&d) else {
                continue;
            };
            *n = n.saturating_sub(1);
            if *n == 0 && !state.settled.contains(&d) {
                spawn_node(&req, &mut state, &mut running, d, &limit);
            }
        }
    }

    req.targets
        .iter()
        .map(|t| {
            state.done.get(t).cloned().unwrap_or_else(|| {
                Err(Arc::new(ExecError::Invalid(format!("task [{t}] did not complete"))))
            })
        })
        .collect()
}

fn spawn_node(
    req: &Request,
    state: &mut State,
    running: &mut JoinSet<(TaskKey, Outcome)>,
    key: TaskKey,
    limit: &Arc<Semaphore>,
) {
    let Some(node) = req.nodes.get(&key).cloned() else {
        return;
    };
    state.settled.insert(key);
    let inputs = state.take_inputs(&node);
    let limit = Arc::clone(limit);
    running.spawn(async move {
        let name = node.func.name();
        let outcome = match limit.acquire_owned().await {
            Ok(permit) => {
                trace!(task = name, key = %key, "task started");
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    node.func.run(&inputs)
                })
                .await;
                match joined {
                    Ok(result) => result,
                    Err(e) => Err(ExecError::Join(e.to_string())),
                }
            }
            Err(e) => Err(ExecError::Join(e.to_string())),
        };
        let outcome = outcome.map_err(|e| {
            Arc::new(ExecError::Task {
                name,
                key,
                source: Arc::new(e),
            })
        });
        (key, outcome)
    });
}
