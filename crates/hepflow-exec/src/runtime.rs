//! The executor: a content-addressed task graph plus a bounded worker pool.
//!
//! - `submit` registers a task and returns its handle; submitting the same
//!   function over the same inputs again returns the same handle.
//! - `persist` starts computing a task in the background and retains the
//!   result; later computes reuse it instead of re-running its subgraph.
//! - `compute` blocks until every requested value is available. Tasks shared
//!   by several requested handles run once.
//!
//! The executor owns its tokio runtime, so `compute` must not be called from
//! inside another async runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use hepflow_core::config::WorkflowConfig;
use hepflow_ops::OpError;
use hepflow_planner::PlanError;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::metrics::{Counters, ExecStats};
use crate::scheduler::{self, Outcome, Request};
use crate::task::{TaskFn, TaskKey, TaskValue};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Io(#[from] hepflow_io::Error),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Core(#[from] hepflow_core::Error),

    #[error("invalid task graph: {0}")]
    Invalid(String),

    #[error("task '{name}' [{key}] failed: {source}")]
    Task {
        name: &'static str,
        key: TaskKey,
        source: Arc<ExecError>,
    },

    #[error("task '{name}' [{key}] not run: input [{input}] failed")]
    Upstream {
        name: &'static str,
        key: TaskKey,
        input: TaskKey,
        source: Arc<ExecError>,
    },

    #[error("{failed} of {requested} requested task(s) failed: {source}")]
    Compute {
        requested: usize,
        failed: usize,
        source: Arc<ExecError>,
    },

    #[error("task aborted: {0}")]
    Join(String),

    #[error("executor runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl ExecError {
    /// The error that started a failure chain.
    pub fn root_cause(&self) -> &ExecError {
        match self {
            ExecError::Task { source, .. }
            | ExecError::Upstream { source, .. }
            | ExecError::Compute { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Reference to a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    key: TaskKey,
    name: &'static str,
}

impl TaskHandle {
    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) func: TaskFn,
    pub(crate) inputs: Vec<TaskKey>,
}

pub(crate) type PersistedValue = Shared<BoxFuture<'static, Outcome>>;

pub struct Executor {
    runtime: tokio::runtime::Runtime,
    limit: Arc<Semaphore>,
    max_parallel: usize,
    graph: Mutex<HashMap<TaskKey, Arc<Node>>>,
    persisted: Mutex<HashMap<TaskKey, PersistedValue>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("max_parallel", &self.max_parallel)
            .field("tasks", &self.task_count())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Executor {
    /// At most `max_parallel` task functions run at once.
    pub fn new(max_parallel: usize) -> Result<Self, ExecError> {
        let max_parallel = max_parallel.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(max_parallel)
            .max_blocking_threads(max_parallel)
            .thread_name("hepflow-exec")
            .enable_all()
            .build()
            .map_err(ExecError::Runtime)?;
        Ok(Self {
            runtime,
            limit: Arc::new(Semaphore::new(max_parallel)),
            max_parallel,
            graph: Mutex::new(HashMap::new()),
            persisted: Mutex::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn from_config(cfg: &WorkflowConfig) -> Result<Self, ExecError> {
        Self::new(cfg.max_parallel_tasks)
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Register `func` over `inputs`. Idempotent per content key.
    pub fn submit(&self, func: TaskFn, inputs: &[TaskHandle]) -> Result<TaskHandle, ExecError> {
        func.check_arity(inputs.len())?;
        let input_keys: Vec<TaskKey> = inputs.iter().map(|h| h.key).collect();
        let key = func.key(&input_keys)?;
        let name = func.name();

        let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(missing) = input_keys.iter().find(|k| !graph.contains_key(k)) {
            return Err(ExecError::Invalid(format!(
                "input [{missing}] of '{name}' was not submitted to this executor"
            )));
        }
        if graph.contains_key(&key) {
            self.counters.deduplicated();
            debug!(task = name, key = %key, "deduplicated submission");
        } else {
            graph.insert(
                key,
                Arc::new(Node {
                    func,
                    inputs: input_keys,
                }),
            );
        }
        Ok(TaskHandle { key, name })
    }

    /// Compute `handle` in the background and retain its value.
    pub fn persist(&self, handle: &TaskHandle) -> Result<TaskHandle, ExecError> {
        // Lock order everywhere: graph, then persisted.
        let graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        let mut persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
        if persisted.contains_key(&handle.key) {
            return Ok(*handle);
        }
        let request = Request::build(&graph, &persisted, &[handle.key], Some(handle.key))?;
        drop(graph);
        debug!(task = handle.name, key = %handle.key, tasks = request.len(), "persisting");
        let value: PersistedValue = scheduler::run(request, Arc::clone(&self.limit), Arc::clone(&self.counters))
            .map(|mut outcomes| {
                outcomes
                    .pop()
                    .unwrap_or_else(|| Err(Arc::new(ExecError::Invalid("empty persist".into()))))
            })
            .boxed()
            .shared();
        // Drive it now; later computes await the same shared future.
        self.runtime.spawn(value.clone());
        persisted.insert(handle.key, value);
        Ok(*handle)
    }

    pub fn is_persisted(&self, handle: &TaskHandle) -> bool {
        self.persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle.key)
    }

    /// Drop a retained value. Returns whether it was persisted.
    pub fn unpersist(&self, handle: &TaskHandle) -> bool {
        self.persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.key)
            .is_some()
    }

    /// Materialize every handle; one result per handle, in order.
    pub fn compute_each(&self, handles: &[TaskHandle]) -> Result<Vec<Outcome>, ExecError> {
        let keys: Vec<TaskKey> = handles.iter().map(|h| h.key).collect();
        let request = {
            let graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
            let persisted = self.persisted.lock().unwrap_or_else(PoisonError::into_inner);
            Request::build(&graph, &persisted, &keys, None)?
        };
        let before = self.stats();
        info!(requested = handles.len(), tasks = request.len(), "compute");
        let outcomes = self.runtime.block_on(scheduler::run(
            request,
            Arc::clone(&self.limit),
            Arc::clone(&self.counters),
        ));
        info!(stats = %self.stats().since(&before), "compute finished");
        Ok(outcomes)
    }

    /// Materialize every handle; fails if any requested task failed.
    pub fn compute(&self, handles: &[TaskHandle]) -> Result<Vec<TaskValue>, ExecError> {
        let outcomes = self.compute_each(handles)?;
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        let mut values = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(v) => values.push(v),
                Err(source) => {
                    return Err(ExecError::Compute {
                        requested: handles.len(),
                        failed,
                        source,
                    })
                }
            }
        }
        Ok(values)
    }

    /// Cumulative counters since the executor was created.
    pub fn stats(&self) -> ExecStats {
        self.counters.snapshot()
    }

    /// Distinct tasks submitted so far.
    pub fn task_count(&self) -> usize {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::id::SourceId;
    use hepflow_core::range::ChunkRange;
    use hepflow_core::schema::{DataType, Field, Schema};
    use hepflow_core::types::{Column, RecordBatch, Scalar};
    use hepflow_io::{MemoryTable, RecordLoader, SourceContext};
    use hepflow_ops::filter::Filter;
    use hepflow_ops::{CountAggregator, Transform};

    fn loader(counts: &[i32]) -> Arc<RecordLoader> {
        let schema = Schema::new(vec![Field::new("nMuon", DataType::Int32, false)]);
        let batch = RecordBatch::new(vec![Column::new(
            "nMuon",
            counts.iter().map(|c| Scalar::I32(*c)).collect(),
        )])
        .unwrap();
        let ctx = SourceContext::new();
        ctx.register("events", MemoryTable::new(schema.clone(), batch).unwrap())
            .unwrap();
        let source = ctx.open("memory://events", &schema).unwrap();
        Arc::new(RecordLoader::new(source, vec!["nMuon".into()]).unwrap())
    }

    fn load(exec: &Executor, loader: &Arc<RecordLoader>, start: u64, stop: u64) -> TaskHandle {
        let range = ChunkRange::new(loader.source().id(), start, stop).unwrap();
        exec.submit(
            TaskFn::Load {
                loader: Arc::clone(loader),
                range,
            },
            &[],
        )
        .unwrap()
    }

    fn filter(expr: &str) -> TaskFn {
        let f: Arc<dyn Transform> = Arc::new(Filter::new(expr).unwrap());
        TaskFn::Transform(f)
    }

    #[test]
    fn shared_upstream_runs_once() {
        let exec = Executor::new(2).unwrap();
        let l = loader(&[1, 2, 0, 2, 3]);
        let raw = load(&exec, &l, 0, 5);
        let a = exec.submit(filter("nMuon == 2"), &[raw]).unwrap();
        let b = exec.submit(filter("nMuon==2"), &[raw]).unwrap();
        assert_eq!(a, b);

        let count = Arc::new(CountAggregator { name: "n".into() });
        let n = exec.submit(TaskFn::Accumulate(count), &[a]).unwrap();
        let out = exec.compute(&[a, n]).unwrap();

        let batch = out[0].as_batch().unwrap();
        assert_eq!(batch.column("nMuon").unwrap().values, vec![Scalar::I32(2), Scalar::I32(2)]);
        assert_eq!(out[1].as_partial().unwrap().as_count().unwrap().rows, 2);
        let stats = exec.stats();
        assert_eq!(stats.executed, 3);
        assert_eq!(stats.deduplicated, 1);
        assert_eq!(exec.task_count(), 3);
    }

    #[test]
    fn persisted_results_are_reused() {
        let exec = Executor::new(2).unwrap();
        let l = loader(&[1, 2, 3]);
        let raw = load(&exec, &l, 0, 3);
        let kept = exec.persist(&exec.submit(filter("nMuon > 1"), &[raw]).unwrap()).unwrap();
        assert!(exec.is_persisted(&kept));

        let first = exec.compute(&[kept]).unwrap();
        let executed = exec.stats().executed;
        let second = exec.compute(&[kept]).unwrap();
        assert_eq!(first, second);
        assert_eq!(exec.stats().executed, executed);
        assert_eq!(exec.stats().reused, 2);

        assert!(exec.unpersist(&kept));
        exec.compute(&[kept]).unwrap();
        assert_eq!(exec.stats().executed, executed + 2);
    }

    #[test]
    fn failures_stay_downstream() {
        let exec = Executor::new(2).unwrap();
        let l = loader(&[1, 2, 3, 4]);
        let good = load(&exec, &l, 0, 2);
        // Out of bounds for a 4-record source: fails at load time.
        let bad = exec
            .submit(
                TaskFn::Load {
                    loader: Arc::clone(&l),
                    range: ChunkRange { source: SourceId::new(0), start: 2, stop: 9 },
                },
                &[],
            )
            .unwrap();
        let bad_filtered = exec.submit(filter("nMuon > 0"), &[bad]).unwrap();

        let outcomes = exec.compute_each(&[good, bad_filtered]).unwrap();
        assert!(outcomes[0].is_ok());
        let err = outcomes[1].as_ref().unwrap_err();
        assert!(matches!(err.as_ref(), ExecError::Upstream { .. }));
        assert!(matches!(err.root_cause(), ExecError::Io(_)));
        assert_eq!(exec.stats().failed, 2);

        let err = exec.compute(&[good, bad_filtered]).unwrap_err();
        assert!(err.to_string().contains("1 of 2"), "{err}");
    }

    #[test]
    fn persist_and_compute_from_two_threads() {
        let exec = Arc::new(Executor::new(2).unwrap());
        let l = loader(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let handles: Arc<Vec<TaskHandle>> =
            Arc::new((0..8).map(|i| load(&exec, &l, i, i + 1)).collect());
        let (done, finished) = std::sync::mpsc::channel();

        let (e, hs, tx) = (Arc::clone(&exec), Arc::clone(&handles), done.clone());
        std::thread::spawn(move || {
            for _ in 0..25 {
                for h in hs.iter() {
                    e.persist(h).unwrap();
                    e.unpersist(h);
                }
            }
            tx.send("persist").unwrap();
        });
        let (e, hs, tx) = (Arc::clone(&exec), Arc::clone(&handles), done);
        std::thread::spawn(move || {
            for _ in 0..200 {
                let out = e.compute_each(&hs[..1]).unwrap();
                assert!(out[0].is_ok());
            }
            tx.send("compute").unwrap();
        });

        for _ in 0..2 {
            finished
                .recv_timeout(std::time::Duration::from_secs(60))
                .expect("persist and compute_each both finish");
        }
    }

    #[test]
    fn failed_persisted_results_are_not_counted_as_reused() {
        let exec = Executor::new(1).unwrap();
        let l = loader(&[1, 2]);
        let bad = exec
            .submit(
                TaskFn::Load {
                    loader: Arc::clone(&l),
                    range: ChunkRange { source: SourceId::new(0), start: 0, stop: 5 },
                },
                &[],
            )
            .unwrap();
        exec.persist(&bad).unwrap();

        let outcomes = exec.compute_each(&[bad]).unwrap();
        assert!(outcomes[0].is_err());
        assert_eq!(exec.stats().reused, 0);
        assert_eq!(exec.stats().failed, 1);
    }

    #[test]
    fn unknown_inputs_are_rejected() {
        let exec = Executor::new(1).unwrap();
        let other = Executor::new(1).unwrap();
        let l = loader(&[1]);
        let foreign = load(&other, &l, 0, 1);
        assert!(matches!(
            exec.submit(filter("nMuon > 0"), &[foreign]),
            Err(ExecError::Invalid(_))
        ));
    }
}
