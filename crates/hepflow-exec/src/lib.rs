#![forbid(unsafe_code)]
//! hepflow-exec: content-addressed task graph, parallel executor, and the
//! workflow runner that lowers a `WorkflowSpec` onto it.
//!
//! - `task`: task functions, content keys and task values.
//! - `runtime`: the `Executor` (`submit` / `persist` / `compute`).
//! - `scheduler`: dependency-counting parallel evaluation of one request.
//! - `workflow`: sources → chunks → stages → taps → tree reduction → sink.
//! - `replay`: stable hashes for run manifests.

pub mod metrics;
pub mod replay;
pub mod runtime;
pub mod scheduler;
pub mod task;
pub mod workflow;

pub use metrics::ExecStats;
pub use runtime::{ExecError, Executor, TaskHandle};
pub use scheduler::Outcome;
pub use task::{TaskFn, TaskKey, TaskValue, WriteSpec};
pub use workflow::{OutputHandles, PreparedRun, RunReport, WorkflowRunner};
