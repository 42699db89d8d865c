//! Task functions, content keys and values.
//!
//! A task is a pure function plus the keys of its inputs. Its key is the
//! blake3 hash of `{name, version, params, inputs}`, so two submissions of
//! the same function over the same inputs are the same task.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use hepflow_core::hash::{hash_serde, Hash256};
use hepflow_core::range::ChunkRange;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use hepflow_io::{write_partitioned, RecordLoader, SinkOptions, WriteResult};
use hepflow_ops::{Aggregator, Partial, Transform};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::runtime::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub Hash256);

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.short())
    }
}

/// Destination and layout of a sink write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSpec {
    pub destination: PathBuf,
    /// Columns written, in order. Input batches are projected onto it.
    pub schema: Schema,
    pub options: SinkOptions,
}

#[derive(Debug, Clone)]
pub enum TaskFn {
    /// Read one chunk of a source. No inputs.
    Load {
        loader: Arc<RecordLoader>,
        range: ChunkRange,
    },
    /// One batch → derived batch.
    Transform(Arc<dyn Transform>),
    /// One batch → partial.
    Accumulate(Arc<dyn Aggregator>),
    /// Two or more partials of one domain → partial.
    Combine,
    /// The aggregator's neutral partial. No inputs.
    Identity(Arc<dyn Aggregator>),
    /// Batches (in order) → partitioned dataset on disk.
    Write(Arc<WriteSpec>),
}

impl TaskFn {
    pub fn name(&self) -> &'static str {
        match self {
            TaskFn::Load { .. } => "load",
            TaskFn::Transform(t) => t.name(),
            TaskFn::Accumulate(_) => "accumulate",
            TaskFn::Combine => "combine",
            TaskFn::Identity(_) => "identity",
            TaskFn::Write(_) => "write",
        }
    }

    fn version(&self) -> u32 {
        match self {
            TaskFn::Transform(t) => t.version(),
            TaskFn::Accumulate(a) | TaskFn::Identity(a) => a.version(),
            _ => 1,
        }
    }

    fn params(&self) -> serde_json::Value {
        match self {
            TaskFn::Load { loader, range } => json!({
                "url": loader.source().url(),
                "columns": loader.columns(),
                "start": range.start,
                "stop": range.stop,
            }),
            TaskFn::Transform(t) => t.params(),
            TaskFn::Accumulate(a) | TaskFn::Identity(a) => {
                json!({ "kind": a.kind(), "params": a.params() })
            }
            TaskFn::Combine => serde_json::Value::Null,
            TaskFn::Write(w) => json!({
                "destination": w.destination.display().to_string(),
                "columns": w.schema.names(),
                "format": w.options.format,
                "partitions": w.options.partitions,
                "strategy": w.options.strategy,
            }),
        }
    }

    /// Content key of this function applied to `inputs`.
    pub fn key(&self, inputs: &[TaskKey]) -> Result<TaskKey, ExecError> {
        let identity = json!({
            "name": self.name(),
            "version": self.version(),
            "params": self.params(),
            "inputs": inputs,
        });
        Ok(TaskKey(hash_serde(&identity)?))
    }

    /// Input arity check, done at submission.
    pub(crate) fn check_arity(&self, inputs: usize) -> Result<(), ExecError> {
        let ok = match self {
            TaskFn::Load { .. } | TaskFn::Identity(_) => inputs == 0,
            TaskFn::Transform(_) | TaskFn::Accumulate(_) => inputs == 1,
            TaskFn::Combine => inputs >= 1,
            TaskFn::Write(_) => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ExecError::Invalid(format!(
                "task '{}' cannot take {inputs} input(s)",
                self.name()
            )))
        }
    }

    /// Run the function. Blocking; the scheduler calls it off the async threads.
    pub(crate) fn run(&self, inputs: &[TaskValue]) -> Result<TaskValue, ExecError> {
        match self {
            TaskFn::Load { loader, range } => Ok(TaskValue::batch(loader.load(range)?)),
            TaskFn::Transform(t) => Ok(TaskValue::batch(t.apply(single_batch(self, inputs)?)?)),
            TaskFn::Accumulate(a) => Ok(TaskValue::partial(a.accumulate(single_batch(self, inputs)?)?)),
            TaskFn::Combine => {
                let parts = inputs
                    .iter()
                    .map(|v| v.as_partial().cloned().ok_or_else(|| wrong_input(self, v)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TaskValue::partial(Partial::combine_all(&parts)?))
            }
            TaskFn::Identity(a) => Ok(TaskValue::partial(a.identity())),
            TaskFn::Write(w) => {
                let batches = inputs
                    .iter()
                    .map(|v| v.as_batch().cloned().ok_or_else(|| wrong_input(self, v)))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = write_partitioned(&batches, &w.schema, &w.destination, &w.options)?;
                Ok(TaskValue::Written(Arc::new(result)))
            }
        }
    }
}

fn single_batch<'a>(func: &TaskFn, inputs: &'a [TaskValue]) -> Result<&'a RecordBatch, ExecError> {
    match inputs {
        [v] => v.as_batch().ok_or_else(|| wrong_input(func, v)),
        _ => Err(ExecError::Invalid(format!(
            "task '{}' expects one input, got {}",
            func.name(),
            inputs.len()
        ))),
    }
}

fn wrong_input(func: &TaskFn, got: &TaskValue) -> ExecError {
    ExecError::Invalid(format!("task '{}' got a {} input", func.name(), got.kind()))
}

/// Result of a task. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValue {
    Batch(Arc<RecordBatch>),
    Partial(Arc<Partial>),
    Written(Arc<WriteResult>),
}

impl TaskValue {
    pub fn batch(b: RecordBatch) -> Self {
        TaskValue::Batch(Arc::new(b))
    }

    pub fn partial(p: Partial) -> Self {
        TaskValue::Partial(Arc::new(p))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskValue::Batch(_) => "batch",
            TaskValue::Partial(_) => "partial",
            TaskValue::Written(_) => "write result",
        }
    }

    pub fn as_batch(&self) -> Option<&RecordBatch> {
        match self {
            TaskValue::Batch(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_partial(&self) -> Option<&Partial> {
        match self {
            TaskValue::Partial(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_written(&self) -> Option<&WriteResult> {
        match self {
            TaskValue::Written(w) => Some(w),
            _ => None,
        }
    }
}
