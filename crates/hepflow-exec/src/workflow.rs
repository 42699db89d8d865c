//! Workflow runner: lowers a `WorkflowSpec` onto the executor.
//!
//! Graph shape, per chunk: `load → stage 0 → … → stage k` where `k` is the
//! deepest tap any output needs. Each aggregate accumulates one partial per
//! chunk at its tap and folds them along the `ReducePlan`; the sink writes
//! every chunk's batch at its tap. All outputs are requested in one
//! `compute`, so the shared per-chunk prefix runs once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hepflow_core::config::WorkflowConfig;
use hepflow_core::dag::WorkflowSpec;
use hepflow_core::id::NodeId;
use hepflow_core::manifest::RunManifest;
use hepflow_io::{PartitionStrategy, RecordLoader, SinkOptions, SourceContext, WriteResult};
use hepflow_ops::{Histogram, Partial, RowCount};
use hepflow_planner::{lower, validate, BoundWorkflow, ChunkLayout};
use serde::Serialize;
use tracing::{debug, info};

use crate::metrics::ExecStats;
use crate::replay::{hash_chunk_plan, hash_outputs, hash_workflow};
use crate::runtime::{ExecError, Executor, TaskHandle};
use crate::task::{TaskFn, WriteSpec};

/// A validated workflow with opened sources and a chunk layout.
#[derive(Debug)]
pub struct PreparedRun {
    pub workflow: BoundWorkflow,
    pub layout: ChunkLayout,
    loaders: Vec<Arc<RecordLoader>>,
}

impl PreparedRun {
    pub fn explain(&self) -> String {
        self.layout.explain(&self.workflow)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// One result per aggregate, in declaration order.
    pub aggregates: Vec<Partial>,
    pub written: Option<WriteResult>,
    pub chunks: usize,
    pub stats: ExecStats,
    pub manifest: RunManifest,
}

impl RunReport {
    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.aggregates
            .iter()
            .filter_map(Partial::as_histogram)
            .find(|h| h.name == name)
    }

    pub fn count(&self, name: &str) -> Option<&RowCount> {
        self.aggregates
            .iter()
            .filter_map(Partial::as_count)
            .find(|c| c.name == name)
    }
}

pub struct WorkflowRunner<'a> {
    exec: &'a Executor,
    sources: &'a SourceContext,
    config: WorkflowConfig,
}

impl<'a> WorkflowRunner<'a> {
    pub fn new(exec: &'a Executor, sources: &'a SourceContext, config: WorkflowConfig) -> Self {
        Self {
            exec,
            sources,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Validate, open every source, and lay out chunks. Reads no records.
    pub fn prepare(&self, spec: &WorkflowSpec) -> Result<PreparedRun, ExecError> {
        self.config.validate()?;
        let workflow = validate(spec)?;
        let columns = spec.load_columns();

        let mut loaders = Vec::with_capacity(spec.sources.len());
        let mut counts = Vec::with_capacity(spec.sources.len());
        for src in &spec.sources {
            let source = self.sources.open(&src.url, &spec.schema)?;
            counts.push((source.id(), source.record_count()));
            loaders.push(Arc::new(RecordLoader::new(source, columns.clone())?));
        }
        let layout = lower(&workflow, &counts, &self.config)?;
        info!(
            sources = loaders.len(),
            records = layout.total_records(),
            chunks = layout.chunks.len(),
            chunk_size = layout.chunk_size,
            "workflow planned"
        );
        Ok(PreparedRun {
            workflow,
            layout,
            loaders,
        })
    }

    /// Prepare, build the task graph and compute every output.
    pub fn run(&self, spec: &WorkflowSpec) -> Result<RunReport, ExecError> {
        let started = now_millis();
        let prepared = self.prepare(spec)?;
        let before = self.exec.stats();

        let outputs = self.submit(&prepared)?;
        let mut handles = outputs.aggregates.clone();
        handles.extend(outputs.sink);
        let mut values = self.exec.compute(&handles)?.into_iter();

        let mut aggregates = Vec::with_capacity(outputs.aggregates.len());
        for _ in &outputs.aggregates {
            let partial = values
                .next()
                .and_then(|v| v.as_partial().cloned())
                .ok_or_else(|| ExecError::Invalid("aggregate did not produce a partial".into()))?;
            aggregates.push(partial);
        }
        let written = match outputs.sink {
            Some(_) => Some(
                values
                    .next()
                    .and_then(|v| v.as_written().cloned())
                    .ok_or_else(|| ExecError::Invalid("sink did not produce a write result".into()))?,
            ),
            None => None,
        };

        let stats = self.exec.stats().since(&before);
        let manifest = RunManifest::new(
            hash_workflow(spec)?,
            hash_chunk_plan(&prepared.layout.chunks)?,
            started,
        )
        .finish(now_millis(), Some(hash_outputs(&aggregates, written.as_ref())?));
        info!(%stats, duration_ms = manifest.duration_ms(), "workflow finished");

        Ok(RunReport {
            aggregates,
            written,
            chunks: prepared.layout.chunks.len(),
            stats,
            manifest,
        })
    }

    /// Submit the whole graph; returns the output handles.
    pub fn submit(&self, prepared: &PreparedRun) -> Result<OutputHandles, ExecError> {
        let wf = &prepared.workflow;
        let depth = wf.max_tap();
        let loaders: HashMap<_, _> = prepared
            .loaders
            .iter()
            .map(|l| (l.source().id(), l))
            .collect();

        // prefixes[c][i]: chunk c after i stages.
        let mut prefixes: Vec<Vec<TaskHandle>> = Vec::with_capacity(prepared.layout.chunks.len());
        for range in &prepared.layout.chunks {
            let loader = loaders
                .get(&range.source)
                .ok_or_else(|| ExecError::Invalid(format!("no loader for {}", range.source)))?;
            let mut chain = Vec::with_capacity(depth + 1);
            chain.push(self.exec.submit(
                TaskFn::Load {
                    loader: Arc::clone(loader),
                    range: *range,
                },
                &[],
            )?);
            for stage in wf.stages.iter().take(depth) {
                let input = chain[chain.len() - 1];
                chain.push(self.exec.submit(TaskFn::Transform(Arc::clone(stage)), &[input])?);
            }
            prefixes.push(chain);
        }

        let mut aggregates = Vec::with_capacity(wf.aggregates.len());
        for agg in &wf.aggregates {
            let leaves = prefixes
                .iter()
                .map(|chain| {
                    self.exec
                        .submit(TaskFn::Accumulate(Arc::clone(&agg.aggregator)), &[chain[agg.tap]])
                })
                .collect::<Result<Vec<_>, _>>()?;
            let root = self.reduce(&prepared.layout, leaves, &agg.aggregator)?;
            debug!(aggregate = agg.aggregator.name(), root = %root.key(), "aggregate submitted");
            aggregates.push(root);
        }

        let sink = match &wf.sink {
            Some(sink) => {
                let options = SinkOptions {
                    format: sink.def.format,
                    partitions: sink.def.partitions.unwrap_or(self.config.partitions),
                    strategy: match &sink.def.partition_by {
                        Some(keys) => PartitionStrategy::Hash { keys: keys.clone() },
                        None => PartitionStrategy::Contiguous,
                    },
                };
                let spec = WriteSpec {
                    destination: PathBuf::from(&sink.def.destination),
                    schema: sink.schema.clone(),
                    options,
                };
                let inputs: Vec<TaskHandle> = prefixes.iter().map(|chain| chain[sink.tap]).collect();
                Some(self.exec.submit(TaskFn::Write(Arc::new(spec)), &inputs)?)
            }
            None => None,
        };

        Ok(OutputHandles { aggregates, sink })
    }

    fn reduce(
        &self,
        layout: &ChunkLayout,
        leaves: Vec<TaskHandle>,
        aggregator: &Arc<dyn hepflow_ops::Aggregator>,
    ) -> Result<TaskHandle, ExecError> {
        let plan = &layout.reduce;
        let mut nodes: HashMap<NodeId, TaskHandle> = leaves
            .into_iter()
            .enumerate()
            .map(|(i, h)| (NodeId::new(i as u64), h))
            .collect();
        for combine in &plan.combines {
            let inputs = combine
                .inputs
                .iter()
                .map(|id| {
                    nodes
                        .get(id)
                        .copied()
                        .ok_or_else(|| ExecError::Invalid(format!("reduction input {id} missing")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            nodes.insert(combine.id, self.exec.submit(TaskFn::Combine, &inputs)?);
        }
        match plan.root {
            Some(root) => nodes
                .get(&root)
                .copied()
                .ok_or_else(|| ExecError::Invalid(format!("reduction root {root} missing"))),
            None => self.exec.submit(TaskFn::Identity(Arc::clone(aggregator)), &[]),
        }
    }
}

/// Output handles of a submitted workflow.
#[derive(Debug, Clone)]
pub struct OutputHandles {
    /// Reduced aggregate per declared aggregate, in order.
    pub aggregates: Vec<TaskHandle>,
    pub sink: Option<TaskHandle>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
