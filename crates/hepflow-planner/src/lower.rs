//! Lowering: bound workflow + record counts → chunk ranges and the shape of
//! the reduction tree every aggregate is folded with.

use std::fmt::Write as _;

use hepflow_core::config::WorkflowConfig;
use hepflow_core::id::SourceId;
use hepflow_core::range::ChunkRange;
use hepflow_tree::{plan_chunks, ReducePlan, WorkEstimate};
use serde::{Deserialize, Serialize};

use crate::cost::{estimate_work, resolve_chunk_size};
use crate::rules::BoundWorkflow;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkLayout {
    pub chunk_size: u64,
    /// Whether `chunk_size` came from configuration (vs. the cost model).
    pub configured: bool,
    /// `(source, record_count)` in workflow order.
    pub sources: Vec<(SourceId, u64)>,
    /// All chunks, source by source, each source's ranges in order.
    pub chunks: Vec<ChunkRange>,
    /// Reduction over one partial per chunk.
    pub reduce: ReducePlan,
    pub estimate: WorkEstimate,
}

impl ChunkLayout {
    pub fn chunks_of(&self, source: SourceId) -> impl Iterator<Item = &ChunkRange> {
        self.chunks.iter().filter(move |c| c.source == source)
    }

    pub fn total_records(&self) -> u64 {
        self.sources.iter().map(|(_, n)| n).sum()
    }

    /// Human-readable plan summary (`hepflow explain`).
    pub fn explain(&self, wf: &BoundWorkflow) -> String {
        let mut s = String::new();
        let name = wf.spec.name.as_deref().unwrap_or("<unnamed>");
        let _ = writeln!(s, "workflow: {name}");
        let _ = writeln!(
            s,
            "sources: {} ({} records)",
            self.sources.len(),
            self.total_records()
        );
        for ((id, count), src) in self.sources.iter().zip(&wf.spec.sources) {
            let _ = writeln!(
                s,
                "  {id} {}: {count} records -> {} chunks",
                src.url,
                self.chunks_of(*id).count()
            );
        }
        let origin = if self.configured {
            "configured"
        } else {
            "derived from memory cap"
        };
        let _ = writeln!(s, "chunk size: {} ({origin})", self.chunk_size);
        let _ = writeln!(s, "columns: {}", wf.load_schema.names().join(", "));
        let _ = writeln!(s, "stages:");
        for (i, (stage, step)) in wf.stages.iter().zip(&wf.spec.steps).enumerate() {
            let id = step.id.as_deref().map(|id| format!(" '{id}'")).unwrap_or_default();
            let _ = writeln!(
                s,
                "  [{i}] {}{id}: {} -> {} columns",
                stage.name(),
                stage.params(),
                wf.schemas[i + 1].fields.len()
            );
        }
        let _ = writeln!(s, "aggregates:");
        for a in &wf.aggregates {
            let _ = writeln!(
                s,
                "  {} ({}) after {} stage(s)",
                a.aggregator.name(),
                a.aggregator.kind(),
                a.tap
            );
        }
        let _ = writeln!(
            s,
            "reduction: {} partials, group size {}, {} levels, {} combines, peak live partials {}",
            self.reduce.leaves,
            self.reduce.group_size,
            self.reduce.depth(),
            self.reduce.combines.len(),
            self.reduce.peak_live()
        );
        if let Some(sink) = &wf.sink {
            let _ = writeln!(
                s,
                "sink: {} ({:?}, {} partition(s){}) after {} stage(s), columns: {}",
                sink.def.destination,
                sink.def.format,
                sink.def.partitions.map(|p| p.to_string()).unwrap_or_else(|| "default".into()),
                sink.def
                    .partition_by
                    .as_ref()
                    .map(|k| format!(", hash on {}", k.join("+")))
                    .unwrap_or_default(),
                sink.tap,
                sink.columns.join(", ")
            );
        }
        s
    }
}

/// Lower a bound workflow given each source's id and record count.
pub fn lower(wf: &BoundWorkflow, sources: &[(SourceId, u64)], cfg: &WorkflowConfig) -> Result<ChunkLayout> {
    let counts: Vec<u64> = sources.iter().map(|(_, n)| *n).collect();
    let estimate = estimate_work(wf, &counts, cfg.max_parallel_tasks);
    let chunk_size = resolve_chunk_size(cfg, &estimate)?;

    let mut chunks = Vec::new();
    for &(id, total) in sources {
        let ranges = plan_chunks(id, total, chunk_size)?;
        debug_assert!({
            hepflow_tree::verify::assert_partitions(&ranges, total);
            true
        });
        chunks.extend(ranges);
    }

    let reduce = ReducePlan::new(chunks.len(), cfg.reduce_group_size)?;
    debug_assert!({
        hepflow_tree::verify::assert_topological(&reduce);
        hepflow_tree::verify::assert_bounded_fanin(&reduce, cfg.reduce_group_size);
        true
    });

    Ok(ChunkLayout {
        chunk_size,
        configured: cfg.chunk_size.is_some(),
        sources: sources.to_vec(),
        chunks,
        reduce,
        estimate,
    })
}
