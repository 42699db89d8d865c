//! Coarse work estimation and chunk-size resolution.
//!
//! Row width is the loaded schema's estimated width plus the largest
//! per-row footprint of any stage (stages run one after another on a chunk).

use hepflow_core::config::WorkflowConfig;
use hepflow_tree::{choose_chunk_size, WorkEstimate};

use crate::rules::BoundWorkflow;
use crate::{PlanError, Result};

pub fn estimate_work(wf: &BoundWorkflow, record_counts: &[u64], concurrency: usize) -> WorkEstimate {
    let stage_bytes = wf
        .footprints
        .iter()
        .map(|f| f.bytes_per_row)
        .max()
        .unwrap_or(0);
    let row_bytes = wf.load_schema.estimated_row_bytes().saturating_add(stage_bytes);
    WorkEstimate::from_sources(record_counts, row_bytes, concurrency)
}

/// Configured chunk size, or one derived from the memory cap.
pub fn resolve_chunk_size(cfg: &WorkflowConfig, work: &WorkEstimate) -> Result<u64> {
    match cfg.chunk_size {
        Some(0) => Err(PlanError::Invalid("chunk_size must be > 0".into())),
        Some(n) => Ok(n),
        None => Ok(choose_chunk_size(cfg.mem_cap_bytes, work).rows_per_chunk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::yaml::parse_yaml_workflow;
    use crate::rules::validate;

    fn bound() -> BoundWorkflow {
        let src = "sources: [memory://a]\nschema: [{ name: x, type: Float64 }, { name: y, type: Int32 }]\naggregates: [{ name: n, kind: count }]\n";
        validate(&parse_yaml_workflow(src).unwrap().spec).unwrap()
    }

    #[test]
    fn explicit_chunk_size_wins() {
        let wf = bound();
        let work = estimate_work(&wf, &[1000], 2);
        let cfg = WorkflowConfig {
            chunk_size: Some(400),
            ..WorkflowConfig::default()
        };
        assert_eq!(resolve_chunk_size(&cfg, &work).unwrap(), 400);
        let zero = WorkflowConfig {
            chunk_size: Some(0),
            ..WorkflowConfig::default()
        };
        assert!(resolve_chunk_size(&zero, &work).is_err());
    }

    #[test]
    fn derived_chunk_size_respects_memory_cap() {
        let wf = bound();
        let work = estimate_work(&wf, &[1_000_000], 1);
        assert_eq!(work.total_rows, 1_000_000);
        assert_eq!(work.total_bytes, 12_000_000);
        let cfg = WorkflowConfig {
            mem_cap_bytes: 4 * 12 * 100,
            max_parallel_tasks: 1,
            ..WorkflowConfig::default()
        };
        // 4800 / (3 + 1) = 1200 bytes per chunk → 100 rows
        assert_eq!(resolve_chunk_size(&cfg, &work).unwrap(), 100);
    }
}
