//! Workflow configuration that downstream crates can serialize/deserialize.
//!
//! Precedence (lowest → highest): defaults, `HEPFLOW_*` environment
//! variables, the workflow file's `config:` block, CLI flags.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Target records per chunk. `None` lets the cost model derive one from
    /// `mem_cap_bytes` and the schema's estimated row width.
    pub chunk_size: Option<u64>,

    /// Memory the chunk-size model may plan for (bytes).
    pub mem_cap_bytes: usize,

    /// Execution parallelism. The executor never runs more tasks at once.
    pub max_parallel_tasks: usize,

    /// Fan-in of each reduction step (partials combined per group).
    pub reduce_group_size: usize,

    /// Default number of sink partitions when the sink does not say.
    pub partitions: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            max_parallel_tasks: 4,
            reduce_group_size: 4,
            partitions: 1,
        }
    }
}

impl WorkflowConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `HEPFLOW_CHUNK_SIZE`: target records per chunk
    /// - `HEPFLOW_MEM_CAP_BYTES`: memory cap used for chunk sizing
    /// - `HEPFLOW_MAX_PARALLEL_TASKS`: max parallel tasks
    /// - `HEPFLOW_REDUCE_GROUP_SIZE`: reduction fan-in
    /// - `HEPFLOW_PARTITIONS`: default sink partitions
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("HEPFLOW_CHUNK_SIZE") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.chunk_size = Some(v);
            }
        }

        if let Ok(s) = std::env::var("HEPFLOW_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("HEPFLOW_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v;
            }
        }

        if let Ok(s) = std::env::var("HEPFLOW_REDUCE_GROUP_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.reduce_group_size = v;
            }
        }

        if let Ok(s) = std::env::var("HEPFLOW_PARTITIONS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.partitions = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == Some(0) {
            return Err(Error::Config("chunk_size must be > 0".into()));
        }
        if self.max_parallel_tasks == 0 {
            return Err(Error::Config("max_parallel_tasks must be > 0".into()));
        }
        if self.reduce_group_size < 2 {
            return Err(Error::Config(format!(
                "reduce_group_size must be >= 2, got {}",
                self.reduce_group_size
            )));
        }
        if self.partitions == 0 {
            return Err(Error::Config("partitions must be > 0".into()));
        }
        Ok(())
    }
}
