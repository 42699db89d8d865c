#![forbid(unsafe_code)]
//! hepflow-planner: YAML workflow → validated stage chain → chunk and
//! reduction layout.
//!
//! Design:
//! - The workflow itself is the data-only `hepflow_core::dag::WorkflowSpec`.
//! - This crate adds:
//!     * a YAML DSL with a `config:` override block
//!     * validation rules that bind every step/aggregate to an operator
//!       (via `hepflow_ops::registry`) and check schemas at each tap
//!     * a coarse `WorkEstimate` and chunk-size choice
//!     * lowering to chunk ranges plus one reduction tree per aggregate
//!
//! No I/O here: record counts come from the caller (exec opens sources).

pub mod cost;
pub mod dsl;
pub mod lower;
pub mod rules;

use thiserror::Error;

pub use cost::{estimate_work, resolve_chunk_size};
pub use dsl::yaml::{parse_yaml_workflow, ConfigOverrides, ParsedWorkflow};
pub use lower::{lower, ChunkLayout};
pub use rules::{validate, BoundAggregate, BoundSink, BoundWorkflow};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid workflow: {0}")]
    Invalid(String),

    #[error(transparent)]
    Op(#[from] hepflow_ops::OpError),

    #[error(transparent)]
    Core(#[from] hepflow_core::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
