//! Convenient re-exports for downstream crates.

pub use crate::config::WorkflowConfig;
pub use crate::dag::{
    AggregateDef, AggregateKind, AxisDef, FlowPolicy, PairPolicy, SinkDef, SinkFormat, SourceSpec,
    Step, StepKind, WorkflowSpec,
};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{NodeId, SourceId};
pub use crate::manifest::{ManifestId, RunManifest};
pub use crate::range::ChunkRange;
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{Column, RecordBatch, Scalar};
