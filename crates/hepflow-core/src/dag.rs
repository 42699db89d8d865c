//! Workflow description: sources → stage chain → aggregate taps → sink.
//!
//! This is the data-only form of a workflow. The planner builds it from YAML,
//! the exec crate binds each step to a concrete transform and lowers the
//! whole thing into a content-addressed task graph.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub sources: Vec<SourceSpec>,
    /// Schema shared by every source.
    pub schema: Schema,
    /// Columns to load; `None` loads the full schema.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub aggregates: Vec<AggregateDef>,
    #[serde(default)]
    pub sink: Option<SinkDef>,
}

impl WorkflowSpec {
    /// Columns the loaders read, in load order.
    pub fn load_columns(&self) -> Vec<String> {
        self.columns.clone().unwrap_or_else(|| self.schema.names())
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id.as_deref() == Some(id))
    }

    /// Number of leading steps a tap at `at` observes (`None` = all steps).
    pub fn prefix_len(&self, at: Option<&str>) -> Result<usize> {
        match at {
            None => Ok(self.steps.len()),
            Some(id) => self
                .step_index(id)
                .map(|i| i + 1)
                .ok_or_else(|| Error::Config(format!("unknown step id '{id}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// `memory://name`, `file:///path.jsonl`, or a bare path.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Optional name that aggregates and the sink can tap.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepKind {
    /// Keep rows matching a predicate expression.
    Filter { expr: String },
    /// Keep only the listed columns.
    Project { columns: Vec<String> },
    /// Add `alias` = length of the jagged column `column`.
    Multiplicity { column: String, alias: String },
    /// Combine an opposite-charge pair from `collection` into `output_*` fields.
    Pair {
        collection: String,
        output: String,
        #[serde(default)]
        policy: PairPolicy,
        /// Constituent mass when the collection has no `_mass` column.
        #[serde(default)]
        mass: Option<f64>,
    },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Filter { .. } => "filter",
            StepKind::Project { .. } => "project",
            StepKind::Multiplicity { .. } => "multiplicity",
            StepKind::Pair { .. } => "pair",
        }
    }
}

/// What to do with rows that do not hold exactly one usable pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairPolicy {
    /// First positive + first negative record; extras ignored, missing sign → null.
    #[default]
    FirstMatch,
    /// Exactly one positive and one negative, anything else → null.
    Exact,
    /// Exactly one positive and one negative, anything else aborts the batch.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDef {
    pub name: String,
    /// Step id whose output feeds this aggregate (`None` = end of chain).
    #[serde(default)]
    pub at: Option<String>,
    #[serde(flatten)]
    pub kind: AggregateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateKind {
    Histogram {
        column: String,
        axis: AxisDef,
        #[serde(default)]
        weight: Option<String>,
        #[serde(default)]
        flow: FlowPolicy,
    },
    /// Number of rows reaching the tap.
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AxisDef {
    Regular { bins: usize, lo: f64, hi: f64 },
    Variable { edges: Vec<f64> },
}

impl AxisDef {
    /// Materialize and validate bin edges (`bins + 1` strictly increasing values).
    pub fn edges(&self) -> Result<Vec<f64>> {
        let edges = match self {
            AxisDef::Regular { bins, lo, hi } => {
                if *bins == 0 || !(lo < hi) || !lo.is_finite() || !hi.is_finite() {
                    return Err(Error::Config(format!(
                        "regular axis needs bins > 0 and finite lo < hi (bins={bins}, lo={lo}, hi={hi})"
                    )));
                }
                let width = (hi - lo) / *bins as f64;
                let mut e: Vec<f64> = (0..*bins).map(|i| lo + width * i as f64).collect();
                e.push(*hi);
                e
            }
            AxisDef::Variable { edges } => edges.clone(),
        };
        if edges.len() < 2 {
            return Err(Error::Config("axis needs at least two edges".into()));
        }
        if edges.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::Config(format!(
                "axis edges must be strictly increasing: {edges:?}"
            )));
        }
        Ok(edges)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPolicy {
    /// Out-of-range values go to the underflow/overflow counters only.
    #[default]
    Drop,
    /// Out-of-range values are also added to the first/last bin.
    Fold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkDef {
    pub destination: String,
    #[serde(default)]
    pub format: SinkFormat,
    /// Output partitions; falls back to `WorkflowConfig::partitions`.
    #[serde(default)]
    pub partitions: Option<usize>,
    /// Hash-partition on these columns instead of contiguous splitting.
    #[serde(default)]
    pub partition_by: Option<Vec<String>>,
    /// Columns to write; `None` writes everything the tap produces.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFormat {
    #[default]
    Jsonl,
    Csv,
    Parquet,
}

impl SinkFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SinkFormat::Jsonl => "jsonl",
            SinkFormat::Csv => "csv",
            SinkFormat::Parquet => "parquet",
        }
    }
}
