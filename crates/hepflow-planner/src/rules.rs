//! Validation rules: bind every step and aggregate to an operator and check
//! schemas where data actually flows.
//!
//! Everything that can fail on configuration alone fails here, before any
//! source is read: unknown columns, bad expressions, bad taps, bad axes.

use std::collections::HashSet;
use std::sync::Arc;

use hepflow_core::dag::{SinkDef, SinkFormat, WorkflowSpec};
use hepflow_core::schema::{DataType, Schema};
use hepflow_ops::{build_aggregator, build_transform, Aggregator, Footprint, Transform};

use crate::{PlanError, Result};

/// An aggregate bound to its operator and to the step prefix it observes.
#[derive(Debug, Clone)]
pub struct BoundAggregate {
    pub aggregator: Arc<dyn Aggregator>,
    /// Number of leading stages applied before accumulation.
    pub tap: usize,
}

#[derive(Debug, Clone)]
pub struct BoundSink {
    pub def: SinkDef,
    pub tap: usize,
    /// Columns written, in order.
    pub columns: Vec<String>,
    pub schema: Schema,
}

/// A workflow whose steps and aggregates are bound to operators.
#[derive(Debug, Clone)]
pub struct BoundWorkflow {
    pub spec: WorkflowSpec,
    /// Loaded columns, as the record loaders produce them.
    pub load_schema: Schema,
    pub stages: Vec<Arc<dyn Transform>>,
    /// Schema after each prefix: `schemas[0]` is `load_schema`,
    /// `schemas[i]` the output of stage `i - 1`.
    pub schemas: Vec<Schema>,
    pub footprints: Vec<Footprint>,
    pub aggregates: Vec<BoundAggregate>,
    pub sink: Option<BoundSink>,
}

impl BoundWorkflow {
    pub fn schema_at(&self, tap: usize) -> &Schema {
        &self.schemas[tap]
    }

    /// Deepest prefix any output needs; later stages are never run.
    pub fn max_tap(&self) -> usize {
        self.aggregates
            .iter()
            .map(|a| a.tap)
            .chain(self.sink.iter().map(|s| s.tap))
            .max()
            .unwrap_or(0)
    }
}

pub fn validate(spec: &WorkflowSpec) -> Result<BoundWorkflow> {
    if spec.sources.is_empty() {
        return Err(PlanError::Invalid("workflow has no sources".into()));
    }
    spec.schema.validate()?;
    let load_schema = spec.schema.project(&spec.load_columns(), "workflow columns")?;

    let mut ids = HashSet::new();
    for id in spec.steps.iter().filter_map(|s| s.id.as_deref()) {
        if !ids.insert(id) {
            return Err(PlanError::Invalid(format!("duplicate step id '{id}'")));
        }
    }

    let mut stages = Vec::with_capacity(spec.steps.len());
    let mut schemas = vec![load_schema.clone()];
    let mut footprints = Vec::with_capacity(spec.steps.len());
    for (i, step) in spec.steps.iter().enumerate() {
        let stage = build_transform(&step.kind)?;
        let plan = stage.plan(&schemas[i]).map_err(|e| {
            PlanError::Invalid(format!(
                "step {} ({}{}): {e}",
                i,
                step.kind.name(),
                step.id.as_deref().map(|id| format!(" '{id}'")).unwrap_or_default()
            ))
        })?;
        schemas.push(plan.output_schema);
        footprints.push(plan.footprint);
        stages.push(stage);
    }

    let mut names = HashSet::new();
    let mut aggregates = Vec::with_capacity(spec.aggregates.len());
    for def in &spec.aggregates {
        if !names.insert(def.name.as_str()) {
            return Err(PlanError::Invalid(format!("duplicate aggregate name '{}'", def.name)));
        }
        let tap = spec.prefix_len(def.at.as_deref())?;
        let aggregator = build_aggregator(def)?;
        aggregator.check(&schemas[tap])?;
        aggregates.push(BoundAggregate { aggregator, tap });
    }

    let sink = spec
        .sink
        .as_ref()
        .map(|def| bind_sink(spec, def, &schemas))
        .transpose()?;

    if aggregates.is_empty() && sink.is_none() {
        return Err(PlanError::Invalid(
            "workflow produces nothing: add an aggregate or a sink".into(),
        ));
    }

    Ok(BoundWorkflow {
        spec: spec.clone(),
        load_schema,
        stages,
        schemas,
        footprints,
        aggregates,
        sink,
    })
}

fn bind_sink(spec: &WorkflowSpec, def: &SinkDef, schemas: &[Schema]) -> Result<BoundSink> {
    let tap = spec.prefix_len(def.at.as_deref())?;
    let available = &schemas[tap];
    let columns = def.columns.clone().unwrap_or_else(|| available.names());
    let schema = available.project(&columns, "sink columns")?;
    if def.partitions == Some(0) {
        return Err(PlanError::Invalid("sink partitions must be >= 1".into()));
    }
    if let Some(keys) = &def.partition_by {
        if keys.is_empty() {
            return Err(PlanError::Invalid("sink partition_by needs at least one column".into()));
        }
        schema.project(keys, "sink partition_by")?;
    }
    if def.format != SinkFormat::Jsonl {
        if let Some(f) = schema.fields.iter().find(|f| f.data_type.is_list()) {
            return Err(PlanError::Invalid(format!(
                "sink format {:?} cannot store jagged column '{}' ({}); project it away or use jsonl",
                def.format, f.name, f.data_type
            )));
        }
    }
    if def.format == SinkFormat::Csv {
        if let Some(f) = schema
            .fields
            .iter()
            .find(|f| f.nullable && f.data_type == DataType::Utf8)
        {
            return Err(PlanError::Invalid(format!(
                "csv sink cannot tell null from empty in string column '{}'; use jsonl",
                f.name
            )));
        }
    }
    Ok(BoundSink {
        def: def.clone(),
        tap,
        columns,
        schema,
    })
}
