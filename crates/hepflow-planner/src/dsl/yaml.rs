//! YAML → `WorkflowSpec`.
//!
//! Example:
//! ```yaml
//! name: dimuon
//! config: { chunk_size: 100000, reduce_group_size: 4 }
//! sources:
//!   - data/run2012B.jsonl
//!   - { url: "data/run2012C.jsonl" }
//! schema:
//!   - { name: nMuon,       type: Int32 }
//!   - { name: Muon_pt,     type: "List<Float32>" }
//!   - { name: Muon_eta,    type: "List<Float32>" }
//!   - { name: Muon_phi,    type: "List<Float32>" }
//!   - { name: Muon_charge, type: "List<Int32>" }
//! steps:
//!   - { id: two_muons, op: filter, expr: "nMuon == 2" }
//!   - { id: dimuon, op: pair, collection: Muon, output: Dimuon }
//! aggregates:
//!   - { name: dimuon_mass, kind: histogram, column: Dimuon_mass,
//!       axis: { type: regular, bins: 60, lo: 0.25, hi: 300.0 } }
//!   - { name: selected, kind: count, at: two_muons }
//! sink:
//!   destination: out/dimuons
//!   columns: [Dimuon_mass, Dimuon_pt]
//!   partitions: 4
//! ```

use hepflow_core::config::WorkflowConfig;
use hepflow_core::dag::{AggregateDef, SinkDef, SourceSpec, Step, WorkflowSpec};
use hepflow_core::schema::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};

use crate::{PlanError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkflowDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: Option<ConfigOverrides>,
    sources: Vec<SourceEntry>,
    schema: Vec<FieldDef>,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default)]
    aggregates: Vec<AggregateDef>,
    #[serde(default)]
    sink: Option<SinkDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Url(String),
    Spec(SourceSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

/// The workflow file's `config:` block. Unset keys leave the base untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub chunk_size: Option<u64>,
    pub mem_cap_bytes: Option<usize>,
    pub max_parallel_tasks: Option<usize>,
    pub reduce_group_size: Option<usize>,
    pub partitions: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut cfg: WorkflowConfig) -> WorkflowConfig {
        if let Some(v) = self.chunk_size {
            cfg.chunk_size = Some(v);
        }
        if let Some(v) = self.mem_cap_bytes {
            cfg.mem_cap_bytes = v;
        }
        if let Some(v) = self.max_parallel_tasks {
            cfg.max_parallel_tasks = v;
        }
        if let Some(v) = self.reduce_group_size {
            cfg.reduce_group_size = v;
        }
        if let Some(v) = self.partitions {
            cfg.partitions = v;
        }
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct ParsedWorkflow {
    pub spec: WorkflowSpec,
    pub config: ConfigOverrides,
}

fn to_schema(fields: &[FieldDef]) -> Result<Schema> {
    let fields = fields
        .iter()
        .map(|f| {
            Ok(Field::new(
                f.name.clone(),
                DataType::parse(&f.data_type)?,
                f.nullable,
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    let schema = Schema::new(fields);
    schema.validate()?;
    Ok(schema)
}

/// Parse a YAML workflow document. Structural checks only; `rules::validate`
/// does the schema and operator checks.
pub fn parse_yaml_workflow(yaml_src: &str) -> Result<ParsedWorkflow> {
    let doc: WorkflowDoc = serde_yaml::from_str(yaml_src)?;
    if doc.sources.is_empty() {
        return Err(PlanError::Invalid("workflow has no sources".into()));
    }
    let sources = doc
        .sources
        .into_iter()
        .map(|s| match s {
            SourceEntry::Url(url) => SourceSpec { url },
            SourceEntry::Spec(spec) => spec,
        })
        .collect();
    let spec = WorkflowSpec {
        name: doc.name,
        sources,
        schema: to_schema(&doc.schema)?,
        columns: doc.columns,
        steps: doc.steps,
        aggregates: doc.aggregates,
        sink: doc.sink,
    };
    Ok(ParsedWorkflow {
        spec,
        config: doc.config.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::dag::{AggregateKind, AxisDef, PairPolicy, SinkFormat, StepKind};

    const DIMUON: &str = r#"
name: dimuon
config: { chunk_size: 250, reduce_group_size: 3 }
sources:
  - memory://run_b
  - { url: "memory://run_c" }
schema:
  - { name: nMuon, type: Int32 }
  - { name: Muon_pt, type: "List<Float32>" }
  - { name: Muon_charge, type: "List<Int32>", nullable: true }
steps:
  - { id: two, op: filter, expr: "nMuon == 2" }
  - { op: pair, collection: Muon, output: Dimuon, policy: exact }
aggregates:
  - name: mass
    kind: histogram
    column: Dimuon_mass
    axis: { type: variable, edges: [0.0, 1.0, 10.0] }
  - { name: selected, kind: count, at: two }
sink: { destination: out/dimuons, format: csv, partitions: 2 }
"#;

    #[test]
    fn parses_full_document() {
        let parsed = parse_yaml_workflow(DIMUON).unwrap();
        let spec = &parsed.spec;
        assert_eq!(spec.name.as_deref(), Some("dimuon"));
        assert_eq!(spec.sources.len(), 2);
        assert_eq!(spec.sources[1].url, "memory://run_c");
        assert_eq!(
            spec.schema.field_named("Muon_pt").unwrap().data_type,
            DataType::List(Box::new(DataType::Float32))
        );
        assert!(spec.schema.field_named("Muon_charge").unwrap().nullable);
        assert_eq!(spec.steps[0].id.as_deref(), Some("two"));
        assert!(matches!(
            spec.steps[1].kind,
            StepKind::Pair {
                policy: PairPolicy::Exact,
                mass: None,
                ..
            }
        ));
        match &spec.aggregates[0].kind {
            AggregateKind::Histogram { axis, .. } => {
                assert_eq!(axis, &AxisDef::Variable { edges: vec![0.0, 1.0, 10.0] })
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(spec.aggregates[1].kind, AggregateKind::Count);
        let sink = spec.sink.as_ref().unwrap();
        assert_eq!(sink.format, SinkFormat::Csv);
        assert_eq!(sink.partitions, Some(2));

        let cfg = parsed.config.apply(WorkflowConfig::default());
        assert_eq!(cfg.chunk_size, Some(250));
        assert_eq!(cfg.reduce_group_size, 3);
        assert_eq!(cfg.max_parallel_tasks, WorkflowConfig::default().max_parallel_tasks);
    }

    #[test]
    fn rejects_unknown_types_and_ops() {
        let bad_type = "sources: [memory://a]\nschema: [{ name: x, type: Complex }]\n";
        assert!(matches!(parse_yaml_workflow(bad_type), Err(PlanError::Core(_))));

        let bad_op = "sources: [memory://a]\nschema: [{ name: x, type: Int32 }]\nsteps: [{ op: explode }]\n";
        assert!(matches!(parse_yaml_workflow(bad_op), Err(PlanError::Yaml(_))));

        let no_sources = "sources: []\nschema: [{ name: x, type: Int32 }]\n";
        assert!(matches!(parse_yaml_workflow(no_sources), Err(PlanError::Invalid(_))));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let src = "config: { spill_dir: /tmp }\nsources: [memory://a]\nschema: [{ name: x, type: Int32 }]\n";
        assert!(matches!(parse_yaml_workflow(src), Err(PlanError::Yaml(_))));
    }
}
