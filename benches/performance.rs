use criterion::{criterion_group, criterion_main, Criterion};
use hepflow::core::config::WorkflowConfig;
use hepflow::core::dag::PairPolicy;
use hepflow::exec::{Executor, WorkflowRunner};
use hepflow::io::{MemoryTable, SourceContext};
use hepflow::ops::filter::Filter;
use hepflow::ops::pair::Pair;
use hepflow::ops::{Histogram, Transform};
use hepflow::planner::parse_yaml_workflow;

#[path = "../tests/test_data_gen.rs"]
mod test_data_gen;

use test_data_gen::{dimuon_events, muon_schema};

const WORKFLOW: &str = r#"
sources: [memory://events]
schema:
  - { name: event, type: Int64 }
  - { name: nMuon, type: Int32 }
  - { name: Muon_pt, type: "List<Float64>" }
  - { name: Muon_eta, type: "List<Float64>" }
  - { name: Muon_phi, type: "List<Float64>" }
  - { name: Muon_charge, type: "List<Int32>" }
steps:
  - { id: two, op: filter, expr: "nMuon == 2" }
  - { op: pair, collection: Muon, output: Dimuon }
aggregates:
  - { name: selected, kind: count, at: two }
  - name: mass
    kind: histogram
    column: Dimuon_mass
    axis: { type: regular, bins: 60, lo: 0.0, hi: 60.0 }
"#;

fn bench_transforms(c: &mut Criterion) {
    let batch = dimuon_events(0, 4096);
    let filter = Filter::new("nMuon == 2 && len(Muon_pt) == 2").unwrap();
    c.bench_function("filter_4096", |b| {
        b.iter(|| filter.apply(&batch).unwrap())
    });

    let selected = filter.apply(&batch).unwrap();
    let pair = Pair::new("Muon", "Dimuon", PairPolicy::FirstMatch);
    c.bench_function("pair_1024", |b| b.iter(|| pair.apply(&selected).unwrap()));
}

fn bench_histogram_fill(c: &mut Criterion) {
    let edges: Vec<f64> = (0..=100).map(|i| i as f64).collect();
    let values: Vec<f64> = (0..10_000).map(|i| (i % 997) as f64 * 0.1).collect();
    c.bench_function("histogram_fill_10k", |b| {
        b.iter(|| {
            let mut h = Histogram::empty("h", edges.clone(), Default::default());
            for v in &values {
                h.fill(*v, 1.0);
            }
            h
        })
    });
}

fn bench_workflow(c: &mut Criterion) {
    let spec = parse_yaml_workflow(WORKFLOW).unwrap().spec;
    let sources = SourceContext::new();
    sources
        .register("events", MemoryTable::new(muon_schema(), dimuon_events(0, 20_000)).unwrap())
        .unwrap();
    let cfg = WorkflowConfig {
        chunk_size: Some(2_000),
        ..WorkflowConfig::default()
    };
    c.bench_function("workflow_20k_events", |b| {
        b.iter(|| {
            // New executor per iteration: an empty memo table.
            let exec = Executor::from_config(&cfg).unwrap();
            WorkflowRunner::new(&exec, &sources, cfg.clone()).run(&spec).unwrap()
        })
    });
}

criterion_group!(benches, bench_transforms, bench_histogram_fill, bench_workflow);
criterion_main!(benches);
