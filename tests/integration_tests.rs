//! End-to-end workflow tests over JSONL event files.


use std::path::Path;

use hepflow::core::config::WorkflowConfig;
use hepflow::core::types::Scalar;
use hepflow::exec::{ExecError, Executor, RunReport, WorkflowRunner};
use hepflow::io::{read_partitioned, SourceContext};
use hepflow::planner::parse_yaml_workflow;
use test_data_gen::{dimuon_events, two_muon_events, write_jsonl};

fn dimuon_yaml(a: &Path, b: &Path, out: &Path, policy: &str) -> String {
    format!(
        r#"
name: dimuon
sources: ["{a}", "{b}"]
schema:
  - {{ name: event, type: Int64 }}
  - {{ name: nMuon, type: Int32 }}
  - {{ name: Muon_pt, type: "List<Float64>" }}
  - {{ name: Muon_eta, type: "List<Float64>" }}
  - {{ name: Muon_phi, type: "List<Float64>" }}
  - {{ name: Muon_charge, type: "List<Int32>" }}
steps:
  - {{ id: two, op: filter, expr: "nMuon == 2" }}
  - {{ id: pair, op: pair, collection: Muon, output: Dimuon, policy: {policy}, mass: 0.0 }}
aggregates:
  - {{ name: events, kind: count, at: two }}
  - name: mass
    kind: histogram
    column: Dimuon_mass
    axis: {{ type: regular, bins: 30, lo: -1.0, hi: 59.0 }}
sink:
  destination: "{out}"
  format: csv
  partitions: 2
  columns: [event, Dimuon_mass]
"#,
        a = a.display(),
        b = b.display(),
        out = out.display(),
    )
}

fn run(yaml: &str, chunk_size: u64, group: usize) -> Result<RunReport, ExecError> {
    let spec = parse_yaml_workflow(yaml).expect("valid workflow").spec;
    let cfg = WorkflowConfig {
        chunk_size: Some(chunk_size),
        reduce_group_size: group,
        max_parallel_tasks: 3,
        ..WorkflowConfig::default()
    };
    let exec = Executor::from_config(&cfg)?;
    let sources = SourceContext::new();
    let report = WorkflowRunner::new(&exec, &sources, cfg).run(&spec);
    sources.close();
    report
}

#[test]
fn test_dimuon_histogram_count_and_sink() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 100));
    let b = write_jsonl(dir.path(), "b.jsonl", &dimuon_events(100, 60));
    let out = dir.path().join("dimuons");

    let report = run(&dimuon_yaml(&a, &b, &out, "exact"), 30, 3).unwrap();

    // round(100 / 30) = 3 chunks, round(60 / 30) = 2 chunks
    assert_eq!(report.chunks, 5);
    assert_eq!(report.count("events").unwrap().rows, 40);

    let h = report.histogram("mass").unwrap();
    assert_eq!(h.entries, 40);
    assert_eq!(h.total(), 40.0);
    assert_eq!(h.underflow + h.overflow, 0.0);
    // mass = 2 * (10 + i % 7) always lands in [20, 34)
    let filled: f64 = h.bin_counts()[10..17].iter().sum();
    assert_eq!(filled, 40.0);

    let written = report.written.as_ref().unwrap();
    assert_eq!(written.total_rows(), 40);
    assert_eq!(written.rows_per_partition, vec![20, 20]);

    let (marker, batches) = read_partitioned(&out).unwrap();
    assert_eq!(&marker, written);
    let events: Vec<i64> = batches
        .iter()
        .flat_map(|b| b.column("event").unwrap().values.clone())
        .map(|v| v.as_i64().unwrap())
        .collect();
    let mut expected = two_muon_events(0, 100);
    expected.extend(two_muon_events(100, 60));
    assert_eq!(events, expected);
    assert!(batches.iter().all(|b| b.column("Muon_pt").is_none()));
}

#[test]
fn test_results_independent_of_chunking_and_tree_shape() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 90));
    let b = write_jsonl(dir.path(), "b.jsonl", &dimuon_events(90, 45));

    let layouts = [(1000, 2), (7, 2), (13, 5), (1, 8)];
    let reports: Vec<RunReport> = layouts
        .iter()
        .enumerate()
        .map(|(i, &(chunk, group))| {
            let out = dir.path().join(format!("out-{i}"));
            run(&dimuon_yaml(&a, &b, &out, "first_match"), chunk, group).unwrap()
        })
        .collect();

    for r in &reports[1..] {
        assert_eq!(r.aggregates, reports[0].aggregates);
        assert_eq!(
            r.written.as_ref().unwrap().total_rows(),
            reports[0].written.as_ref().unwrap().total_rows()
        );
    }
    assert_eq!(reports[0].chunks, 2);
    assert_eq!(reports[3].chunks, 135);
}

#[test]
fn test_pair_error_policy_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 40));
    let b = write_jsonl(dir.path(), "b.jsonl", &dimuon_events(40, 40));
    let out = dir.path().join("never");
    // Keep three-muon events so the strict policy trips.
    let yaml = dimuon_yaml(&a, &b, &out, "error").replace("nMuon == 2", "nMuon >= 2");

    let err = run(&yaml, 10, 2).unwrap_err();
    assert!(matches!(err, ExecError::Compute { .. }), "{err}");
    assert!(!out.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains("inprogress"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_missing_source_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 10));
    let missing = dir.path().join("missing.jsonl");
    let out = dir.path().join("out");

    let err = run(&dimuon_yaml(&a, &missing, &out, "exact"), 5, 2).unwrap_err();
    assert!(matches!(err.root_cause(), ExecError::Io(_)), "{err}");
    assert!(err.to_string().contains("missing.jsonl"), "{err}");
}

#[test]
fn test_existing_destination_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 20));
    let b = write_jsonl(dir.path(), "b.jsonl", &dimuon_events(20, 20));
    let out = dir.path().join("taken");
    std::fs::create_dir(&out).unwrap();

    assert!(run(&dimuon_yaml(&a, &b, &out, "exact"), 10, 2).is_err());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_null_composites_are_written_as_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_jsonl(dir.path(), "a.jsonl", &dimuon_events(0, 8));
    let b = write_jsonl(dir.path(), "b.jsonl", &dimuon_events(8, 8));
    let out = dir.path().join("all");
    let yaml = dimuon_yaml(&a, &b, &out, "exact")
        .replace("nMuon == 2", "nMuon >= 0")
        .replace("format: csv", "format: jsonl");

    let report = run(&yaml, 4, 2).unwrap();
    assert_eq!(report.count("events").unwrap().rows, 16);
    assert_eq!(report.histogram("mass").unwrap().entries, 4);

    let (_, batches) = read_partitioned(&out).unwrap();
    let masses: Vec<Scalar> = batches
        .iter()
        .flat_map(|b| b.column("Dimuon_mass").unwrap().values.clone())
        .collect();
    assert_eq!(masses.len(), 16);
    assert_eq!(masses.iter().filter(|m| m.is_null()).count(), 12);
}
