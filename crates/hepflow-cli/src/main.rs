//! hepflow CLI: run, validate and explain workflow files.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use hepflow_core::config::WorkflowConfig;
use hepflow_exec::{Executor, RunReport, WorkflowRunner};
use hepflow_io::SourceContext;
use hepflow_ops::Partial;
use hepflow_planner::{parse_yaml_workflow, validate, ParsedWorkflow};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hepflow")]
#[command(about = "Chunked map-reduce over columnar event data", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow and print its results
    Run {
        /// Path to the workflow YAML file
        #[arg(short, long)]
        workflow: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a workflow file without reading any data
    Validate {
        /// Path to the workflow YAML file
        #[arg(short, long)]
        workflow: PathBuf,
    },

    /// Show chunk layout and reduction plan (opens sources, reads no records)
    Explain {
        /// Path to the workflow YAML file
        #[arg(short, long)]
        workflow: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line configuration; highest priority.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Target records per chunk
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Memory cap in bytes used to derive the chunk size
    #[arg(long)]
    mem_cap: Option<usize>,

    /// Maximum parallel tasks
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Partials combined per reduction step
    #[arg(long)]
    reduce_group_size: Option<usize>,

    /// Default sink partitions
    #[arg(long)]
    partitions: Option<usize>,
}

impl Overrides {
    fn apply(&self, mut cfg: WorkflowConfig) -> WorkflowConfig {
        if let Some(v) = self.chunk_size {
            cfg.chunk_size = Some(v);
        }
        if let Some(v) = self.mem_cap {
            cfg.mem_cap_bytes = v;
        }
        if let Some(v) = self.max_parallel {
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

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            workflow,
            overrides,
            json,
        } => run_workflow(&workflow, &overrides, json),
        Commands::Validate { workflow } => validate_workflow(&workflow),
        Commands::Explain {
            workflow,
            overrides,
        } => explain_workflow(&workflow, &overrides),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<ParsedWorkflow, Box<dyn std::error::Error>> {
    let src = fs::read_to_string(path)?;
    Ok(parse_yaml_workflow(&src)?)
}

/// defaults < environment < workflow `config:` < command line
fn effective_config(parsed: &ParsedWorkflow, overrides: &Overrides) -> WorkflowConfig {
    overrides.apply(parsed.config.apply(WorkflowConfig::from_env()))
}

fn run_workflow(path: &Path, overrides: &Overrides, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = effective_config(&parsed, overrides);
    debug!(?config, "effective configuration");

    let exec = Executor::from_config(&config)?;
    let sources = SourceContext::new();
    let report = WorkflowRunner::new(&exec, &sources, config).run(&parsed.spec);
    sources.close();
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("✓ Workflow finished in {}ms", report.manifest.duration_ms());
    println!("  Chunks: {}", report.chunks);
    println!("  Tasks: {}", report.stats);
    for partial in &report.aggregates {
        match partial {
            Partial::Histogram(h) => {
                println!(
                    "  Histogram {}: {} bins, entries={}, sum={}, underflow={}, overflow={}",
                    h.name,
                    h.bins(),
                    h.entries,
                    h.total(),
                    h.underflow,
                    h.overflow
                );
            }
            Partial::Count(c) => println!("  Count {}: {}", c.name, c.rows),
        }
    }
    if let Some(w) = &report.written {
        println!(
            "  Wrote {} rows to {} ({} partitions, {:?})",
            w.total_rows(),
            w.destination,
            w.partitions(),
            w.format
        );
    }
    println!("  Workflow hash: {}", report.manifest.workflow_hash.short());
    if let Some(digest) = &report.manifest.outputs_digest {
        println!("  Outputs digest: {}", digest.short());
    }
}

fn validate_workflow(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = parsed.config.apply(WorkflowConfig::from_env());
    config.validate()?;
    let bound = validate(&parsed.spec)?;
    println!(
        "✓ Workflow is valid: {} source(s), {} step(s), {} aggregate(s){}",
        parsed.spec.sources.len(),
        bound.stages.len(),
        bound.aggregates.len(),
        if bound.sink.is_some() { ", 1 sink" } else { "" }
    );
    Ok(())
}

fn explain_workflow(path: &Path, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = effective_config(&parsed, overrides);
    let exec = Executor::new(1)?;
    let sources = SourceContext::new();
    let prepared = WorkflowRunner::new(&exec, &sources, config).prepare(&parsed.spec);
    sources.close();
    print!("{}", prepared?.explain());
    Ok(())
}
