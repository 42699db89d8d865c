//! hepflow: chunked map-reduce over columnar event data.
//!
//! The workspace crates are re-exported here so integration tests, benches
//! and embedding applications can depend on one package.

pub use hepflow_core as core;
pub use hepflow_exec as exec;
pub use hepflow_io as io;
pub use hepflow_ops as ops;
pub use hepflow_planner as planner;
pub use hepflow_tree as tree;
