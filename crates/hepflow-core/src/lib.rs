#![forbid(unsafe_code)]
//! hepflow-core: shared vocabulary for the chunked map-reduce workflow.
//!
//! Everything here is plain data: schemas, columnar batches, chunk ranges,
//! workflow specs, content hashes and run manifests. No I/O and no runtime
//! live in this crate so every other crate can depend on it cheaply.

pub mod config;
pub mod dag;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod range;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

/// Engine version recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
