#![forbid(unsafe_code)]
//! hepflow-io: where records come from and where results go.
//!
//! - `source`: the `Source` trait, memory/JSONL/CSV sources and the
//!   `SourceContext` that opens them from URLs.
//! - `loader`: `RecordLoader`, a source bound to a column selection.
//! - `sink`: staged, partitioned, all-or-nothing dataset writes.
//! - `writers` / `readers`: per-format partition files.

pub mod codec;
pub mod error;
pub mod loader;
pub mod readers;
pub mod sink;
pub mod source;
pub mod writers;

pub use error::{Error, Result};
pub use loader::RecordLoader;
pub use sink::{read_partitioned, write_partitioned, PartitionStrategy, SinkOptions, WriteResult};
pub use source::{MemoryTable, Source, SourceContext};
