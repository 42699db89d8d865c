//! Whole-file partition readers, the inverse of `writers`.

pub mod csv;
pub mod jsonl;

#[cfg(feature = "parquet")]
pub mod parquet;

use std::path::Path;

use hepflow_core::dag::SinkFormat;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;

use crate::error::Result;

pub fn read_file(format: SinkFormat, path: &Path, schema: &Schema) -> Result<RecordBatch> {
    match format {
        SinkFormat::Jsonl => jsonl::read_path(path, schema),
        SinkFormat::Csv => csv::read_path(path, schema),
        #[cfg(feature = "parquet")]
        SinkFormat::Parquet => parquet::read_path(path, schema),
        #[cfg(not(feature = "parquet"))]
        SinkFormat::Parquet => Err(crate::error::Error::Unsupported(
            "hepflow was built without the `parquet` feature".into(),
        )),
    }
}
