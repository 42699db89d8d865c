//! Partition file writers.

pub mod csv;
pub mod jsonl;

#[cfg(feature = "parquet")]
pub mod parquet;

use std::path::Path;

use hepflow_core::dag::SinkFormat;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;

use crate::error::Result;

/// Write one partition file in `format`.
pub fn write_file(format: SinkFormat, path: &Path, schema: &Schema, batch: &RecordBatch) -> Result<()> {
    match format {
        SinkFormat::Jsonl => {
            let mut w = jsonl::JsonlWriter::to_path(path, Some(schema.names()))?;
            w.write_batch(batch)?;
            w.finish()
        }
        SinkFormat::Csv => {
            let mut w = csv::CsvWriter::to_path(path, schema.names())?;
            w.write_batch(batch)?;
            w.finish()
        }
        #[cfg(feature = "parquet")]
        SinkFormat::Parquet => {
            let mut w = parquet::ParquetWriter::to_path(path, schema)?;
            w.write_batch(batch)?;
            w.close()
        }
        #[cfg(not(feature = "parquet"))]
        SinkFormat::Parquet => Err(crate::error::Error::Unsupported(
            "hepflow was built without the `parquet` feature; rebuild with `--features hepflow-io/parquet`"
                .into(),
        )),
    }
}
