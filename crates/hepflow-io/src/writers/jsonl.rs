//! Streaming NDJSON writer.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::codec::scalar_to_json;
use crate::error::Result;
use hepflow_core::types::RecordBatch;

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    // header order to keep column ordering stable across batches
    columns: Vec<String>,
}

impl JsonlWriter<File> {
    pub fn to_path(path: &Path, columns: Option<Vec<String>>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f, columns))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W, columns: Option<Vec<String>>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns: columns.unwrap_or_default(),
        }
    }

    /// Write a batch as one JSON object per line, columns looked up by name.
    /// If `columns` was empty, infer it from the first batch.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = batch.column_names();
        }
        let cols = self
            .columns
            .iter()
            .map(|n| batch.require_column(n))
            .collect::<hepflow_core::Result<Vec<_>>>()?;
        for r in 0..batch.num_rows() {
            let obj: BTreeMap<&str, serde_json::Value> = cols
                .iter()
                .map(|c| (c.name.as_str(), scalar_to_json(&c.values[r])))
                .collect();
            serde_json::to_writer(&mut self.writer, &obj)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
