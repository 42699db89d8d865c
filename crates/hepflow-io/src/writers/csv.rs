//! CSV writer for flat columns; nulls are written as empty cells.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::codec::scalar_to_cell;
use crate::error::Result;
use hepflow_core::types::RecordBatch;

pub struct CsvWriter<W: Write> {
    writer: ::csv::Writer<W>,
    columns: Vec<String>,
}

impl CsvWriter<File> {
    pub fn to_path(path: &Path, columns: Vec<String>) -> Result<Self> {
        let f = File::create(path)?;
        Self::to_writer(f, columns)
    }
}

impl<W: Write> CsvWriter<W> {
    /// Writes the header row immediately.
    pub fn to_writer(writer: W, columns: Vec<String>) -> Result<Self> {
        let mut writer = ::csv::Writer::from_writer(writer);
        writer.write_record(&columns)?;
        Ok(Self { writer, columns })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let cols = self
            .columns
            .iter()
            .map(|n| batch.require_column(n))
            .collect::<hepflow_core::Result<Vec<_>>>()?;
        let mut row = Vec::with_capacity(cols.len());
        for r in 0..batch.num_rows() {
            row.clear();
            for c in &cols {
                row.push(scalar_to_cell(&c.values[r], &c.name)?);
            }
            self.writer.write_record(&row)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
