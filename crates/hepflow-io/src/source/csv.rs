//! Flat CSV events with a header row.
//!
//! Record start positions are indexed at open; a chunk read seeks to the
//! first record of its range.

use std::fs::File;
use std::path::{Path, PathBuf};

use ::csv::{Position, ReaderBuilder, StringRecord};
use hepflow_core::id::SourceId;
use hepflow_core::schema::Schema;
use hepflow_core::types::{Column, RecordBatch};

use super::Source;
use crate::codec::cell_to_scalar;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct CsvSource {
    id: SourceId,
    url: String,
    path: PathBuf,
    schema: Schema,
    /// Header index of every schema field.
    header_index: Vec<usize>,
    positions: Vec<Position>,
}

impl CsvSource {
    pub fn open(id: SourceId, url: &str, path: &Path, schema: Schema) -> Result<Self> {
        if let Some(f) = schema.fields.iter().find(|f| f.data_type.is_list()) {
            return Err(Error::Unsupported(format!(
                "{url}: CSV holds flat columns only; '{}' is declared {}",
                f.name, f.data_type
            )));
        }
        let file = File::open(path).map_err(|e| Error::from_open(url, e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers()?.clone();
        let header_index = schema
            .fields
            .iter()
            .map(|f| {
                headers
                    .iter()
                    .position(|h| h == f.name)
                    .ok_or_else(|| hepflow_core::Error::ColumnNotFound {
                        column: f.name.clone(),
                        context: format!("CSV header of {url}"),
                    })
            })
            .collect::<hepflow_core::Result<Vec<_>>>()?;

        let mut positions = Vec::new();
        let mut record = StringRecord::new();
        loop {
            let pos = reader.position().clone();
            if !reader.read_record(&mut record)? {
                break;
            }
            positions.push(pos);
        }

        Ok(Self {
            id,
            url: url.to_string(),
            path: path.to_path_buf(),
            schema,
            header_index,
            positions,
        })
    }
}

impl Source for CsvSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn record_count(&self) -> u64 {
        self.positions.len() as u64
    }

    fn read_columns(&self, names: &[String], start: u64, stop: u64) -> Result<RecordBatch> {
        let selected = names
            .iter()
            .map(|n| {
                let idx = self
                    .schema
                    .index_of(n)
                    .ok_or_else(|| hepflow_core::Error::ColumnNotFound {
                        column: n.clone(),
                        context: self.url.clone(),
                    })?;
                Ok((&self.schema.fields[idx], self.header_index[idx]))
            })
            .collect::<hepflow_core::Result<Vec<_>>>()?;
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.clone(), Vec::new()))
            .collect();
        let Some(first) = self.positions.get(start as usize) else {
            return Ok(RecordBatch::new(columns)?);
        };

        let file = File::open(&self.path).map_err(|e| Error::from_open(&self.url, e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        reader.seek(first.clone())?;
        let mut record = StringRecord::new();
        for row in start..stop {
            if !reader.read_record(&mut record)? {
                return Err(Error::SourceUnavailable {
                    url: self.url.clone(),
                    reason: format!("file ended at record {row}, expected {stop}"),
                });
            }
            let context = format!("{} record {row}", self.url);
            for (col, (field, hidx)) in columns.iter_mut().zip(&selected) {
                let cell = record.get(*hidx).unwrap_or("");
                col.values.push(cell_to_scalar(cell, field, &context)?);
            }
        }
        Ok(RecordBatch::new(columns)?)
    }
}
