use std::path::Path;

use hepflow_core::schema::Schema;
use hepflow_core::types::{Column, RecordBatch};

use crate::codec::cell_to_scalar;
use crate::error::Result;

/// Read a CSV file (header row required) into one batch with `schema`'s columns.
pub fn read_path(path: &Path, schema: &Schema) -> Result<RecordBatch> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let index = schema
        .fields
        .iter()
        .map(|f| {
            headers
                .iter()
                .position(|h| h == f.name)
                .ok_or_else(|| hepflow_core::Error::ColumnNotFound {
                    column: f.name.clone(),
                    context: format!("CSV header of {}", path.display()),
                })
        })
        .collect::<hepflow_core::Result<Vec<_>>>()?;
    let mut columns: Vec<Column> = schema
        .fields
        .iter()
        .map(|f| Column::new(f.name.clone(), Vec::new()))
        .collect();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let context = format!("{} row {row}", path.display());
        for ((col, field), &i) in columns.iter_mut().zip(&schema.fields).zip(&index) {
            col.values
                .push(cell_to_scalar(record.get(i).unwrap_or(""), field, &context)?);
        }
    }
    Ok(RecordBatch::new(columns)?)
}
