use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hepflow_core::schema::Schema;
use hepflow_core::types::{Column, RecordBatch};

use crate::codec::json_to_scalar;
use crate::error::{Error, Result};

/// Read an NDJSON file into one batch with `schema`'s columns.
pub fn read_path(path: &Path, schema: &Schema) -> Result<RecordBatch> {
    let reader = BufReader::new(File::open(path)?);
    let mut columns: Vec<Column> = schema
        .fields
        .iter()
        .map(|f| Column::new(f.name.clone(), Vec::new()))
        .collect();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let context = format!("{} line {}", path.display(), lineno + 1);
        let obj: serde_json::Value = serde_json::from_str(&line).map_err(|e| Error::Decode {
            context: context.clone(),
            msg: e.to_string(),
        })?;
        for (col, field) in columns.iter_mut().zip(&schema.fields) {
            let v = obj.get(&field.name).unwrap_or(&serde_json::Value::Null);
            col.values.push(json_to_scalar(v, field, &context)?);
        }
    }
    Ok(RecordBatch::new(columns)?)
}
