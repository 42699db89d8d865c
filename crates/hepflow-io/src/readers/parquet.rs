//! Parquet partition reader (enabled with `--features parquet`).

use std::fs::File;
use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int32Type, Int64Type};
use arrow_array::Array;
use hepflow_core::schema::{DataType, Schema};
use hepflow_core::types::{Column, RecordBatch, Scalar};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{Error, Result};
use crate::writers::parquet::to_arrow_type;

pub fn read_path(path: &Path, schema: &Schema) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|b| b.build())
        .map_err(|e| Error::Parquet(e.to_string()))?;
    let mut columns: Vec<Column> = schema
        .fields
        .iter()
        .map(|f| Column::new(f.name.clone(), Vec::new()))
        .collect();
    for rb in reader {
        let rb = rb.map_err(|e| Error::Parquet(e.to_string()))?;
        for (col, field) in columns.iter_mut().zip(&schema.fields) {
            let array = rb
                .column_by_name(&field.name)
                .ok_or_else(|| hepflow_core::Error::ColumnNotFound {
                    column: field.name.clone(),
                    context: path.display().to_string(),
                })?;
            let expected = to_arrow_type(&field.data_type)?;
            if array.data_type() != &expected {
                return Err(Error::Decode {
                    context: path.display().to_string(),
                    msg: format!(
                        "column '{}' is {} in the file, expected {expected}",
                        field.name,
                        array.data_type()
                    ),
                });
            }
            for i in 0..array.len() {
                col.values.push(if array.is_null(i) {
                    Scalar::Null
                } else {
                    match &field.data_type {
                        DataType::Boolean => Scalar::Bool(array.as_boolean().value(i)),
                        DataType::Int32 => Scalar::I32(array.as_primitive::<Int32Type>().value(i)),
                        DataType::Int64 => Scalar::I64(array.as_primitive::<Int64Type>().value(i)),
                        DataType::Float32 => {
                            Scalar::F32(array.as_primitive::<Float32Type>().value(i))
                        }
                        DataType::Float64 => {
                            Scalar::F64(array.as_primitive::<Float64Type>().value(i))
                        }
                        DataType::Utf8 => Scalar::Str(array.as_string::<i32>().value(i).to_string()),
                        DataType::List(_) => {
                            return Err(Error::Unsupported(format!(
                                "parquet reader handles flat columns only, got {}",
                                field.data_type
                            )))
                        }
                    }
                });
            }
        }
    }
    Ok(RecordBatch::new(columns)?)
}
