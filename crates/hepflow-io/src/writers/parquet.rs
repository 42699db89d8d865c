//! Parquet partition writer (enabled with `--features parquet`).
//!
//! Flat columns map onto nullable Arrow arrays; list columns are rejected.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch as ArrowBatch,
    StringArray,
};
use arrow_schema::{DataType as ArrowType, Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use hepflow_core::schema::{DataType, Schema};
use hepflow_core::types::{Column, RecordBatch, Scalar};
use parquet::arrow::ArrowWriter;

use crate::error::{Error, Result};

pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    schema: Schema,
    arrow_schema: SchemaRef,
}

impl ParquetWriter {
    pub fn to_path(path: &Path, schema: &Schema) -> Result<Self> {
        let arrow_schema = Arc::new(to_arrow_schema(schema)?);
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&arrow_schema), None)
            .map_err(|e| Error::Parquet(e.to_string()))?;
        Ok(Self {
            writer,
            schema: schema.clone(),
            arrow_schema,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let arrays = self
            .schema
            .fields
            .iter()
            .map(|f| to_array(batch.require_column(&f.name)?, &f.data_type))
            .collect::<Result<Vec<_>>>()?;
        let rb = ArrowBatch::try_new(Arc::clone(&self.arrow_schema), arrays)
            .map_err(|e| Error::Parquet(e.to_string()))?;
        self.writer
            .write(&rb)
            .map_err(|e| Error::Parquet(e.to_string()))
    }

    pub fn close(self) -> Result<()> {
        self.writer
            .close()
            .map_err(|e| Error::Parquet(e.to_string()))?;
        Ok(())
    }
}

pub(crate) fn to_arrow_type(dt: &DataType) -> Result<ArrowType> {
    Ok(match dt {
        DataType::Boolean => ArrowType::Boolean,
        DataType::Int32 => ArrowType::Int32,
        DataType::Int64 => ArrowType::Int64,
        DataType::Float32 => ArrowType::Float32,
        DataType::Float64 => ArrowType::Float64,
        DataType::Utf8 => ArrowType::Utf8,
        DataType::List(_) => {
            return Err(Error::Unsupported(format!(
                "parquet sink writes flat columns only, got {dt}"
            )))
        }
    })
}

fn to_arrow_schema(schema: &Schema) -> Result<ArrowSchema> {
    let fields = schema
        .fields
        .iter()
        .map(|f| Ok(ArrowField::new(&f.name, to_arrow_type(&f.data_type)?, true)))
        .collect::<Result<Vec<_>>>()?;
    Ok(ArrowSchema::new(fields))
}

fn to_array(col: &Column, dt: &DataType) -> Result<ArrayRef> {
    let mismatch = |v: &Scalar| {
        Error::Unsupported(format!("value {v:?} in column '{}' is not {dt}", col.name))
    };
    macro_rules! build {
        ($array:ty, $pat:path) => {{
            let values = col
                .values
                .iter()
                .map(|v| match v {
                    Scalar::Null => Ok(None),
                    $pat(x) => Ok(Some(x.clone())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(<$array>::from(values)) as ArrayRef
        }};
    }
    Ok(match dt {
        DataType::Boolean => build!(BooleanArray, Scalar::Bool),
        DataType::Int32 => build!(Int32Array, Scalar::I32),
        DataType::Int64 => build!(Int64Array, Scalar::I64),
        DataType::Float32 => build!(Float32Array, Scalar::F32),
        DataType::Float64 => build!(Float64Array, Scalar::F64),
        DataType::Utf8 => build!(StringArray, Scalar::Str),
        DataType::List(_) => return Err(mismatch(&Scalar::Null)),
    })
}
