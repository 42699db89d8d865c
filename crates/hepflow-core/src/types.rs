//! Lightweight columnar value types: `Scalar`, `Column`, `RecordBatch`.
//!
//! Batches are immutable once built: every helper here returns a new batch.
//! Jagged physics collections (muons per event) are `Scalar::List` values in
//! a column whose declared type is `DataType::List`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    List(Vec<Scalar>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view; `None` for nulls, strings, booleans and lists.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(*v as i64),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Scalar::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this value may be stored in a column of type `dt`.
    /// Nulls conform to every type; nullability is checked by the caller.
    pub fn conforms_to(&self, dt: &DataType) -> bool {
        match (self, dt) {
            (Scalar::Null, _) => true,
            (Scalar::Bool(_), DataType::Boolean) => true,
            (Scalar::I32(_), DataType::Int32) => true,
            (Scalar::I64(_), DataType::Int64) => true,
            (Scalar::F32(_), DataType::Float32) => true,
            (Scalar::F64(_), DataType::Float64) => true,
            (Scalar::Str(_), DataType::Utf8) => true,
            (Scalar::List(items), DataType::List(inner)) => {
                items.iter().all(|v| !v.is_null() && v.conforms_to(inner))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Named equal-length columns, one row per record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<Column>,
}

impl RecordBatch {
    /// Build a batch, checking equal column lengths and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            for c in &columns {
                if c.len() != first.len() {
                    return Err(Error::Schema(format!(
                        "column '{}' has {} rows, expected {} (from '{}')",
                        c.name,
                        c.len(),
                        first.len(),
                        first.name
                    )));
                }
            }
        }
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|o| o.name == c.name) {
                return Err(Error::Schema(format!("duplicate column '{}'", c.name)));
            }
        }
        Ok(Self { columns })
    }

    /// Zero-row batch carrying the schema's column names.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema
                .fields
                .iter()
                .map(|f| Column::new(f.name.clone(), Vec::new()))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| Error::ColumnNotFound {
            column: name.to_string(),
            context: format!("batch with columns {:?}", self.column_names()),
        })
    }

    /// Keep rows whose mask entry is `true`, preserving order.
    pub fn filter(&self, mask: &[bool]) -> Result<RecordBatch> {
        if mask.len() != self.num_rows() {
            return Err(Error::Invariant(format!(
                "mask length {} does not match {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|col| Column {
                name: col.name.clone(),
                values: col
                    .values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect(),
            })
            .collect();
        Ok(RecordBatch { columns })
    }

    /// Gather rows by index (indices may repeat; order follows `indices`).
    pub fn take(&self, indices: &[usize]) -> Result<RecordBatch> {
        let n = self.num_rows();
        if let Some(bad) = indices.iter().find(|&&i| i >= n) {
            return Err(Error::Invariant(format!(
                "row index {bad} out of bounds for {n} rows"
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|col| Column {
                name: col.name.clone(),
                values: indices.iter().map(|&i| col.values[i].clone()).collect(),
            })
            .collect();
        Ok(RecordBatch { columns })
    }

    /// Rows `[start, start + len)`, clamped to the batch.
    pub fn slice(&self, start: usize, len: usize) -> RecordBatch {
        let n = self.num_rows();
        let start = start.min(n);
        let end = start.saturating_add(len).min(n);
        RecordBatch {
            columns: self
                .columns
                .iter()
                .map(|col| Column {
                    name: col.name.clone(),
                    values: col.values[start..end].to_vec(),
                })
                .collect(),
        }
    }

    /// Keep only `names`, in that order.
    pub fn select(&self, names: &[String]) -> Result<RecordBatch> {
        let columns = names
            .iter()
            .map(|n| self.require_column(n).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch { columns })
    }

    /// Append a column (or replace one with the same name).
    pub fn with_column(&self, column: Column) -> Result<RecordBatch> {
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(Error::Schema(format!(
                "column '{}' has {} rows, batch has {}",
                column.name,
                column.len(),
                self.num_rows()
            )));
        }
        let mut columns = self.columns.clone();
        match columns.iter_mut().find(|c| c.name == column.name) {
            Some(slot) => *slot = column,
            None => columns.push(column),
        }
        Ok(RecordBatch { columns })
    }

    /// Stack batches vertically. All batches must share column names and order.
    pub fn concat(batches: &[RecordBatch]) -> Result<RecordBatch> {
        let Some(first) = batches.first() else {
            return Ok(RecordBatch::default());
        };
        let names = first.column_names();
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.clone(), Vec::new()))
            .collect();
        for b in batches {
            if b.column_names() != names {
                return Err(Error::Schema(format!(
                    "cannot concat batches with columns {:?} and {:?}",
                    names,
                    b.column_names()
                )));
            }
            for (dst, src) in columns.iter_mut().zip(&b.columns) {
                dst.values.extend(src.values.iter().cloned());
            }
        }
        Ok(RecordBatch { columns })
    }

    /// Check names, types and nullability against `schema` (same column order).
    pub fn conforms_to(&self, schema: &Schema) -> Result<()> {
        if self.column_names() != schema.names() {
            return Err(Error::Schema(format!(
                "batch columns {:?} do not match schema {:?}",
                self.column_names(),
                schema.names()
            )));
        }
        for (col, field) in self.columns.iter().zip(&schema.fields) {
            for (row, v) in col.values.iter().enumerate() {
                if v.is_null() && !field.nullable {
                    return Err(Error::Schema(format!(
                        "null in non-nullable column '{}' at row {row}",
                        field.name
                    )));
                }
                if !v.conforms_to(&field.data_type) {
                    return Err(Error::Schema(format!(
                        "value {:?} in column '{}' at row {row} is not {}",
                        v, field.name, field.data_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// Compute a hash partition index for each row based on `hash_keys`.
    pub fn hash_columns(&self, hash_keys: &[String], num_partitions: usize) -> Result<Vec<usize>> {
        if num_partitions == 0 {
            return Err(Error::Config("num_partitions must be > 0".into()));
        }
        let num_rows = self.num_rows();
        if num_rows == 0 {
            return Ok(Vec::new());
        }

        let key_indices: Vec<usize> = hash_keys
            .iter()
            .map(|key| {
                self.columns
                    .iter()
                    .position(|c| &c.name == key)
                    .ok_or_else(|| Error::ColumnNotFound {
                        column: key.clone(),
                        context: "hash partition keys".into(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = Vec::with_capacity(num_rows);
        for row_idx in 0..num_rows {
            let mut hasher = blake3::Hasher::new();
            for &col_idx in &key_indices {
                hash_scalar(&self.columns[col_idx].values[row_idx], &mut hasher);
            }
            let hash = hasher.finalize();
            let mut head = [0u8; 8];
            head.copy_from_slice(&hash.as_bytes()[0..8]);
            result.push((u64::from_le_bytes(head) % num_partitions as u64) as usize);
        }

        Ok(result)
    }
}

/// Type discriminant written ahead of each hashed value.
fn scalar_type_order(s: &Scalar) -> u8 {
    use Scalar::*;
    match s {
        Null => 0,
        Bool(_) => 1,
        I32(_) => 2,
        I64(_) => 3,
        F32(_) => 4,
        F64(_) => 5,
        Str(_) => 6,
        List(_) => 7,
    }
}

/// Hash a scalar value into a hasher.
fn hash_scalar(scalar: &Scalar, hasher: &mut blake3::Hasher) {
    use Scalar::*;

    hasher.update(&[scalar_type_order(scalar)]);

    match scalar {
        Null => {}
        Bool(b) => {
            hasher.update(&[*b as u8]);
        }
        I32(i) => {
            hasher.update(&i.to_le_bytes());
        }
        I64(i) => {
            hasher.update(&i.to_le_bytes());
        }
        F32(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        F64(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Str(s) => {
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        List(items) => {
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_scalar(item, hasher);
            }
        }
    }
}
