//! Line-delimited JSON events: one object per line, jagged columns as arrays.
//!
//! Line start offsets are indexed once at open, so a chunk read seeks
//! straight to its first record. Every schema field must be present as a
//! key (an explicit `null` is a null value, a missing key is an error).

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use hepflow_core::id::SourceId;
use hepflow_core::schema::Schema;
use hepflow_core::types::{Column, RecordBatch};

use super::Source;
use crate::codec::json_to_scalar;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct JsonlSource {
    id: SourceId,
    url: String,
    path: PathBuf,
    schema: Schema,
    offsets: Vec<u64>,
}

impl JsonlSource {
    pub fn open(id: SourceId, url: &str, path: &Path, schema: Schema) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::from_open(url, e))?;
        let mut reader = BufReader::new(file);
        let mut offsets = Vec::new();
        let mut pos = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            if !line.trim().is_empty() {
                if offsets.is_empty() {
                    check_keys(&line, &schema, url)?;
                }
                offsets.push(pos);
            }
            pos += n as u64;
        }
        Ok(Self {
            id,
            url: url.to_string(),
            path: path.to_path_buf(),
            schema,
            offsets,
        })
    }
}

/// The first record must carry every schema field.
fn check_keys(line: &str, schema: &Schema, url: &str) -> Result<()> {
    let obj: serde_json::Value = serde_json::from_str(line).map_err(|e| Error::Decode {
        context: format!("{url} record 0"),
        msg: e.to_string(),
    })?;
    let Some(map) = obj.as_object() else {
        return Err(Error::Decode {
            context: format!("{url} record 0"),
            msg: "expected a JSON object".into(),
        });
    };
    if let Some(f) = schema.fields.iter().find(|f| !map.contains_key(&f.name)) {
        return Err(hepflow_core::Error::ColumnNotFound {
            column: f.name.clone(),
            context: format!("first record of {url}"),
        }
        .into());
    }
    Ok(())
}

impl Source for JsonlSource {
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
        self.offsets.len() as u64
    }

    fn read_columns(&self, names: &[String], start: u64, stop: u64) -> Result<RecordBatch> {
        let fields = names
            .iter()
            .map(|n| self.schema.require(n, &self.url).cloned())
            .collect::<hepflow_core::Result<Vec<_>>>()?;
        let mut columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.clone(), Vec::with_capacity(stop.saturating_sub(start) as usize)))
            .collect();
        let Some(&first) = self.offsets.get(start as usize) else {
            return Ok(RecordBatch::new(columns)?);
        };

        let mut file = File::open(&self.path).map_err(|e| Error::from_open(&self.url, e))?;
        file.seek(SeekFrom::Start(first))?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut record = start;
        while record < stop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(Error::SourceUnavailable {
                    url: self.url.clone(),
                    reason: format!("file ended at record {record}, expected {stop}"),
                });
            }
            if line.trim().is_empty() {
                continue;
            }
            let context = format!("{} record {record}", self.url);
            let obj: serde_json::Value = serde_json::from_str(&line).map_err(|e| Error::Decode {
                context: context.clone(),
                msg: e.to_string(),
            })?;
            for (col, field) in columns.iter_mut().zip(&fields) {
                let v = obj.get(&field.name).ok_or_else(|| hepflow_core::Error::ColumnNotFound {
                    column: field.name.clone(),
                    context: context.clone(),
                })?;
                col.values.push(json_to_scalar(v, field, &context)?);
            }
            record += 1;
        }
        Ok(RecordBatch::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::schema::{DataType, Field};
    use hepflow_core::types::Scalar;
    use std::io::Write;

    #[test]
    fn random_range_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev.jsonl");
        let mut f = File::create(&path).unwrap();
        for i in 0..10 {
            writeln!(f, r#"{{"n": {i}, "pt": [{i}.5]}}"#).unwrap();
            if i == 4 {
                writeln!(f).unwrap();
            }
        }
        drop(f);

        let schema = Schema::new(vec![
            Field::new("n", DataType::Int64, false),
            Field::new("pt", DataType::List(Box::new(DataType::Float64)), false),
        ]);
        let src = JsonlSource::open(SourceId::new(0), "ev.jsonl", &path, schema).unwrap();
        assert_eq!(src.record_count(), 10);

        let b = src.read_columns(&["pt".into(), "n".into()], 4, 7).unwrap();
        assert_eq!(b.column_names(), vec!["pt", "n"]);
        assert_eq!(
            b.column("n").unwrap().values,
            vec![Scalar::I64(4), Scalar::I64(5), Scalar::I64(6)]
        );
        assert_eq!(
            b.column("pt").unwrap().values[0],
            Scalar::List(vec![Scalar::F64(4.5)])
        );
    }

    #[test]
    fn bad_line_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"n\": 1}\nnot json\n").unwrap();
        let schema = Schema::new(vec![Field::new("n", DataType::Int64, false)]);
        let src = JsonlSource::open(SourceId::new(0), "bad.jsonl", &path, schema).unwrap();
        assert!(matches!(
            src.read_columns(&["n".into()], 0, 2),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn missing_key_is_column_not_found_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev.jsonl");
        std::fs::write(&path, "{\"nMuon\": 2}\n{\"nMuon\": 1}\n").unwrap();
        let schema = Schema::new(vec![
            Field::new("nMuon", DataType::Int32, false),
            Field::new("Muon_ptt", DataType::List(Box::new(DataType::Float64)), true),
        ]);
        assert!(matches!(
            JsonlSource::open(SourceId::new(0), "ev.jsonl", &path, schema),
            Err(Error::Core(hepflow_core::Error::ColumnNotFound { ref column, .. })) if column == "Muon_ptt"
        ));
    }

    #[test]
    fn explicit_null_differs_from_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev.jsonl");
        std::fs::write(&path, "{\"n\": 1, \"w\": null}\n{\"n\": 2}\n").unwrap();
        let schema = Schema::new(vec![
            Field::new("n", DataType::Int64, false),
            Field::new("w", DataType::Float64, true),
        ]);
        let src = JsonlSource::open(SourceId::new(0), "ev.jsonl", &path, schema).unwrap();
        let first = src.read_columns(&["w".into()], 0, 1).unwrap();
        assert_eq!(first.column("w").unwrap().values, vec![Scalar::Null]);
        assert!(matches!(
            src.read_columns(&["w".into()], 1, 2),
            Err(Error::Core(hepflow_core::Error::ColumnNotFound { .. }))
        ));
    }
}
