//! Partitioned, all-or-nothing dataset sink.
//!
//! Partition files and the `_SUCCESS` marker are written into a hidden
//! staging directory next to the destination, which is renamed into place
//! as the final step. A destination either holds a complete dataset with a
//! marker, or does not exist.

use std::fs;
use std::path::{Path, PathBuf};

use hepflow_core::dag::SinkFormat;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::{codec, readers, writers};

/// Marker file holding the serialized `WriteResult`.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Split the concatenated rows into near-even consecutive runs.
    #[default]
    Contiguous,
    /// Route each row by a hash of its key columns.
    Hash { keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOptions {
    pub format: SinkFormat,
    pub partitions: usize,
    pub strategy: PartitionStrategy,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            format: SinkFormat::Jsonl,
            partitions: 1,
            strategy: PartitionStrategy::Contiguous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    pub destination: String,
    pub format: SinkFormat,
    pub schema: Schema,
    pub strategy: PartitionStrategy,
    pub rows_per_partition: Vec<u64>,
    /// Partition file names relative to the destination, in partition order.
    pub files: Vec<String>,
}

impl WriteResult {
    pub fn total_rows(&self) -> u64 {
        self.rows_per_partition.iter().sum()
    }

    pub fn partitions(&self) -> usize {
        self.files.len()
    }
}

/// Split `batch` into exactly `partitions` batches, row order kept within each.
pub fn partition_rows(
    batch: &RecordBatch,
    partitions: usize,
    strategy: &PartitionStrategy,
) -> Result<Vec<RecordBatch>> {
    if partitions == 0 {
        return Err(hepflow_core::Error::Config("partition count must be > 0".into()).into());
    }
    let n = batch.num_rows();
    match strategy {
        PartitionStrategy::Contiguous => Ok((0..partitions)
            .map(|i| {
                let start = i * n / partitions;
                let stop = (i + 1) * n / partitions;
                batch.slice(start, stop - start)
            })
            .collect()),
        PartitionStrategy::Hash { keys } => {
            let assignment = batch.hash_columns(keys, partitions)?;
            let mut rows: Vec<Vec<usize>> = vec![Vec::new(); partitions];
            for (row, p) in assignment.into_iter().enumerate() {
                rows[p].push(row);
            }
            rows.iter()
                .map(|idx| Ok(batch.take(idx)?))
                .collect::<Result<Vec<_>>>()
        }
    }
}

/// Write `batches` (in order) as a partitioned dataset at `destination`.
pub fn write_partitioned(
    batches: &[RecordBatch],
    schema: &Schema,
    destination: &Path,
    opts: &SinkOptions,
) -> Result<WriteResult> {
    if opts.format == SinkFormat::Csv {
        codec::check_csv_schema(schema)?;
    }
    let names = schema.names();
    let selected = batches
        .iter()
        .map(|b| b.select(&names))
        .collect::<hepflow_core::Result<Vec<_>>>()?;
    let all = if selected.is_empty() {
        RecordBatch::empty(schema)
    } else {
        RecordBatch::concat(&selected)?
    };
    all.conforms_to(schema)?;
    let parts = partition_rows(&all, opts.partitions, &opts.strategy)?;

    let staging = stage_dir(destination)?;
    debug!(staging = %staging.display(), "staging sink output");

    let committed = write_parts(&staging, schema, &parts, opts).and_then(|files| {
        let result = WriteResult {
            destination: destination.display().to_string(),
            format: opts.format,
            schema: schema.clone(),
            strategy: opts.strategy.clone(),
            rows_per_partition: parts.iter().map(|p| p.num_rows() as u64).collect(),
            files,
        };
        let marker = serde_json::to_vec_pretty(&result)?;
        fs::write(staging.join(SUCCESS_MARKER), marker).map_err(|e| Error::unwritable(&staging, e))?;
        if destination.exists() {
            return Err(Error::unwritable(destination, "appeared while writing"));
        }
        fs::rename(&staging, destination).map_err(|e| Error::unwritable(destination, e))?;
        Ok(result)
    });

    match committed {
        Ok(result) => {
            info!(
                destination = %destination.display(),
                rows = result.total_rows(),
                partitions = result.partitions(),
                "sink committed"
            );
            Ok(result)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(staging = %staging.display(), error = %cleanup, "failed to remove staging directory");
            }
            Err(e)
        }
    }
}

/// Read back a committed dataset; refuses destinations without the marker.
pub fn read_partitioned(destination: &Path) -> Result<(WriteResult, Vec<RecordBatch>)> {
    let marker = destination.join(SUCCESS_MARKER);
    let bytes = fs::read(&marker).map_err(|e| Error::SourceUnavailable {
        url: destination.display().to_string(),
        reason: format!("no readable {SUCCESS_MARKER} marker: {e}"),
    })?;
    let result: WriteResult = serde_json::from_slice(&bytes)?;
    let batches = result
        .files
        .iter()
        .map(|f| readers::read_file(result.format, &destination.join(f), &result.schema))
        .collect::<Result<Vec<_>>>()?;
    Ok((result, batches))
}

fn stage_dir(destination: &Path) -> Result<PathBuf> {
    if destination.exists() {
        return Err(Error::unwritable(destination, "already exists"));
    }
    let name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::unwritable(destination, "no final path component"))?;
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| Error::unwritable(destination, e))?;
    let staging = parent.join(format!(".{name}.inprogress-{}", Uuid::new_v4().simple()));
    fs::create_dir(&staging).map_err(|e| Error::unwritable(destination, e))?;
    Ok(staging)
}

fn write_parts(
    staging: &Path,
    schema: &Schema,
    parts: &[RecordBatch],
    opts: &SinkOptions,
) -> Result<Vec<String>> {
    let mut files = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let name = format!("part-{i:05}.{}", opts.format.extension());
        writers::write_file(opts.format, &staging.join(&name), schema, part).map_err(|e| match e {
            Error::Io(io) => Error::unwritable(staging, io),
            other => other,
        })?;
        files.push(name);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::schema::{DataType, Field};
    use hepflow_core::types::{Column, Scalar};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("event", DataType::Int64, false),
            Field::new("mass", DataType::Float64, true),
        ])
    }

    fn batch(lo: i64, hi: i64) -> RecordBatch {
        RecordBatch::new(vec![
            Column::new("event", (lo..hi).map(Scalar::I64).collect()),
            Column::new(
                "mass",
                (lo..hi)
                    .map(|i| if i % 4 == 0 { Scalar::Null } else { Scalar::F64(i as f64 * 1.5) })
                    .collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn contiguous_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let input = vec![batch(0, 7), batch(7, 10)];
        let opts = SinkOptions {
            partitions: 3,
            ..Default::default()
        };
        let res = write_partitioned(&input, &schema(), &dest, &opts).unwrap();
        assert_eq!(res.rows_per_partition, vec![3, 3, 4]);
        assert_eq!(res.files[0], "part-00000.jsonl");

        let (back, parts) = read_partitioned(&dest).unwrap();
        assert_eq!(back, res);
        let joined = RecordBatch::concat(&parts).unwrap();
        assert_eq!(joined, RecordBatch::concat(&input).unwrap());
    }

    #[test]
    fn csv_round_trip_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/out");
        let opts = SinkOptions {
            format: SinkFormat::Csv,
            partitions: 2,
            ..Default::default()
        };
        write_partitioned(&[batch(0, 5)], &schema(), &dest, &opts).unwrap();
        let (_, parts) = read_partitioned(&dest).unwrap();
        assert_eq!(RecordBatch::concat(&parts).unwrap(), batch(0, 5));
    }

    #[test]
    fn hash_partitions_keep_order_and_rows() {
        let b = batch(0, 50);
        let parts = partition_rows(
            &b,
            4,
            &PartitionStrategy::Hash {
                keys: vec!["event".into()],
            },
        )
        .unwrap();
        assert_eq!(parts.len(), 4);
        let mut total = 0;
        for p in &parts {
            total += p.num_rows();
            let ev: Vec<i64> = p
                .column("event")
                .unwrap()
                .values
                .iter()
                .filter_map(|v| v.as_i64())
                .collect();
            assert!(ev.windows(2).all(|w| w[0] < w[1]));
        }
        assert_eq!(total, 50);
    }

    #[test]
    fn more_partitions_than_rows() {
        let parts = partition_rows(&batch(0, 2), 5, &PartitionStrategy::Contiguous).unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().map(|p| p.num_rows()).sum::<usize>(), 2);
    }

    #[test]
    fn existing_destination_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();
        let err = write_partitioned(&[batch(0, 3)], &schema(), &dest, &SinkOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::DestinationUnwritable { .. }));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let list_schema = Schema::new(vec![Field::new(
            "pt",
            DataType::List(Box::new(DataType::Float64)),
            false,
        )]);
        let b = RecordBatch::new(vec![Column::new(
            "pt",
            vec![Scalar::List(vec![Scalar::F64(1.0)])],
        )])
        .unwrap();
        let opts = SinkOptions {
            format: SinkFormat::Csv,
            ..Default::default()
        };
        assert!(write_partitioned(&[b], &list_schema, &dest, &opts).is_err());
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unmarked_destination_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("half");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("part-00000.jsonl"), "{}\n").unwrap();
        assert!(matches!(
            read_partitioned(&dest),
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn csv_sink_refuses_nullable_strings() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tags");
        let schema = Schema::new(vec![Field::new("tag", DataType::Utf8, true)]);
        let b = RecordBatch::new(vec![Column::new(
            "tag",
            vec![Scalar::Str("mu".into()), Scalar::Null],
        )])
        .unwrap();
        let opts = SinkOptions {
            format: SinkFormat::Csv,
            partitions: 1,
            strategy: PartitionStrategy::Contiguous,
        };
        assert!(matches!(
            write_partitioned(&[b], &schema, &dest, &opts),
            Err(Error::Unsupported(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
