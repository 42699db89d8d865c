//! Event sources and the context that opens them.
//!
//! A `Source` is an immutable, schema-described dataset partition with a
//! known record count. Reads take `&self` and open their own file handles,
//! so one source can serve many concurrent chunk loads without locking.

mod csv;
mod jsonl;
mod memory;

pub use self::csv::CsvSource;
pub use jsonl::JsonlSource;
pub use memory::{MemorySource, MemoryTable};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hepflow_core::id::SourceId;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

pub trait Source: Send + Sync + std::fmt::Debug {
    fn id(&self) -> SourceId;

    /// URL the source was opened from.
    fn url(&self) -> &str;

    fn schema(&self) -> &Schema;

    fn record_count(&self) -> u64;

    /// Read `names` for records `[start, stop)`, columns in `names` order.
    fn read_columns(&self, names: &[String], start: u64, stop: u64) -> Result<RecordBatch>;
}

/// Where a URL points after scheme dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory(String),
    Jsonl(PathBuf),
    Csv(PathBuf),
}

const REMOTE_SCHEMES: &[&str] = &["http", "https", "root", "xroot", "s3", "gs", "gcs", "davs"];

fn resolve(url: &str) -> Result<Location> {
    if let Some(name) = url.strip_prefix("memory://") {
        return Ok(Location::Memory(name.to_string()));
    }
    let path = match Url::parse(url) {
        Ok(parsed) if REMOTE_SCHEMES.contains(&parsed.scheme()) => {
            return Err(Error::SourceUnavailable {
                url: url.to_string(),
                reason: format!("remote scheme '{}' is not readable here", parsed.scheme()),
            })
        }
        Ok(parsed) if parsed.scheme() == "file" => {
            parsed.to_file_path().map_err(|_| Error::SourceUnavailable {
                url: url.to_string(),
                reason: "not a local file path".into(),
            })?
        }
        // Single-letter schemes are Windows drive prefixes.
        Ok(parsed) if parsed.scheme().len() > 1 => {
            return Err(Error::SourceUnavailable {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            })
        }
        _ => PathBuf::from(url),
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl" | "ndjson" | "json") => Ok(Location::Jsonl(path)),
        Some("csv") => Ok(Location::Csv(path)),
        other => Err(Error::SourceUnavailable {
            url: url.to_string(),
            reason: format!("unrecognized file format {other:?}"),
        }),
    }
}

/// Opens sources and owns their lifecycle.
///
/// Create one per workflow run, `open` every source, pass the handles to the
/// executor, and `close` at the end. In-memory tables are registered up
/// front and addressed as `memory://<name>`.
#[derive(Debug, Default)]
pub struct SourceContext {
    tables: Mutex<HashMap<String, MemoryTable>>,
    opened: Mutex<Vec<Arc<dyn Source>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl SourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-memory table under `name`. The batch must conform to `schema`.
    pub fn register(&self, name: impl Into<String>, table: MemoryTable) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        debug!(table = %name, rows = table.batch.num_rows(), "registered memory table");
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, table);
        Ok(())
    }

    /// Open `url` with the declared `schema`.
    pub fn open(&self, url: &str, schema: &Schema) -> Result<Arc<dyn Source>> {
        self.ensure_open()?;
        schema.validate()?;
        let id = SourceId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let source: Arc<dyn Source> = match resolve(url)? {
            Location::Memory(name) => {
                let table = self
                    .tables
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::SourceUnavailable {
                        url: url.to_string(),
                        reason: format!("no memory table named '{name}'"),
                    })?;
                Arc::new(MemorySource::new(id, url, schema.clone(), table)?)
            }
            Location::Jsonl(path) => Arc::new(JsonlSource::open(id, url, &path, schema.clone())?),
            Location::Csv(path) => Arc::new(CsvSource::open(id, url, &path, schema.clone())?),
        };
        info!(%url, source = %id, records = source.record_count(), "opened source");
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&source));
        Ok(source)
    }

    /// Handles opened so far, in open order.
    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Release every handle and registered table. Further opens fail.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let n = {
            let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
            let n = opened.len();
            opened.clear();
            n
        };
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!(sources = n, "source context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::schema::{DataType, Field};
    use hepflow_core::types::{Column, Scalar};

    fn schema() -> Schema {
        Schema::new(vec![Field::new("nMuon", DataType::Int32, false)])
    }

    #[test]
    fn resolves_schemes() {
        assert_eq!(
            resolve("memory://events").unwrap(),
            Location::Memory("events".into())
        );
        assert_eq!(
            resolve("/data/run1.jsonl").unwrap(),
            Location::Jsonl(PathBuf::from("/data/run1.jsonl"))
        );
        assert_eq!(
            resolve("file:///data/run1.csv").unwrap(),
            Location::Csv(PathBuf::from("/data/run1.csv"))
        );
        for remote in ["root://eos.example/x.root", "https://x/y.jsonl", "s3://b/k.csv"] {
            assert!(matches!(resolve(remote), Err(Error::SourceUnavailable { .. })));
        }
        assert!(resolve("/data/run1.root").is_err());
    }

    #[test]
    fn memory_open_and_close() {
        let ctx = SourceContext::new();
        let batch = RecordBatch::new(vec![Column::new(
            "nMuon",
            vec![Scalar::I32(1), Scalar::I32(2)],
        )])
        .unwrap();
        ctx.register("ev", MemoryTable::new(schema(), batch).unwrap())
            .unwrap();
        let s = ctx.open("memory://ev", &schema()).unwrap();
        assert_eq!(s.record_count(), 2);
        assert_eq!(ctx.sources().len(), 1);

        ctx.close();
        assert!(ctx.sources().is_empty());
        assert!(matches!(ctx.open("memory://ev", &schema()), Err(Error::Closed)));
        // Handles already given out stay readable.
        assert_eq!(s.read_columns(&["nMuon".into()], 0, 1).unwrap().num_rows(), 1);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let ctx = SourceContext::new();
        assert!(matches!(
            ctx.open("/definitely/not/here.jsonl", &schema()),
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn unknown_memory_table_is_unavailable() {
        let ctx = SourceContext::new();
        assert!(matches!(
            ctx.open("memory://nope", &schema()),
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
