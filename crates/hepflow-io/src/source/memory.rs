//! In-memory tables, addressed as `memory://<name>`.

use std::sync::Arc;

use hepflow_core::id::SourceId;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;

use super::Source;
use crate::error::{Error, Result};

/// A registered table: its full schema plus the rows.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub schema: Schema,
    pub batch: Arc<RecordBatch>,
}

impl MemoryTable {
    pub fn new(schema: Schema, batch: RecordBatch) -> Result<Self> {
        batch.conforms_to(&schema)?;
        Ok(Self {
            schema,
            batch: Arc::new(batch),
        })
    }
}

#[derive(Debug)]
pub struct MemorySource {
    id: SourceId,
    url: String,
    schema: Schema,
    table: MemoryTable,
}

impl MemorySource {
    /// Every field of the declared `schema` must exist in the table with the same type.
    pub fn new(id: SourceId, url: &str, schema: Schema, table: MemoryTable) -> Result<Self> {
        for f in &schema.fields {
            let have = table.schema.require(&f.name, url)?;
            if have.data_type != f.data_type {
                return Err(Error::Core(hepflow_core::Error::Schema(format!(
                    "{url}: column '{}' is {} in the table but declared {}",
                    f.name, have.data_type, f.data_type
                ))));
            }
        }
        Ok(Self {
            id,
            url: url.to_string(),
            schema,
            table,
        })
    }
}

impl Source for MemorySource {
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
        self.table.batch.num_rows() as u64
    }

    fn read_columns(&self, names: &[String], start: u64, stop: u64) -> Result<RecordBatch> {
        let len = stop.saturating_sub(start) as usize;
        Ok(self.table.batch.select(names)?.slice(start as usize, len))
    }
}
