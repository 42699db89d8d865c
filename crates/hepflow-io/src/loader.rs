//! Record loader: a source bound to a column selection.
//!
//! The selection is validated against the source schema at construction,
//! so `ColumnNotFound` surfaces before any chunk is scheduled.

use std::sync::Arc;

use hepflow_core::range::ChunkRange;
use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use tracing::trace;

use crate::error::{Error, Result};
use crate::source::Source;

#[derive(Debug, Clone)]
pub struct RecordLoader {
    source: Arc<dyn Source>,
    columns: Vec<String>,
    schema: Schema,
}

impl RecordLoader {
    pub fn new(source: Arc<dyn Source>, columns: Vec<String>) -> Result<Self> {
        let schema = source
            .schema()
            .project(&columns, &format!("source {}", source.url()))?;
        schema.validate()?;
        Ok(Self {
            source,
            columns,
            schema,
        })
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Schema of every batch this loader produces.
    pub fn output_schema(&self) -> &Schema {
        &self.schema
    }

    /// Read one chunk. The range must belong to this loader's source.
    pub fn load(&self, range: &ChunkRange) -> Result<RecordBatch> {
        if range.source != self.source.id() {
            return Err(Error::Core(hepflow_core::Error::Range(format!(
                "{range} does not belong to {} ({})",
                self.source.id(),
                self.source.url()
            ))));
        }
        range.check_within(self.source.record_count())?;
        trace!(%range, "loading chunk");
        let batch = self
            .source
            .read_columns(&self.columns, range.start, range.stop)?;
        if batch.num_rows() as u64 != range.len() {
            return Err(Error::Core(hepflow_core::Error::Invariant(format!(
                "{range} produced {} rows",
                batch.num_rows()
            ))));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryTable, SourceContext};
    use hepflow_core::id::SourceId;
    use hepflow_core::schema::{DataType, Field};
    use hepflow_core::types::{Column, Scalar};

    fn ctx() -> (SourceContext, Arc<dyn Source>) {
        let schema = Schema::new(vec![
            Field::new("event", DataType::Int64, false),
            Field::new("nMuon", DataType::Int32, false),
        ]);
        let batch = RecordBatch::new(vec![
            Column::new("event", (0..10).map(Scalar::I64).collect()),
            Column::new("nMuon", (0..10).map(|i| Scalar::I32(i % 3)).collect()),
        ])
        .unwrap();
        let ctx = SourceContext::new();
        ctx.register("ev", MemoryTable::new(schema.clone(), batch).unwrap())
            .unwrap();
        let src = ctx.open("memory://ev", &schema).unwrap();
        (ctx, src)
    }

    #[test]
    fn unknown_column_fails_at_construction() {
        let (_ctx, src) = ctx();
        let err = RecordLoader::new(src, vec!["Muon_pt".into()]).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(hepflow_core::Error::ColumnNotFound { ref column, .. }) if column == "Muon_pt"
        ));
    }

    #[test]
    fn loads_selected_columns() {
        let (_ctx, src) = ctx();
        let id = src.id();
        let loader = RecordLoader::new(src, vec!["nMuon".into()]).unwrap();
        let b = loader.load(&ChunkRange::new(id, 3, 6).unwrap()).unwrap();
        assert_eq!(b.column_names(), vec!["nMuon"]);
        assert_eq!(
            b.column("nMuon").unwrap().values,
            vec![Scalar::I32(0), Scalar::I32(1), Scalar::I32(2)]
        );
    }

    #[test]
    fn rejects_foreign_or_out_of_bounds_ranges() {
        let (_ctx, src) = ctx();
        let id = src.id();
        let loader = RecordLoader::new(src, vec!["event".into()]).unwrap();
        let foreign = ChunkRange::new(SourceId::new(id.get() + 7), 0, 1).unwrap();
        assert!(loader.load(&foreign).is_err());
        assert!(loader.load(&ChunkRange::new(id, 5, 11).unwrap()).is_err());
    }
}
