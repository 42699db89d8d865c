//! Row counter: how many rows reach a tap.

use hepflow_core::schema::Schema;
use hepflow_core::types::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Aggregator, Partial};
use crate::traits::OpError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub name: String,
    pub rows: u64,
}

impl RowCount {
    pub fn combine(&self, other: &RowCount) -> Result<RowCount, OpError> {
        if self.name != other.name {
            return Err(OpError::IncompatibleDomain(format!(
                "counter '{}' vs '{}'",
                self.name, other.name
            )));
        }
        Ok(RowCount {
            name: self.name.clone(),
            rows: self.rows + other.rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAggregator {
    pub name: String,
}

impl Aggregator for CountAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "count"
    }

    fn params(&self) -> serde_json::Value {
        json!({ "name": self.name })
    }

    fn check(&self, _input: &Schema) -> Result<(), OpError> {
        Ok(())
    }

    fn identity(&self) -> Partial {
        Partial::Count(RowCount {
            name: self.name.clone(),
            rows: 0,
        })
    }

    fn accumulate(&self, batch: &RecordBatch) -> Result<Partial, OpError> {
        Ok(Partial::Count(RowCount {
            name: self.name.clone(),
            rows: batch.num_rows() as u64,
        }))
    }
}
