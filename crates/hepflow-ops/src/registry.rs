//! Bind workflow steps and aggregate definitions to concrete operators.

use std::sync::Arc;

use hepflow_core::dag::{AggregateDef, AggregateKind, StepKind};

use crate::aggregate::{Aggregator, CountAggregator, HistogramAggregator};
use crate::filter::Filter;
use crate::multiplicity::Multiplicity;
use crate::pair::Pair;
use crate::project::Project;
use crate::traits::{OpError, Transform};

pub fn build_transform(kind: &StepKind) -> Result<Arc<dyn Transform>, OpError> {
    let op: Arc<dyn Transform> = match kind {
        StepKind::Filter { expr } => Arc::new(Filter::new(expr)?),
        StepKind::Project { columns } => Arc::new(Project::new(columns.clone())),
        StepKind::Multiplicity { column, alias } => Arc::new(Multiplicity {
            column: column.clone(),
            alias: alias.clone(),
        }),
        StepKind::Pair {
            collection,
            output,
            policy,
            mass,
        } => {
            let mut pair = Pair::new(collection.clone(), output.clone(), *policy);
            if let Some(m) = mass {
                if !(m.is_finite() && *m >= 0.0) {
                    return Err(OpError::Plan(format!(
                        "pair '{output}': constituent mass must be finite and >= 0, got {m}"
                    )));
                }
                pair.mass = *m;
            }
            Arc::new(pair)
        }
    };
    Ok(op)
}

pub fn build_aggregator(def: &AggregateDef) -> Result<Arc<dyn Aggregator>, OpError> {
    let agg: Arc<dyn Aggregator> = match &def.kind {
        AggregateKind::Histogram {
            column,
            axis,
            weight,
            flow,
        } => Arc::new(HistogramAggregator::new(
            def.name.clone(),
            column.clone(),
            axis,
            weight.clone(),
            *flow,
        )?),
        AggregateKind::Count => Arc::new(CountAggregator {
            name: def.name.clone(),
        }),
    };
    Ok(agg)
}
