//! 1-D weighted histogram with under/overflow bookkeeping.

use hepflow_core::dag::{AxisDef, FlowPolicy};
use hepflow_core::schema::{DataType, Schema};
use hepflow_core::types::{RecordBatch, Scalar};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Aggregator, Partial};
use crate::traits::OpError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub name: String,
    /// Bin edges, `bins + 1` strictly increasing values. Bins are `[lo, hi)`.
    pub edges: Vec<f64>,
    pub flow: FlowPolicy,
    /// Sum of weights per bin.
    pub counts: Vec<f64>,
    /// Sum of squared weights per bin.
    pub sumw2: Vec<f64>,
    /// Out-of-range sums of weights (before optional folding).
    pub underflow: f64,
    pub overflow: f64,
    pub underflow_sumw2: f64,
    pub overflow_sumw2: f64,
    /// Values that landed in a bin (folded ones included).
    pub entries: u64,
}

impl Histogram {
    pub fn empty(name: impl Into<String>, edges: Vec<f64>, flow: FlowPolicy) -> Self {
        let bins = edges.len().saturating_sub(1);
        Self {
            name: name.into(),
            edges,
            flow,
            counts: vec![0.0; bins],
            sumw2: vec![0.0; bins],
            underflow: 0.0,
            overflow: 0.0,
            underflow_sumw2: 0.0,
            overflow_sumw2: 0.0,
            entries: 0,
        }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Add one value with `weight`. NaN values are ignored.
    pub fn fill(&mut self, value: f64, weight: f64) {
        if value.is_nan() || self.counts.is_empty() {
            return;
        }
        let w2 = weight * weight;
        let last = self.counts.len() - 1;
        let target = match find_bin(&self.edges, value) {
            Some(bin) => Some(bin),
            None if value < self.edges[0] => {
                self.underflow += weight;
                self.underflow_sumw2 += w2;
                (self.flow == FlowPolicy::Fold).then_some(0)
            }
            None => {
                self.overflow += weight;
                self.overflow_sumw2 += w2;
                (self.flow == FlowPolicy::Fold).then_some(last)
            }
        };
        if let Some(bin) = target {
            self.counts[bin] += weight;
            self.sumw2[bin] += w2;
            self.entries += 1;
        }
    }

    /// Bin-wise sum. Both sides must share name, edges and flow policy.
    pub fn combine(&self, other: &Histogram) -> Result<Histogram, OpError> {
        if self.name != other.name {
            return Err(OpError::IncompatibleDomain(format!(
                "histogram '{}' vs '{}'",
                self.name, other.name
            )));
        }
        if self.edges != other.edges || self.flow != other.flow {
            return Err(OpError::IncompatibleDomain(format!(
                "histogram '{}': binning differs ({} vs {} bins, {:?} vs {:?})",
                self.name,
                self.bins(),
                other.bins(),
                self.flow,
                other.flow
            )));
        }
        let add = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x + y).collect();
        Ok(Histogram {
            name: self.name.clone(),
            edges: self.edges.clone(),
            flow: self.flow,
            counts: add(&self.counts, &other.counts),
            sumw2: add(&self.sumw2, &other.sumw2),
            underflow: self.underflow + other.underflow,
            overflow: self.overflow + other.overflow,
            underflow_sumw2: self.underflow_sumw2 + other.underflow_sumw2,
            overflow_sumw2: self.overflow_sumw2 + other.overflow_sumw2,
            entries: self.entries + other.entries,
        })
    }
}

/// Bin index of `value` for sorted `edges`, `None` outside `[first, last)`.
pub fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    let (&lo, &hi) = (edges.first()?, edges.last()?);
    if !(value >= lo && value < hi) {
        return None;
    }
    // partition_point gives the first edge > value; the bin starts one before.
    Some(edges.partition_point(|e| *e <= value) - 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramAggregator {
    pub name: String,
    pub column: String,
    pub edges: Vec<f64>,
    pub weight: Option<String>,
    pub flow: FlowPolicy,
}

impl HistogramAggregator {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        axis: &AxisDef,
        weight: Option<String>,
        flow: FlowPolicy,
    ) -> Result<Self, OpError> {
        Ok(Self {
            name: name.into(),
            column: column.into(),
            edges: axis.edges()?,
            weight,
            flow,
        })
    }
}

impl Aggregator for HistogramAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "histogram"
    }

    fn params(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "column": self.column,
            "edges": self.edges,
            "weight": self.weight,
            "flow": self.flow,
        })
    }

    fn check(&self, input: &Schema) -> Result<(), OpError> {
        let field = input.require(&self.column, &format!("histogram '{}'", self.name))?;
        let numeric = match &field.data_type {
            DataType::List(inner) => inner.is_numeric(),
            dt => dt.is_numeric(),
        };
        if !numeric {
            return Err(OpError::Plan(format!(
                "histogram '{}' needs a numeric column, '{}' is {}",
                self.name, self.column, field.data_type
            )));
        }
        if let Some(w) = &self.weight {
            let wf = input.require(w, &format!("histogram '{}' weight", self.name))?;
            if !wf.data_type.is_numeric() {
                return Err(OpError::Plan(format!(
                    "histogram '{}' weight '{w}' must be a numeric scalar column, found {}",
                    self.name, wf.data_type
                )));
            }
        }
        Ok(())
    }

    fn identity(&self) -> Partial {
        Partial::Histogram(Histogram::empty(self.name.clone(), self.edges.clone(), self.flow))
    }

    fn accumulate(&self, batch: &RecordBatch) -> Result<Partial, OpError> {
        let mut h = Histogram::empty(self.name.clone(), self.edges.clone(), self.flow);
        let values = &batch.require_column(&self.column)?.values;
        let weights = match &self.weight {
            Some(w) => Some(&batch.require_column(w)?.values),
            None => None,
        };
        for (row, v) in values.iter().enumerate() {
            let w = match weights {
                Some(ws) => match ws[row].as_f64() {
                    Some(w) => w,
                    None => continue,
                },
                None => 1.0,
            };
            match v {
                Scalar::Null => {}
                Scalar::List(items) => {
                    for x in items.iter().filter_map(Scalar::as_f64) {
                        h.fill(x, w);
                    }
                }
                other => {
                    let x = other.as_f64().ok_or_else(|| {
                        OpError::Exec(format!(
                            "histogram '{}': non-numeric {other:?} at row {row}",
                            self.name
                        ))
                    })?;
                    h.fill(x, w);
                }
            }
        }
        Ok(Partial::Histogram(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hepflow_core::types::Column;
    use proptest::prelude::*;

    fn three_bins(counts: [f64; 3]) -> Histogram {
        let mut h = Histogram::empty("m", vec![0.0, 1.0, 2.0, 3.0], FlowPolicy::Drop);
        h.counts = counts.to_vec();
        h.sumw2 = counts.to_vec();
        h
    }

    #[test]
    fn bin_lookup() {
        let e = [0.0, 1.0, 2.0, 4.0];
        assert_eq!(find_bin(&e, 0.0), Some(0));
        assert_eq!(find_bin(&e, 1.0), Some(1));
        assert_eq!(find_bin(&e, 3.99), Some(2));
        assert_eq!(find_bin(&e, 4.0), None);
        assert_eq!(find_bin(&e, -0.1), None);
        assert_eq!(find_bin(&e, f64::NAN), None);
    }

    #[test]
    fn combine_adds_bins() {
        let c = three_bins([1.0, 0.0, 2.0])
            .combine(&three_bins([0.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(c.bin_counts(), &[1.0, 1.0, 3.0]);
    }

    #[test]
    fn different_axes_do_not_combine() {
        let a = three_bins([1.0, 0.0, 0.0]);
        let mut b = a.clone();
        b.edges = vec![0.0, 1.0, 2.0, 4.0];
        assert!(matches!(a.combine(&b), Err(OpError::IncompatibleDomain(_))));
        let mut c = a.clone();
        c.name = "pt".into();
        assert!(matches!(a.combine(&c), Err(OpError::IncompatibleDomain(_))));
    }

    #[test]
    fn flow_policies() {
        let mut drop = Histogram::empty("x", vec![0.0, 1.0, 2.0], FlowPolicy::Drop);
        let mut fold = Histogram::empty("x", vec![0.0, 1.0, 2.0], FlowPolicy::Fold);
        for h in [&mut drop, &mut fold] {
            h.fill(-5.0, 1.0);
            h.fill(2.0, 2.0);
            h.fill(0.5, 1.0);
        }
        assert_eq!(drop.counts, vec![1.0, 0.0]);
        assert_eq!((drop.underflow, drop.overflow), (1.0, 2.0));
        assert_eq!(fold.counts, vec![2.0, 2.0]);
        assert_eq!(fold.sumw2, vec![2.0, 4.0]);
        assert_eq!(fold.entries, 3);
    }

    #[test]
    fn accumulates_jagged_values_with_row_weights() {
        let batch = RecordBatch::new(vec![
            Column::new(
                "Muon_pt",
                vec![
                    Scalar::List(vec![Scalar::F32(0.5), Scalar::F32(1.5)]),
                    Scalar::Null,
                    Scalar::List(vec![Scalar::F32(1.2)]),
                ],
            ),
            Column::new("w", vec![Scalar::F64(2.0), Scalar::F64(1.0), Scalar::Null]),
        ])
        .unwrap();
        let agg = HistogramAggregator::new(
            "pt",
            "Muon_pt",
            &AxisDef::Regular {
                bins: 2,
                lo: 0.0,
                hi: 2.0,
            },
            Some("w".into()),
            FlowPolicy::Drop,
        )
        .unwrap();
        let Partial::Histogram(h) = agg.accumulate(&batch).unwrap() else {
            panic!("expected a histogram");
        };
        // third row has a null weight and is skipped
        assert_eq!(h.counts, vec![2.0, 2.0]);
        assert_eq!(h.entries, 2);
    }

    fn arb_hist() -> impl Strategy<Value = Histogram> {
        proptest::collection::vec((-1i32..5, 0i32..4), 0..30).prop_map(|fills| {
            let mut h = Histogram::empty("m", vec![0.0, 1.0, 2.0, 3.0], FlowPolicy::Drop);
            for (v, w) in fills {
                h.fill(v as f64 + 0.5, w as f64);
            }
            h
        })
    }

    proptest! {
        #[test]
        fn combine_is_associative_and_commutative(a in arb_hist(), b in arb_hist(), c in arb_hist()) {
            let ab_c = a.combine(&b).unwrap().combine(&c).unwrap();
            let a_bc = a.combine(&b.combine(&c).unwrap()).unwrap();
            prop_assert_eq!(&ab_c, &a_bc);
            prop_assert_eq!(a.combine(&b).unwrap(), b.combine(&a).unwrap());
            let e = Histogram::empty("m", a.edges.clone(), a.flow);
            prop_assert_eq!(e.combine(&a).unwrap(), a);
        }
    }
}
