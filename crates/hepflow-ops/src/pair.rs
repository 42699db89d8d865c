//! Pair combination: one opposite-charge pair per row → composite fields.
//!
//! The collection `c` is read from the jagged columns `c_pt`, `c_eta`,
//! `c_phi`, `c_charge` and optionally `c_mass`. Output `o` adds nullable
//! Float64 columns `o_mass`, `o_pt`, `o_eta`, `o_phi` for the summed
//! four-momentum and `o_pt1 .. o_phi2` for the positive (1) and negative (2)
//! constituents.

use hepflow_core::dag::PairPolicy;
use hepflow_core::schema::{DataType, Field, Schema};
use hepflow_core::types::{Column, RecordBatch, Scalar};
use serde_json::json;
use tracing::{debug, warn};

use crate::kinematics::{FourMomentum, MUON_MASS};
use crate::plan::{Footprint, OpPlan};
use crate::traits::{OpError, Transform};

const COMPOSITE_FIELDS: [&str; 10] = [
    "mass", "pt", "eta", "phi", "pt1", "eta1", "phi1", "pt2", "eta2", "phi2",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub collection: String,
    pub output: String,
    pub policy: PairPolicy,
    /// Constituent mass when the collection has no `_mass` column.
    pub mass: f64,
}

impl Pair {
    pub fn new(collection: impl Into<String>, output: impl Into<String>, policy: PairPolicy) -> Self {
        Self {
            collection: collection.into(),
            output: output.into(),
            policy,
            mass: MUON_MASS,
        }
    }

    fn input(&self, attr: &str) -> String {
        format!("{}_{attr}", self.collection)
    }

    pub fn output_names(&self) -> Vec<String> {
        COMPOSITE_FIELDS
            .iter()
            .map(|f| format!("{}_{f}", self.output))
            .collect()
    }

    /// Choose constituents for one row, per policy.
    fn select(&self, row: usize, charges: &[f64]) -> Result<Option<(usize, usize)>, OpError> {
        let pos: Vec<usize> = (0..charges.len()).filter(|&i| charges[i] > 0.0).collect();
        let neg: Vec<usize> = (0..charges.len()).filter(|&i| charges[i] < 0.0).collect();
        let exact = pos.len() == 1 && neg.len() == 1;
        Ok(match self.policy {
            PairPolicy::FirstMatch => pos.first().zip(neg.first()).map(|(p, n)| (*p, *n)),
            PairPolicy::Exact => exact.then(|| (pos[0], neg[0])),
            PairPolicy::Error if exact => Some((pos[0], neg[0])),
            PairPolicy::Error => {
                return Err(OpError::CardinalityMismatch {
                    row,
                    positive: pos.len(),
                    negative: neg.len(),
                })
            }
        })
    }
}

fn floats(v: &Scalar, name: &str, row: usize) -> Result<Vec<f64>, OpError> {
    match v {
        Scalar::Null => Ok(Vec::new()),
        Scalar::List(items) => items
            .iter()
            .map(|x| {
                x.as_f64().ok_or_else(|| {
                    OpError::Exec(format!("row {row}: non-numeric {x:?} in '{name}'"))
                })
            })
            .collect(),
        other => Err(OpError::Exec(format!(
            "row {row}: '{name}' holds {other:?}, expected a list"
        ))),
    }
}

impl Transform for Pair {
    fn name(&self) -> &'static str {
        "pair"
    }

    fn params(&self) -> serde_json::Value {
        json!({
            "collection": self.collection,
            "output": self.output,
            "policy": self.policy,
            "mass": self.mass,
        })
    }

    fn memory_need(&self, _rows: u64, _bytes: u64) -> Footprint {
        Footprint {
            bytes_per_row: 8 * COMPOSITE_FIELDS.len() as u64,
            overhead_bytes: 0,
        }
    }

    fn plan(&self, input: &Schema) -> Result<OpPlan, OpError> {
        let mut attrs = vec!["pt", "eta", "phi", "charge"];
        if input.index_of(&self.input("mass")).is_some() {
            attrs.push("mass");
        }
        for attr in attrs {
            let name = self.input(attr);
            let field = input.require(&name, "pair input")?;
            match &field.data_type {
                DataType::List(inner) if inner.is_numeric() => {}
                other => {
                    return Err(OpError::Plan(format!(
                        "pair needs '{name}' as a list of numbers, found {other}"
                    )))
                }
            }
        }
        let mut out = input.clone();
        for name in self.output_names() {
            if out.index_of(&name).is_some() {
                return Err(OpError::Plan(format!("pair output '{name}' already exists")));
            }
            out.fields.push(Field::new(name, DataType::Float64, true));
        }
        Ok(OpPlan::new(out, self.memory_need(0, 0)))
    }

    fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, OpError> {
        let pt = batch.require_column(&self.input("pt"))?;
        let eta = batch.require_column(&self.input("eta"))?;
        let phi = batch.require_column(&self.input("phi"))?;
        let charge = batch.require_column(&self.input("charge"))?;
        let mass = batch.column(&self.input("mass"));

        let n = batch.num_rows();
        let mut out: Vec<Vec<Scalar>> = vec![Vec::with_capacity(n); COMPOSITE_FIELDS.len()];
        let mut nulled = 0usize;

        for row in 0..n {
            let q = floats(&charge.values[row], &charge.name, row)?;
            let pts = floats(&pt.values[row], &pt.name, row)?;
            let etas = floats(&eta.values[row], &eta.name, row)?;
            let phis = floats(&phi.values[row], &phi.name, row)?;
            let masses = match mass {
                Some(c) => floats(&c.values[row], &c.name, row)?,
                None => vec![self.mass; q.len()],
            };
            if [pts.len(), etas.len(), phis.len(), masses.len()]
                .iter()
                .any(|&len| len != q.len())
            {
                return Err(OpError::Exec(format!(
                    "row {row}: '{}' columns have different lengths",
                    self.collection
                )));
            }

            let Some((a, b)) = self.select(row, &q)? else {
                nulled += 1;
                for col in out.iter_mut() {
                    col.push(Scalar::Null);
                }
                continue;
            };
            let p1 = FourMomentum::from_pt_eta_phi_m(pts[a], etas[a], phis[a], masses[a]);
            let p2 = FourMomentum::from_pt_eta_phi_m(pts[b], etas[b], phis[b], masses[b]);
            let sum = p1 + p2;
            let values = [
                sum.mass(),
                sum.pt(),
                sum.eta(),
                sum.phi(),
                pts[a],
                etas[a],
                phis[a],
                pts[b],
                etas[b],
                phis[b],
            ];
            for (col, v) in out.iter_mut().zip(values) {
                col.push(Scalar::F64(v));
            }
        }

        if nulled > 0 {
            match self.policy {
                PairPolicy::Exact => {
                    warn!(rows = nulled, collection = %self.collection, "pair cardinality mismatch, composite set to null")
                }
                _ => debug!(rows = nulled, collection = %self.collection, "rows without an opposite-charge pair"),
            }
        }

        let mut result = batch.clone();
        for (name, values) in self.output_names().into_iter().zip(out) {
            result = result.with_column(Column::new(name, values))?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(xs: &[f64]) -> Scalar {
        Scalar::List(xs.iter().map(|x| Scalar::F64(*x)).collect())
    }

    type Muon = (f64, f64, f64, i32);

    fn per_row(rows: &[&[Muon]], f: impl Fn(&Muon) -> Scalar) -> Vec<Scalar> {
        rows.iter()
            .map(|r| Scalar::List(r.iter().map(&f).collect()))
            .collect()
    }

    fn muons(rows: &[&[Muon]]) -> RecordBatch {
        RecordBatch::new(vec![
            Column::new("Muon_pt", per_row(rows, |m| Scalar::F64(m.0))),
            Column::new("Muon_eta", per_row(rows, |m| Scalar::F64(m.1))),
            Column::new("Muon_phi", per_row(rows, |m| Scalar::F64(m.2))),
            Column::new("Muon_charge", per_row(rows, |m| Scalar::I32(m.3))),
        ])
        .unwrap()
    }

    fn schema() -> Schema {
        let l = |t| DataType::List(Box::new(t));
        Schema::new(vec![
            Field::new("Muon_pt", l(DataType::Float64), false),
            Field::new("Muon_eta", l(DataType::Float64), false),
            Field::new("Muon_phi", l(DataType::Float64), false),
            Field::new("Muon_charge", l(DataType::Int32), false),
        ])
    }

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn z_like_pair() {
        let b = muons(&[&[(45.0, 0.0, 0.0, 1), (45.0, 0.0, PI, -1)]]);
        let out = Pair::new("Muon", "Dimuon", PairPolicy::FirstMatch)
            .apply(&b)
            .unwrap();
        let m = out.column("Dimuon_mass").unwrap().values[0].as_f64().unwrap();
        assert!((m - 90.0).abs() < 1e-3, "mass {m}");
        assert_eq!(
            out.column("Dimuon_pt1").unwrap().values[0],
            Scalar::F64(45.0)
        );
    }

    #[test]
    fn first_match_skips_extras_and_nulls_same_sign() {
        let b = muons(&[
            &[(10.0, 0.1, 0.2, -1), (20.0, 0.3, 0.4, 1), (30.0, 0.5, 0.6, 1)],
            &[(10.0, 0.1, 0.2, 1), (20.0, 0.3, 0.4, 1)],
        ]);
        let out = Pair::new("Muon", "Z", PairPolicy::FirstMatch)
            .apply(&b)
            .unwrap();
        let pt1 = &out.column("Z_pt1").unwrap().values;
        let pt2 = &out.column("Z_pt2").unwrap().values;
        assert_eq!(pt1[0], Scalar::F64(20.0));
        assert_eq!(pt2[0], Scalar::F64(10.0));
        assert_eq!(pt1[1], Scalar::Null);
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn exact_nulls_extra_candidates() {
        let b = muons(&[&[(10.0, 0.0, 0.0, -1), (20.0, 0.0, 1.0, 1), (30.0, 0.0, 2.0, 1)]]);
        let out = Pair::new("Muon", "Z", PairPolicy::Exact).apply(&b).unwrap();
        assert_eq!(out.column("Z_mass").unwrap().values[0], Scalar::Null);
    }

    #[test]
    fn error_policy_reports_row() {
        let b = muons(&[
            &[(10.0, 0.0, 0.0, -1), (20.0, 0.0, 1.0, 1)],
            &[(10.0, 0.0, 0.0, -1)],
        ]);
        let err = Pair::new("Muon", "Z", PairPolicy::Error)
            .apply(&b)
            .unwrap_err();
        assert!(matches!(
            err,
            OpError::CardinalityMismatch {
                row: 1,
                positive: 0,
                negative: 1
            }
        ));
    }

    #[test]
    fn plan_adds_nullable_composites() {
        let plan = Pair::new("Muon", "Dimuon", PairPolicy::FirstMatch)
            .plan(&schema())
            .unwrap();
        let f = plan.output_schema.field_named("Dimuon_eta2").unwrap();
        assert!(f.nullable);
        assert_eq!(plan.output_schema.fields.len(), 14);
    }

    #[test]
    fn plan_requires_charge() {
        let mut s = schema();
        s.fields.pop();
        assert!(Pair::new("Muon", "Z", PairPolicy::FirstMatch).plan(&s).is_err());
    }

    #[test]
    fn ragged_collection_is_an_error() {
        let mut b = muons(&[&[(10.0, 0.0, 0.0, -1), (20.0, 0.0, 1.0, 1)]]);
        b = b.with_column(Column::new("Muon_eta", vec![list(&[0.0])])).unwrap();
        assert!(Pair::new("Muon", "Z", PairPolicy::FirstMatch).apply(&b).is_err());
    }
}
