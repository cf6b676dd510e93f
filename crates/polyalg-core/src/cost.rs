//! # Cost Model
//!
//! The planner does not need a cost model: without one, the first rule registered wins
//! every tie. When a [`CostModel`] is supplied it ranks alternative plans and the
//! cheapest proposal is kept.
//!
//! ## Cost Accumulation
//!
//! Costs are **cumulative**: the cost of a plan is the cost of its root alone (its
//! self-cost, see [`crate::alg::AlgNode::self_cost`]) plus the costs of all its
//! inputs. Self-costs are driven by the row count estimates of [`crate::stats`].
//!
//! ## Narrowing
//!
//! A node that can produce fewer fields than it was asked for (a scan reading a subset
//! of columns) scales its base cost with [`narrowing_cost`]:
//!
//! ```text
//! cost' = cost * (fields_kept + 2) / (fields_total + 2)
//! ```
//!
//! The `+2` damping keeps a zero-field scan from becoming free.

use crate::alg::{AlgRef, NodeKind};
use crate::catalog::Catalog;
use crate::stats::row_count;
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// A single comparable cost value. Lower is better.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    /// `f64::MAX` stands for an infeasible plan.
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }

    pub fn infinite() -> Self {
        Self { total: f64::MAX }
    }

    pub fn is_infinite(&self) -> bool {
        self.total == f64::MAX
    }
}

/// Epsilon-based equality to absorb floating-point noise.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        if self.is_infinite() || rhs.is_infinite() {
            return Cost::infinite();
        }
        Cost::new(self.total + rhs.total)
    }
}

/// Cost of a node narrowed to `kept` of `total` fields, given its full-width cost.
pub fn narrowing_cost(base: Cost, kept: usize, total: usize) -> Cost {
    Cost::new(base.total * (kept as f64 + 2.0) / (total as f64 + 2.0))
}

/// Pluggable ranking of alternative plans.
pub trait CostModel: Send + Sync {
    /// Cumulative cost of the plan rooted at `node`.
    fn cost(&self, node: &AlgRef, catalog: &dyn Catalog) -> Cost;
}

/// Weighted sum of per-node self-costs.
///
/// - **CPU**: every node's self-cost, weighted by `cpu_weight`.
/// - **Memory**: blocking nodes (sort, aggregate) additionally pay `memory_weight`
///   per input row they hold.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCostModel {
    pub cpu_weight: f64,
    pub memory_weight: f64,
}

impl Default for DefaultCostModel {
    fn default() -> Self {
        Self {
            cpu_weight: 1.0,
            memory_weight: 1.0,
        }
    }
}

impl CostModel for DefaultCostModel {
    fn cost(&self, node: &AlgRef, catalog: &dyn Catalog) -> Cost {
        let inputs = node.inputs();
        let input_rows: Vec<f64> = inputs.iter().map(|i| row_count(i, catalog)).collect();
        let rows = node.estimate_row_count(&input_rows, catalog);

        let cpu = node.self_cost(rows, &input_rows).total * self.cpu_weight;
        let memory = match node.kind() {
            NodeKind::Sort | NodeKind::Aggregate => {
                input_rows.first().copied().unwrap_or(0.0) * self.memory_weight
            }
            _ => 0.0,
        };

        inputs
            .iter()
            .map(|input| self.cost(input, catalog))
            .fold(Cost::new(cpu + memory), |acc, c| acc + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::test_support::*;
    use crate::alg::{Filter, Project, Scan};
    use crate::traits::TraitSet;
    use proptest::prelude::*;

    #[test]
    fn test_narrowing_damping() {
        let base = Cost::new(100.0);
        assert_eq!(narrowing_cost(base, 4, 4), base);
        assert_eq!(narrowing_cost(base, 0, 4), Cost::new(100.0 * 2.0 / 6.0));
        assert!(narrowing_cost(base, 0, 4).total > 0.0);
    }

    #[test]
    fn test_cost_accumulates_over_inputs() {
        let ctx = context();
        let model = DefaultCostModel::default();
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let filter =
            Filter::create(TraitSet::abstract_(), scan.clone(), ctx.rex_builder().boolean(true)).unwrap();
        let scan_cost = model.cost(&scan, ctx.catalog());
        assert_eq!(scan_cost, Cost::new(1000.0));
        assert_eq!(model.cost(&filter, ctx.catalog()), Cost::new(1000.0 + 250.0));
    }

    #[test]
    fn test_narrow_scan_beats_project_over_full_scan() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let model = DefaultCostModel::default();
        let full = Scan::create(TraitSet::abstract_(), emp());
        let project = Project::with_derived_names(
            TraitSet::abstract_(),
            full.clone(),
            vec![rex.field_ref(0, 1, full.row_type()).unwrap()],
        )
        .unwrap();
        let narrow = Scan::narrowed(TraitSet::abstract_(), emp(), vec![1]).unwrap();
        assert!(model.cost(&narrow, ctx.catalog()) < model.cost(&project, ctx.catalog()));
    }

    #[test]
    fn test_infinite_absorbs() {
        assert!((Cost::infinite() + Cost::new(1.0)).is_infinite());
    }

    proptest! {
        #[test]
        fn prop_narrowing_is_monotonic(
            total in 1usize..64,
            a in 0usize..64,
            b in 0usize..64,
            base in 1.0f64..1e9,
        ) {
            let (k1, k2) = (a.min(total), b.min(total));
            prop_assume!(k1 < k2);
            let c1 = narrowing_cost(Cost::new(base), k1, total);
            let c2 = narrowing_cost(Cost::new(base), k2, total);
            prop_assert!(c1.total < c2.total);
        }
    }
}
