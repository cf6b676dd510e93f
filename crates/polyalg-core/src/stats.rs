//! # Statistics and Row Count Estimation
//!
//! Row counts drive both the default cost model and the write-only diagnostics a plan
//! writer may attach (`rowCount`). Leaf counts come from the catalog; intermediate
//! counts are derived bottom-up with fixed heuristics:
//!
//! - **Filter**: `input * 0.25`.
//! - **Join**: `left * right * 0.15`.
//! - **Aggregate**: `input / 10`, or exactly 1 row without grouping columns.
//! - **Values**: number of tuples.
//! - Everything else passes its (first) input's count through unless the node says
//!   otherwise via [`crate::alg::AlgNode::estimate_row_count`].
//!
//! All derived counts are floored at 1 so that costs never collapse to zero.

use crate::alg::AlgRef;
use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row count assumed for an entity the catalog has no statistics for.
pub const DEFAULT_ROW_COUNT: f64 = 1000.0;

pub const FILTER_SELECTIVITY: f64 = 0.25;

pub const JOIN_SELECTIVITY: f64 = 0.15;

/// Fraction of input rows surviving a grouped aggregate.
pub const AGGREGATE_REDUCTION: f64 = 0.1;

/// Table-level statistics as provided by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub distinct_count: f64,
    /// Fraction of NULL values, in `[0, 1]`.
    pub null_fraction: f64,
    pub avg_size: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
            avg_size: 8.0,
        }
    }
}

pub fn derive_filter_rows(input_rows: f64) -> f64 {
    (input_rows * FILTER_SELECTIVITY).max(1.0)
}

pub fn derive_join_rows(left_rows: f64, right_rows: f64) -> f64 {
    (left_rows * right_rows * JOIN_SELECTIVITY).max(1.0)
}

pub fn derive_aggregate_rows(input_rows: f64, group_count: usize) -> f64 {
    if group_count == 0 {
        1.0
    } else {
        (input_rows * AGGREGATE_REDUCTION).max(1.0)
    }
}

/// Estimated output row count of a plan subtree.
pub fn row_count(node: &AlgRef, catalog: &dyn Catalog) -> f64 {
    let input_rows: Vec<f64> = node
        .inputs()
        .iter()
        .map(|input| row_count(input, catalog))
        .collect();
    node.estimate_row_count(&input_rows, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_formulas() {
        assert_eq!(derive_filter_rows(1000.0), 250.0);
        assert_eq!(derive_filter_rows(2.0), 1.0);
        assert_eq!(derive_join_rows(100.0, 20.0), 300.0);
        assert_eq!(derive_aggregate_rows(500.0, 0), 1.0);
        assert_eq!(derive_aggregate_rows(500.0, 2), 50.0);
    }
}
