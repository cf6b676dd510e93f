//! Planner configuration.
//!
//! A planner run is bounded by `max_rounds` (full exploration passes over the tree)
//! and `max_rule_applications` (total rule firings). Hitting either bound ends the
//! exploration phase early; the plan found so far is still converted.

use crate::traits::Prefer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Upper bound on bottom-up exploration passes.
    pub max_rounds: usize,
    /// Upper bound on rule applications across the whole run.
    pub max_rule_applications: usize,
    /// Row layout preference for compiled nodes.
    pub prefer: Prefer,
    /// Drop projections that reproduce their input unchanged.
    pub prune_identity_projects: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 64,
            max_rule_applications: 10_000,
            prefer: Prefer::Any,
            prune_identity_projects: true,
        }
    }
}
