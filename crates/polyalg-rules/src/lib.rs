//! # Built-in Planner Rules
//!
//! This crate provides the default rule set of the polyalg planner. Rules are
//! divided into two categories:
//!
//! ## Transformation Rules (Abstract -> Abstract)
//!
//! - **`ProjectScanPushdownRule`**: narrows a scan to the fields its parent projection
//!   reads, keeping a residual projection only when it is not the identity.
//! - **`ProjectMergeRule`**: composes adjacent projections.
//! - **`ProjectRemoveRule`**: drops identity projections.
//! - **`FilterMergeRule`**: ANDs adjacent filters.
//! - **`FilterIntoJoinRule`**: merges a filter into an inner join's condition.
//!
//! ## Conversion Rules
//!
//! - **`CompiledRule`** (one per node kind): Abstract -> Compiled, with a row layout
//!   chosen from `PlannerConfig::prefer`.
//! - **`InterpretableRule`**: Compiled -> Interpreted, wrapping any compiled subtree.
//!
//! Without a cost model the planner takes the first rule that proposes something,
//! so the registration order below is the tie-break policy.

pub mod compiled;
pub mod filter_merge;
pub mod interpretable;
pub mod predicate_pushdown;
pub mod project_merge;
pub mod project_remove;
pub mod projection_pushdown;

use polyalg_core::rule::RuleRegistry;

/// Create a rule registry with all built-in rules.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    // Transformation rules.
    registry.add_rule(Box::new(projection_pushdown::ProjectScanPushdownRule));
    registry.add_rule(Box::new(project_merge::ProjectMergeRule));
    registry.add_rule(Box::new(project_remove::ProjectRemoveRule));
    registry.add_rule(Box::new(filter_merge::FilterMergeRule));
    registry.add_rule(Box::new(predicate_pushdown::FilterIntoJoinRule));

    // Conversion rules: Abstract -> Compiled -> Interpreted.
    for rule in compiled::CompiledRule::all() {
        registry.add_rule(Box::new(rule));
    }
    registry.add_rule(Box::new(interpretable::InterpretableRule));

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use polyalg_core::alg::{AlgRef, Scan};
    use polyalg_core::catalog::{EntityRef, InMemoryCatalog};
    use polyalg_core::context::AlgContext;
    use polyalg_core::stats::Statistics;
    use polyalg_core::traits::TraitSet;
    use polyalg_core::types::{DataType, RowType};
    use std::sync::Arc;

    pub fn emp() -> EntityRef {
        let row_type = RowType::builder()
            .add("id", DataType::integer())
            .add("name", DataType::varchar(Some(20)))
            .add("dept", DataType::integer().with_nullable(true))
            .add("salary", DataType::decimal(10, 2))
            .build();
        EntityRef::new("public", "emp", row_type)
    }

    pub fn dept() -> EntityRef {
        let row_type = RowType::builder()
            .add("deptno", DataType::integer())
            .add("dname", DataType::varchar(Some(10)))
            .build();
        EntityRef::new("public", "dept", row_type)
    }

    pub fn context() -> AlgContext {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_entity(emp(), Some(Statistics::new(1000.0, 100_000.0)));
        catalog.add_entity(dept(), Some(Statistics::new(10.0, 400.0)));
        AlgContext::new(Arc::new(catalog))
    }

    pub fn emp_scan() -> AlgRef {
        Scan::create(TraitSet::abstract_(), emp())
    }

    pub fn dept_scan() -> AlgRef {
        Scan::create(TraitSet::abstract_(), dept())
    }
}
