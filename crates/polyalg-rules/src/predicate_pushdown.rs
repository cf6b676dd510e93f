//! # Predicate Pushdown Rule
//!
//! When a Filter sits on top of an inner Join, this rule merges the filter predicate
//! into the join condition so the join evaluates it while matching rows.
//!
//! ```text
//! Before: Filter(pred, Join(A, B, cond, INNER))
//! After:  Join(A, B, AND(cond, pred), INNER)
//! ```
//!
//! ## Field Addressing
//!
//! The filter sees the join's output as one flat row, so its references are
//! `$k` over `A ++ B`. A join condition addresses its inputs separately: fields of
//! `A` stay `$k`, fields of `B` become `$1.(k - |A|)`.
//!
//! Outer joins are left alone: moving a predicate into an outer join's condition
//! changes which rows are null-extended.

use polyalg_core::AlgNode;
use polyalg_core::alg::{downcast, AlgRef, Filter, Join, JoinType};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rex::{remap_field_refs, RexNode};
use polyalg_core::rule::{Rule, RuleCall, RuleType};
use std::sync::Arc;

/// Push filter predicates into inner join conditions.
pub struct FilterIntoJoinRule;

impl Rule for FilterIntoJoinRule {
    fn name(&self) -> &str {
        "FilterIntoJoin"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        // Match: Filter(Join(A, B))
        Pattern::filter_join()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let Some(filter) = downcast::<Filter>(call.node()) else {
            return Ok(vec![]);
        };
        let Some(join) = downcast::<Join>(filter.input()) else {
            return Ok(vec![]);
        };
        if join.join_type() != JoinType::Inner {
            return Ok(vec![]);
        }

        let left_count = join.left().row_type().field_count();
        let predicate = remap_field_refs(filter.condition(), &mut |input, index, ty| {
            if input != 0 || index < left_count {
                return None;
            }
            Some(Arc::new(RexNode::FieldRef {
                input: 1,
                index: index - left_count,
                ty: ty.clone(),
            }))
        });
        let condition = call
            .rex_builder()
            .and(vec![join.condition().clone(), predicate])?;

        Ok(vec![Join::create(
            join.traits().clone(),
            join.left().clone(),
            join.right().clone(),
            condition,
            JoinType::Inner,
        )?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use polyalg_core::config::PlannerConfig;
    use polyalg_core::traits::TraitSet;

    fn join_emp_dept(join_type: JoinType) -> AlgRef {
        let ctx = context();
        let rex = ctx.rex_builder();
        let (emp, dept) = (emp_scan(), dept_scan());
        let condition = rex
            .equals(
                rex.field_ref(0, 2, emp.row_type()).unwrap(),
                rex.field_ref(1, 0, dept.row_type()).unwrap(),
            )
            .unwrap();
        Join::create(TraitSet::abstract_(), emp, dept, condition, join_type).unwrap()
    }

    fn filter_on_dname(join: AlgRef) -> AlgRef {
        let ctx = context();
        let rex = ctx.rex_builder();
        let dname = rex.field_ref(0, 5, join.row_type()).unwrap();
        let condition = rex.equals(dname, rex.string("Sales")).unwrap();
        Filter::create(TraitSet::abstract_(), join, condition).unwrap()
    }

    #[test]
    fn test_right_fields_are_readdressed() {
        let ctx = context();
        let filter = filter_on_dname(join_emp_dept(JoinType::Inner));
        let config = PlannerConfig::default();
        let mut call = RuleCall::new(filter.clone(), &ctx, &config);
        let out = FilterIntoJoinRule.on_match(&mut call).unwrap();
        let join = downcast::<Join>(&out[0]).unwrap();
        assert_eq!(
            join.condition().to_string(),
            "AND(=($2, $1.0), =($1.1, 'Sales'))"
        );
        assert_eq!(out[0].row_type(), filter.row_type());
    }

    #[test]
    fn test_outer_join_untouched() {
        let ctx = context();
        let filter = filter_on_dname(join_emp_dept(JoinType::Left));
        let config = PlannerConfig::default();
        let mut call = RuleCall::new(filter, &ctx, &config);
        assert!(FilterIntoJoinRule.on_match(&mut call).unwrap().is_empty());
    }
}
