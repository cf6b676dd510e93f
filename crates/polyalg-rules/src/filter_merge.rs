//! # Filter Merge Rule
//!
//! Collapses two adjacent filters into one whose condition is the conjunction of
//! both, lower condition first.

use polyalg_core::AlgNode;
use polyalg_core::alg::{downcast, AlgRef, Filter};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rule::{Rule, RuleCall, RuleType};

pub struct FilterMergeRule;

impl Rule for FilterMergeRule {
    fn name(&self) -> &str {
        "FilterMerge"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        // Match: Filter(Filter(Any))
        Pattern::filter_filter()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let Some(top) = downcast::<Filter>(call.node()) else {
            return Ok(vec![]);
        };
        let Some(bottom) = downcast::<Filter>(top.input()) else {
            return Ok(vec![]);
        };
        let condition = call
            .rex_builder()
            .and(vec![bottom.condition().clone(), top.condition().clone()])?;
        Ok(vec![Filter::create(
            top.traits().clone(),
            bottom.input().clone(),
            condition,
        )?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use polyalg_core::config::PlannerConfig;
    use polyalg_core::operator::OperatorKind;
    use polyalg_core::traits::TraitSet;

    #[test]
    fn test_conditions_are_anded() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = emp_scan();
        let id = rex.field_ref(0, 0, scan.row_type()).unwrap();
        let dept = rex.field_ref(0, 2, scan.row_type()).unwrap();
        let lower = Filter::create(
            TraitSet::abstract_(),
            scan,
            rex.call_kind(OperatorKind::GreaterThan, vec![id, rex.integer(10)]).unwrap(),
        )
        .unwrap();
        let upper = Filter::create(
            TraitSet::abstract_(),
            lower,
            rex.equals(dept, rex.integer(3)).unwrap(),
        )
        .unwrap();

        let config = PlannerConfig::default();
        let mut call = RuleCall::new(upper, &ctx, &config);
        let out = FilterMergeRule.on_match(&mut call).unwrap();
        let merged = downcast::<Filter>(&out[0]).unwrap();
        assert_eq!(merged.condition().to_string(), "AND(>($0, 10), =($2, 3))");
        assert_eq!(merged.input().kind(), polyalg_core::alg::NodeKind::Scan);
    }

    #[test]
    fn test_true_condition_is_absorbed() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let lower = Filter::create(TraitSet::abstract_(), emp_scan(), rex.boolean(true)).unwrap();
        let upper = Filter::create(TraitSet::abstract_(), lower, rex.boolean(true)).unwrap();
        let config = PlannerConfig::default();
        let mut call = RuleCall::new(upper, &ctx, &config);
        let out = FilterMergeRule.on_match(&mut call).unwrap();
        assert!(downcast::<Filter>(&out[0]).unwrap().condition().is_always_true());
    }
}
