//! # Project Merge Rule
//!
//! Composes two adjacent projections into one by substituting the lower projection's
//! expressions for the field references of the upper one.
//!
//! ```text
//! Before: Project([+($0, 1)], Project([$3], X))
//! After:  Project([+($3, 1)], X)
//! ```
//!
//! The merged projection keeps the upper projection's field names, so the row type
//! is unchanged.

use polyalg_core::AlgNode;
use polyalg_core::alg::{downcast, AlgRef, Project};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rex::substitute_inputs;
use polyalg_core::rule::{Rule, RuleCall, RuleType};

pub struct ProjectMergeRule;

impl Rule for ProjectMergeRule {
    fn name(&self) -> &str {
        "ProjectMerge"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        // Match: Project(Project(Any))
        Pattern::project_project()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let Some(top) = downcast::<Project>(call.node()) else {
            return Ok(vec![]);
        };
        let Some(bottom) = downcast::<Project>(top.input()) else {
            return Ok(vec![]);
        };
        let exprs = top
            .exprs()
            .iter()
            .map(|e| substitute_inputs(e, bottom.exprs()))
            .collect();
        let merged = Project::create(
            top.traits().clone(),
            bottom.input().clone(),
            exprs,
            top.row_type().field_names(),
        )?;
        Ok(vec![merged])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use polyalg_core::alg::explain;
    use polyalg_core::config::PlannerConfig;
    use polyalg_core::operator::OperatorKind;
    use polyalg_core::traits::TraitSet;

    #[test]
    fn test_substitutes_lower_expressions() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = emp_scan();
        let lower = Project::with_derived_names(
            TraitSet::abstract_(),
            scan.clone(),
            vec![rex.field_ref(0, 2, scan.row_type()).unwrap()],
        )
        .unwrap();
        let dept = rex.field_ref(0, 0, lower.row_type()).unwrap();
        let upper = Project::create(
            TraitSet::abstract_(),
            lower,
            vec![rex.call_kind(OperatorKind::Plus, vec![dept, rex.integer(1)]).unwrap()],
            vec!["next_dept".into()],
        )
        .unwrap();

        let config = PlannerConfig::default();
        let mut call = RuleCall::new(upper.clone(), &ctx, &config);
        let out = ProjectMergeRule.on_match(&mut call).unwrap();
        assert_eq!(
            explain(&out[0]),
            "LogicalProject(exprs=[[+($2, 1)]], fields=[[next_dept]])\n  LogicalScan(entity=[public.emp])\n"
        );
        assert_eq!(out[0].row_type(), upper.row_type());
    }
}
