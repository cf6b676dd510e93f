//! # Project Removal Rule
//!
//! Drops a projection that reproduces its input unchanged: it lists every input field
//! in order, under the input's own names. Controlled by
//! `PlannerConfig::prune_identity_projects`.

use polyalg_core::alg::{downcast, AlgRef, Project};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rule::{Rule, RuleCall, RuleType};

pub struct ProjectRemoveRule;

impl Rule for ProjectRemoveRule {
    fn name(&self) -> &str {
        "ProjectRemove"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Transformation
    }

    fn pattern(&self) -> Pattern {
        Pattern::project()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        if !call.config().prune_identity_projects {
            return Ok(vec![]);
        }
        match downcast::<Project>(call.node()) {
            Some(project) if project.is_identity() => Ok(vec![project.input().clone()]),
            _ => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use polyalg_core::config::PlannerConfig;
    use polyalg_core::traits::TraitSet;

    #[test]
    fn test_identity_removed_renaming_kept() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = dept_scan();
        let exprs: Vec<_> = (0..2)
            .map(|i| rex.field_ref(0, i, scan.row_type()).unwrap())
            .collect();
        let config = PlannerConfig::default();

        let identity =
            Project::with_derived_names(TraitSet::abstract_(), scan.clone(), exprs.clone()).unwrap();
        let mut call = RuleCall::new(identity, &ctx, &config);
        let out = ProjectRemoveRule.on_match(&mut call).unwrap();
        assert!(std::sync::Arc::ptr_eq(&out[0], &scan));

        let renamed = Project::create(
            TraitSet::abstract_(),
            scan,
            exprs,
            vec!["no".into(), "name".into()],
        )
        .unwrap();
        let mut call = RuleCall::new(renamed, &ctx, &config);
        assert!(ProjectRemoveRule.on_match(&mut call).unwrap().is_empty());
    }
}
