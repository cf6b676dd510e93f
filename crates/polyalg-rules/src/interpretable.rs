//! # Interpretable Conversion Rule
//!
//! The terminal step of the conversion pipeline: any compiled subtree can be run by
//! the interpreter, so the rule wraps the compiled node in a single `Interpretable`
//! and never abstains.

use polyalg_core::alg::{AlgRef, Interpretable};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rule::{Rule, RuleCall, RuleType};
use polyalg_core::traits::Convention;

pub struct InterpretableRule;

impl Rule for InterpretableRule {
    fn name(&self) -> &str {
        "InterpretableRule"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Conversion
    }

    fn pattern(&self) -> Pattern {
        Pattern::any_in(Convention::Compiled)
    }

    fn conversion(&self) -> Option<(Convention, Convention)> {
        Some((Convention::Compiled, Convention::Interpreted))
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let node = call.node().clone();
        let traits = node.traits().with_convention(Convention::Interpreted);
        Ok(vec![Interpretable::create(traits, node)?])
    }
}
