//! # Compiled Conversion Rules
//!
//! One conversion rule per node kind maps an abstract node to its compiled
//! counterpart. The compiled node has the same parameters, inputs converted to the
//! compiled convention, and a concrete row layout chosen from
//! `PlannerConfig::prefer` and the node's field count.
//!
//! A compiled plan is closed: every node below a compiled node is compiled too. The
//! rule asks the planner to convert its inputs before building the node, so an
//! input kind with no compiled rule makes the whole conversion infeasible.

use polyalg_core::alg::{AlgRef, NodeKind};
use polyalg_core::error::Result;
use polyalg_core::pattern::Pattern;
use polyalg_core::rule::{Rule, RuleCall, RuleType};
use polyalg_core::traits::Convention;
use tracing::trace;

const COMPILABLE: [NodeKind; 16] = [
    NodeKind::Scan,
    NodeKind::Values,
    NodeKind::Project,
    NodeKind::Filter,
    NodeKind::Join,
    NodeKind::Aggregate,
    NodeKind::Sort,
    NodeKind::Union,
    NodeKind::Intersect,
    NodeKind::Minus,
    NodeKind::Modify,
    NodeKind::ModifyCollect,
    NodeKind::Identifier,
    NodeKind::ConstraintEnforcer,
    NodeKind::ConditionalExecute,
    NodeKind::ContextSwitcher,
];

/// Abstract to compiled conversion for a single node kind.
pub struct CompiledRule {
    kind: NodeKind,
    name: String,
}

impl CompiledRule {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: format!("Compiled{}Rule", kind),
        }
    }

    /// A rule for every kind that has a compiled form.
    pub fn all() -> Vec<CompiledRule> {
        COMPILABLE.iter().map(|&kind| CompiledRule::new(kind)).collect()
    }
}

impl Rule for CompiledRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Conversion
    }

    fn pattern(&self) -> Pattern {
        Pattern::kind_in(self.kind, Convention::Abstract)
    }

    fn conversion(&self) -> Option<(Convention, Convention)> {
        Some((Convention::Abstract, Convention::Compiled))
    }

    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
        let node = call.node().clone();
        let inputs = node
            .inputs()
            .iter()
            .map(|input| call.convert_input(input, Convention::Compiled))
            .collect::<Result<Vec<_>>>()?;
        let format = call.config().prefer.resolve(node.row_type().field_count());
        trace!(kind = %self.kind, format = format.as_str(), "compiling node");
        let compiled = node.copy_as(
            node.traits().with_convention(Convention::Compiled),
            inputs,
            Some(format),
        )?;
        Ok(vec![compiled])
    }
}
