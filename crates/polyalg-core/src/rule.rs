//! # Rule System
//!
//! ## Rule Types
//!
//! - **Transformation rules** ([`RuleType::Transformation`]) rewrite a subtree into an
//!   equivalent subtree in the same convention, e.g. pushing a projection into the
//!   scan below it.
//! - **Conversion rules** ([`RuleType::Conversion`]) turn a node of one convention
//!   into an equivalent node of another. A conversion rule asks the planner to convert
//!   the node's inputs through [`RuleCall::convert_input`] before building its result.
//!
//! ## Abstaining
//!
//! A rule whose pattern matched but which finds nothing to do returns an empty
//! proposal list. That is the normal outcome, not an error; errors are reserved for
//! real failures such as an input that cannot be converted.
//!
//! ## Rule Registry
//!
//! [`RuleRegistry`] keeps rules in registration order. Without a cost model the
//! planner takes the first rule that proposes something, so the order is the
//! tie-break policy.

use crate::alg::AlgRef;
use crate::config::PlannerConfig;
use crate::context::AlgContext;
use crate::error::{AlgError, Result};
use crate::pattern::Pattern;
use crate::rex::RexBuilder;
use crate::traits::Convention;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    /// Same-convention rewrite.
    Transformation,
    /// Convention-changing rewrite.
    Conversion,
}

/// Converts plans to a convention on behalf of a conversion rule.
pub trait InputConverter {
    fn convert(&mut self, node: &AlgRef, convention: Convention) -> Result<AlgRef>;
}

/// A matched node plus everything a rule may consult while rewriting it.
pub struct RuleCall<'a> {
    node: AlgRef,
    context: &'a AlgContext,
    config: &'a PlannerConfig,
    converter: Option<&'a mut dyn InputConverter>,
}

impl<'a> RuleCall<'a> {
    pub fn new(node: AlgRef, context: &'a AlgContext, config: &'a PlannerConfig) -> Self {
        Self {
            node,
            context,
            config,
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: &'a mut dyn InputConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn node(&self) -> &AlgRef {
        &self.node
    }

    pub fn context(&self) -> &AlgContext {
        self.context
    }

    pub fn config(&self) -> &PlannerConfig {
        self.config
    }

    pub fn rex_builder(&self) -> RexBuilder {
        self.context.rex_builder()
    }

    /// `input` in `convention`. Inputs already in that convention are returned as is.
    pub fn convert_input(&mut self, input: &AlgRef, convention: Convention) -> Result<AlgRef> {
        if input.traits().convention() == convention {
            return Ok(input.clone());
        }
        match self.converter.as_deref_mut() {
            Some(converter) => converter.convert(input, convention),
            None => Err(AlgError::PlannerInfeasible {
                kind: input.kind().to_string(),
                convention: convention.to_string(),
            }),
        }
    }
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    fn rule_type(&self) -> RuleType;

    fn pattern(&self) -> Pattern;

    /// Source and target convention of a conversion rule.
    fn conversion(&self) -> Option<(Convention, Convention)> {
        None
    }

    /// Equivalent replacements for the matched node; empty to abstain.
    fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>>;
}

#[derive(Default)]
pub struct RuleRegistry {
    pub base_rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.base_rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.base_rules.iter().map(|r| r.as_ref())
    }

    pub fn transformation_rules(&self) -> Vec<&dyn Rule> {
        self.rules()
            .filter(|r| r.rule_type() == RuleType::Transformation)
            .collect()
    }

    pub fn conversion_rules(&self) -> Vec<&dyn Rule> {
        self.rules()
            .filter(|r| r.rule_type() == RuleType::Conversion)
            .collect()
    }

    /// Distinct `(from, to)` convention edges the conversion rules provide.
    pub fn conversion_edges(&self) -> Vec<(Convention, Convention)> {
        let mut edges: Vec<_> = self.rules().filter_map(|r| r.conversion()).collect();
        edges.sort();
        edges.dedup();
        edges
    }

    pub fn len(&self) -> usize {
        self.base_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_rules.is_empty()
    }
}
