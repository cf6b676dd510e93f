//! # Rule-Driven Planner
//!
//! The planner takes an abstract plan and a required trait set, rewrites the plan with
//! transformation rules, and lowers it with conversion rules until the root carries the
//! required traits.
//!
//! ## Phases
//!
//! 1. **Explore** (`explore`): bottom-up passes over the tree. At every node the
//!    matching transformation rules are fired; an accepted proposal replaces the node.
//!    Passes repeat until one pass changes nothing (the plan has converged) or the
//!    round and application limits of [`PlannerConfig`] are hit.
//! 2. **Enforce**: if the required collation is not delivered by the explored plan, an
//!    abstract `Sort` is put on top of it.
//! 3. **Convert** (`convert`): the root is lowered along the shortest chain of
//!    conversion edges (`Abstract -> Compiled -> Interpreted` with the standard rules).
//!    Conversion rules convert their own inputs through the planner, so a whole subtree
//!    ends up in the target convention.
//!
//! ## Choosing Among Proposals
//!
//! Without a cost model the first rule (in registration order) that proposes anything
//! wins, and its first proposal is taken. With a [`CostModel`] every matching rule is
//! fired and the cheapest proposal is taken, provided it does not cost more than the
//! node it replaces.
//!
//! ## Termination
//!
//! Each rule fires at most once per distinct subtree (keyed by explain digest), and a
//! proposal whose digest was already rewritten away is rejected. Together with the
//! limits this bounds every run.
//!
//! ## States
//!
//! `Unoptimized -> Converged` on success, `Unoptimized -> Infeasible` when some node
//! has no conversion path to the requested convention.

use crate::alg::{explain, AlgRef, Sort};
use crate::config::PlannerConfig;
use crate::context::AlgContext;
use crate::cost::{Cost, CostModel};
use crate::error::{AlgError, Result};
use crate::pattern::matches;
use crate::rule::{InputConverter, RuleCall, RuleRegistry};
use crate::traits::{Convention, TraitSet};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Unoptimized,
    Converged,
    Infeasible,
}

pub struct Planner {
    rules: Arc<RuleRegistry>,
    cost_model: Option<Arc<dyn CostModel>>,
    context: AlgContext,
    config: PlannerConfig,
    state: PlannerState,
    /// Total rule firings so far.
    applications: usize,
    /// `(digest, rule name)` pairs already fired.
    applied: HashSet<(String, String)>,
    /// Digests of subtrees that were rewritten away.
    replaced: HashSet<String>,
    /// Conversions by node identity. The source node is held so its address stays
    /// unique for the lifetime of the planner.
    converted: HashMap<(*const (), Convention), (AlgRef, AlgRef)>,
}

impl Planner {
    pub fn new(context: AlgContext, rules: Arc<RuleRegistry>) -> Self {
        Self {
            rules,
            cost_model: None,
            context,
            config: PlannerConfig::default(),
            state: PlannerState::Unoptimized,
            applications: 0,
            applied: HashSet::new(),
            replaced: HashSet::new(),
            converted: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = Some(cost_model);
        self
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn rule_applications(&self) -> usize {
        self.applications
    }

    pub fn context(&self) -> &AlgContext {
        &self.context
    }

    /// Rewrites `root` and lowers it until it carries `required`.
    pub fn optimize(&mut self, root: AlgRef, required: &TraitSet) -> Result<AlgRef> {
        match self.run(root, required) {
            Ok(plan) => {
                self.state = PlannerState::Converged;
                debug!(
                    applications = self.applications,
                    traits = %plan.traits(),
                    "planning complete"
                );
                Ok(plan)
            }
            Err(e) => {
                if matches!(e, AlgError::PlannerInfeasible { .. }) {
                    self.state = PlannerState::Infeasible;
                }
                Err(e)
            }
        }
    }

    fn run(&mut self, root: AlgRef, required: &TraitSet) -> Result<AlgRef> {
        let mut plan = self.explore(root)?;

        if !required.collation().satisfied_by(plan.traits().collation()) {
            debug!(collation = %required.collation(), "adding sort enforcer");
            plan = Sort::create(
                TraitSet::abstract_(),
                plan,
                required.collation().clone(),
                None,
                None,
            )?;
        }

        let plan = self.convert(&plan, required.convention())?;
        if !plan.traits().satisfies(required) {
            return Err(self.infeasible(&plan, required.convention()));
        }
        Ok(plan)
    }

    /// Transformation phase alone: rewrites `root` to a fixed point.
    pub fn explore(&mut self, root: AlgRef) -> Result<AlgRef> {
        let mut current = root;
        for round in 0..self.config.max_rounds {
            let (next, changed) = self.explore_node(&current)?;
            current = next;
            if !changed {
                debug!(round, applications = self.applications, "exploration converged");
                return Ok(current);
            }
            if self.applications >= self.config.max_rule_applications {
                warn!(
                    limit = self.config.max_rule_applications,
                    "rule application limit reached, keeping plan found so far"
                );
                return Ok(current);
            }
        }
        warn!(limit = self.config.max_rounds, "exploration round limit reached");
        Ok(current)
    }

    fn explore_node(&mut self, node: &AlgRef) -> Result<(AlgRef, bool)> {
        let mut changed = false;
        let original = node.inputs();
        let mut inputs = Vec::with_capacity(original.len());
        for input in &original {
            let (explored, input_changed) = self.explore_node(input)?;
            changed |= input_changed;
            inputs.push(explored);
        }
        let current = if changed {
            node.with_inputs(inputs)?
        } else {
            node.clone()
        };
        match self.fire_transformations(&current)? {
            Some(rewritten) => Ok((rewritten, true)),
            None => Ok((current, changed)),
        }
    }

    fn fire_transformations(&mut self, node: &AlgRef) -> Result<Option<AlgRef>> {
        let rules = self.rules.clone();
        let digest = explain(node);
        let mut proposals = Vec::new();

        for rule in rules.transformation_rules() {
            if self.applications >= self.config.max_rule_applications {
                break;
            }
            if !matches(node, &rule.pattern()) {
                continue;
            }
            if !self.applied.insert((digest.clone(), rule.name().to_string())) {
                continue;
            }
            let mut call = RuleCall::new(node.clone(), &self.context, &self.config);
            let produced = rule.on_match(&mut call)?;
            self.applications += 1;
            trace!(rule = rule.name(), proposals = produced.len(), "fired transformation rule");

            for proposal in produced {
                if proposal.row_type() != node.row_type() {
                    warn!(rule = rule.name(), "discarding proposal with a different row type");
                    continue;
                }
                if self.replaced.contains(&explain(&proposal)) {
                    continue;
                }
                proposals.push(proposal);
            }
            if self.cost_model.is_none() && !proposals.is_empty() {
                break;
            }
        }

        let Some(chosen) = self.choose(node, proposals) else {
            return Ok(None);
        };
        self.replaced.insert(digest);
        trace!(from = node.type_name(), to = chosen.type_name(), "rewrote node");
        Ok(Some(chosen))
    }

    /// Proposal to keep, if any. With a cost model the proposal must not be more
    /// expensive than `current`.
    fn choose(&self, current: &AlgRef, proposals: Vec<AlgRef>) -> Option<AlgRef> {
        let Some(model) = &self.cost_model else {
            return proposals.into_iter().next();
        };
        let catalog = self.context.catalog();
        let mut best: Option<(Cost, AlgRef)> = None;
        for proposal in proposals {
            let cost = model.cost(&proposal, catalog);
            if best.as_ref().map_or(true, |(c, _)| cost < *c) {
                best = Some((cost, proposal));
            }
        }
        let (cost, plan) = best?;
        (cost <= model.cost(current, catalog)).then_some(plan)
    }

    /// Lowers `node` (and, through the conversion rules, its inputs) to `convention`.
    pub fn convert(&mut self, node: &AlgRef, convention: Convention) -> Result<AlgRef> {
        let from = node.traits().convention();
        if from == convention {
            return Ok(node.clone());
        }
        let key = (Arc::as_ptr(node) as *const (), convention);
        if let Some((_, done)) = self.converted.get(&key) {
            return Ok(done.clone());
        }
        let Some(path) = self.conversion_path(from, convention) else {
            return Err(self.infeasible(node, convention));
        };

        let mut current = node.clone();
        for (hop_from, hop_to) in path {
            current = self.convert_once(&current, hop_from, hop_to)?;
        }
        self.converted.insert(key, (node.clone(), current.clone()));
        Ok(current)
    }

    fn convert_once(&mut self, node: &AlgRef, from: Convention, to: Convention) -> Result<AlgRef> {
        let rules = self.rules.clone();
        let context = self.context.clone();
        let config = self.config.clone();
        let mut proposals = Vec::new();

        for rule in rules.conversion_rules() {
            if rule.conversion() != Some((from, to)) || !matches(node, &rule.pattern()) {
                continue;
            }
            let mut call = RuleCall::new(node.clone(), &context, &config).with_converter(&mut *self);
            let produced = rule.on_match(&mut call)?;
            self.applications += 1;
            trace!(rule = rule.name(), kind = %node.kind(), "fired conversion rule");
            for proposal in produced {
                if proposal.traits().convention() != to {
                    continue;
                }
                if proposal.row_type() != node.row_type() {
                    warn!(rule = rule.name(), "discarding conversion with a different row type");
                    continue;
                }
                proposals.push(proposal);
            }
            if self.cost_model.is_none() && !proposals.is_empty() {
                break;
            }
        }

        let chosen = match &self.cost_model {
            None => proposals.into_iter().next(),
            Some(model) => proposals.into_iter().min_by(|a, b| {
                model
                    .cost(a, context.catalog())
                    .partial_cmp(&model.cost(b, context.catalog()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        };
        chosen.ok_or_else(|| self.infeasible(node, to))
    }

    /// Shortest chain of conversion edges from `from` to `to`.
    fn conversion_path(
        &self,
        from: Convention,
        to: Convention,
    ) -> Option<Vec<(Convention, Convention)>> {
        let edges = self.rules.conversion_edges();
        let mut previous: HashMap<Convention, Convention> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(at) = queue.pop_front() {
            if at == to {
                let mut path = Vec::new();
                let mut cursor = to;
                while cursor != from {
                    let &prev = previous.get(&cursor)?;
                    path.push((prev, cursor));
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &(a, b) in &edges {
                if a == at && b != from && !previous.contains_key(&b) {
                    previous.insert(b, a);
                    queue.push_back(b);
                }
            }
        }
        None
    }

    fn infeasible(&self, node: &AlgRef, convention: Convention) -> AlgError {
        warn!(kind = %node.kind(), %convention, "no conversion path");
        AlgError::PlannerInfeasible {
            kind: node.kind().to_string(),
            convention: convention.to_string(),
        }
    }
}

impl InputConverter for Planner {
    fn convert(&mut self, node: &AlgRef, convention: Convention) -> Result<AlgRef> {
        Planner::convert(self, node, convention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::test_support::*;
    use crate::alg::{downcast, AlgNode, Filter, NodeKind, Scan};
    use crate::cost::DefaultCostModel;
    use crate::pattern::Pattern;
    use crate::rule::{Rule, RuleType};

    /// Filter(Filter(x)) -> Filter(x) keeping the upper condition. Not sound, but
    /// enough to watch the planner pick up a rewrite.
    struct DropLowerFilter;

    impl Rule for DropLowerFilter {
        fn name(&self) -> &str {
            "DropLowerFilter"
        }
        fn rule_type(&self) -> RuleType {
            RuleType::Transformation
        }
        fn pattern(&self) -> Pattern {
            Pattern::filter_filter()
        }
        fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
            let top = downcast::<Filter>(call.node()).unwrap();
            let lower = downcast::<Filter>(top.input()).unwrap();
            Ok(vec![Filter::create(
                top.traits().clone(),
                lower.input().clone(),
                top.condition().clone(),
            )?])
        }
    }

    /// Abstract -> Compiled for scans and filters only.
    struct ToCompiled;

    impl Rule for ToCompiled {
        fn name(&self) -> &str {
            "ToCompiled"
        }
        fn rule_type(&self) -> RuleType {
            RuleType::Conversion
        }
        fn pattern(&self) -> Pattern {
            Pattern::any_in(Convention::Abstract)
        }
        fn conversion(&self) -> Option<(Convention, Convention)> {
            Some((Convention::Abstract, Convention::Compiled))
        }
        fn on_match(&self, call: &mut RuleCall<'_>) -> Result<Vec<AlgRef>> {
            let node = call.node().clone();
            if !matches!(node.kind(), NodeKind::Scan | NodeKind::Filter) {
                return Ok(vec![]);
            }
            let inputs = node
                .inputs()
                .iter()
                .map(|i| call.convert_input(i, Convention::Compiled))
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![node.copy_as(node.traits().with_convention(Convention::Compiled), inputs, None)?])
        }
    }

    fn registry() -> Arc<RuleRegistry> {
        let mut rules = RuleRegistry::new();
        rules.add_rule(Box::new(DropLowerFilter));
        rules.add_rule(Box::new(ToCompiled));
        Arc::new(rules)
    }

    fn double_filter() -> AlgRef {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let lower = Filter::create(TraitSet::abstract_(), scan, rex.boolean(true)).unwrap();
        Filter::create(TraitSet::abstract_(), lower, rex.boolean(false)).unwrap()
    }

    #[test]
    fn test_explore_then_convert() {
        let mut planner = Planner::new(context(), registry());
        assert_eq!(planner.state(), PlannerState::Unoptimized);
        let plan = planner
            .optimize(double_filter(), &TraitSet::of(Convention::Compiled))
            .unwrap();
        assert_eq!(planner.state(), PlannerState::Converged);
        assert_eq!(plan.type_name(), "algebra.compiled.CompiledFilter");
        assert_eq!(plan.inputs()[0].type_name(), "algebra.compiled.CompiledScan");
    }

    #[test]
    fn test_explore_is_idempotent() {
        let once = Planner::new(context(), registry()).explore(double_filter()).unwrap();
        let twice = Planner::new(context(), registry()).explore(once.clone()).unwrap();
        assert_eq!(explain(&once), explain(&twice));
    }

    #[test]
    fn test_missing_conversion_is_infeasible() {
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let plan = crate::alg::ContextSwitcher::create(TraitSet::abstract_(), scan);
        let mut planner = Planner::new(context(), registry());
        let err = planner
            .optimize(plan, &TraitSet::of(Convention::Compiled))
            .unwrap_err();
        assert!(matches!(
            err,
            AlgError::PlannerInfeasible { ref kind, ref convention }
                if kind == "ContextSwitcher" && convention == "COMPILED"
        ));
        assert_eq!(planner.state(), PlannerState::Infeasible);
    }

    #[test]
    fn test_no_path_to_interpreted() {
        let mut planner = Planner::new(context(), registry());
        let err = planner
            .optimize(double_filter(), &TraitSet::of(Convention::Interpreted))
            .unwrap_err();
        assert!(matches!(err, AlgError::PlannerInfeasible { .. }));
    }

    #[test]
    fn test_cost_model_rejects_nothing_cheaper() {
        let mut planner =
            Planner::new(context(), registry()).with_cost_model(Arc::new(DefaultCostModel::default()));
        let plan = planner.explore(double_filter()).unwrap();
        assert_eq!(plan.inputs()[0].kind(), NodeKind::Scan);
        assert!(planner.rule_applications() >= 1);
    }

    #[test]
    fn test_application_limit_stops_exploration() {
        let config = PlannerConfig {
            max_rule_applications: 0,
            ..PlannerConfig::default()
        };
        let mut planner = Planner::new(context(), registry()).with_config(config);
        let plan = planner.explore(double_filter()).unwrap();
        assert_eq!(explain(&plan), explain(&double_filter()));
        assert_eq!(planner.rule_applications(), 0);
    }
}
