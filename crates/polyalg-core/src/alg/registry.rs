//! # Node Registry
//!
//! Maps qualified node type names to constructor functions. The registry is populated
//! once, at startup, by every node module ([`NodeRegistry::standard`]) and shared
//! through [`crate::context::AlgContext`]. Adding a node kind means registering one
//! more constructor; nothing is discovered at runtime.
//!
//! ## Type Tags
//!
//! Serialized plans identify a node by a short tag. [`tag_for`] derives it from the
//! qualified name: the first prefix in [`NAMESPACE_PREFIXES`] whose remainder is a
//! plain name (no `.` or `$`) wins, otherwise the qualified name itself is the tag.
//! [`NodeRegistry::resolve`] reverses this by trying every prefix in the same order,
//! then the tag as a qualified name.
//!
//! ```text
//! algebra.logical.LogicalFilter      -> LogicalFilter
//! algebra.interpreted.Interpretable  -> Interpretable
//! com.example.CustomScan             -> com.example.CustomScan
//! ```

use super::{
    enforcer::{ConditionalExecute, ConstraintEnforcer, ContextSwitcher},
    qualified_type_name, AlgInput, AlgInputExt, AlgRef, Aggregate, Filter, Identifier,
    Interpretable, Join, Modify, ModifyCollect, NodeKind, Project, Scan, SetOp, SetOpKind, Sort,
    Values,
};
use crate::error::{AlgError, Result};
use crate::traits::{Convention, RowFormat, TraitSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Namespace prefixes tried, in order, when shortening or resolving a type tag.
pub const NAMESPACE_PREFIXES: [&str; 4] = [
    "algebra.",
    "algebra.logical.",
    "algebra.compiled.",
    "algebra.interpreted.",
];

pub type NodeConstructor = Arc<dyn Fn(&dyn AlgInput) -> Result<AlgRef> + Send + Sync>;

type KindReader = dyn Fn(&dyn AlgInput, TraitSet, Option<RowFormat>) -> Result<AlgRef> + Send + Sync;

/// Short tag for a qualified type name.
pub fn tag_for(qualified: &str) -> String {
    NAMESPACE_PREFIXES
        .iter()
        .filter_map(|prefix| qualified.strip_prefix(prefix))
        .find(|rest| !rest.is_empty() && !rest.contains(['.', '$']))
        .unwrap_or(qualified)
        .to_string()
}

#[derive(Clone, Default)]
pub struct NodeRegistry {
    constructors: HashMap<String, NodeConstructor>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("NodeRegistry").field("constructors", &names).finish()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in node kind, in the abstract and compiled conventions, plus the
    /// interpreted wrapper.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_kind(NodeKind::Scan, Scan::read);
        registry.register_kind(NodeKind::Values, Values::read);
        registry.register_kind(NodeKind::Project, Project::read);
        registry.register_kind(NodeKind::Filter, Filter::read);
        registry.register_kind(NodeKind::Join, Join::read);
        registry.register_kind(NodeKind::Aggregate, Aggregate::read);
        registry.register_kind(NodeKind::Sort, Sort::read);
        registry.register_kind(NodeKind::Union, SetOp::reader(SetOpKind::Union));
        registry.register_kind(NodeKind::Intersect, SetOp::reader(SetOpKind::Intersect));
        registry.register_kind(NodeKind::Minus, SetOp::reader(SetOpKind::Minus));
        registry.register_kind(NodeKind::Modify, Modify::read);
        registry.register_kind(NodeKind::ModifyCollect, ModifyCollect::read);
        registry.register_kind(NodeKind::Identifier, Identifier::read);
        registry.register_kind(NodeKind::ConstraintEnforcer, ConstraintEnforcer::read);
        registry.register_kind(NodeKind::ConditionalExecute, ConditionalExecute::read);
        registry.register_kind(NodeKind::ContextSwitcher, ContextSwitcher::read);
        registry.register(super::interpretable::INTERPRETABLE_TYPE_NAME, |input| {
            Interpretable::read(input, TraitSet::of(Convention::Interpreted), None)
        });
        registry
    }

    pub fn register(
        &mut self,
        qualified_name: impl Into<String>,
        constructor: impl Fn(&dyn AlgInput) -> Result<AlgRef> + Send + Sync + 'static,
    ) {
        self.constructors
            .insert(qualified_name.into(), Arc::new(constructor));
    }

    /// Registers `reader` for `kind` under its abstract and compiled type names. The
    /// compiled constructor also reads the optional `format` attribute.
    pub fn register_kind(
        &mut self,
        kind: NodeKind,
        reader: impl Fn(&dyn AlgInput, TraitSet, Option<RowFormat>) -> Result<AlgRef> + Send + Sync + 'static,
    ) {
        let reader: Arc<KindReader> = Arc::new(reader);

        let abstract_reader = reader.clone();
        self.register(qualified_type_name(kind, Convention::Abstract), move |input| {
            abstract_reader(input, TraitSet::abstract_(), None)
        });

        self.register(qualified_type_name(kind, Convention::Compiled), move |input| {
            let format = input.opt_enumeration::<RowFormat>("format")?;
            reader(input, TraitSet::of(Convention::Compiled), format)
        });
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.constructors.contains_key(qualified_name)
    }

    /// Qualified name and constructor for a type tag.
    pub fn resolve(&self, tag: &str) -> Result<(String, NodeConstructor)> {
        NAMESPACE_PREFIXES
            .iter()
            .map(|prefix| format!("{}{}", prefix, tag))
            .chain(std::iter::once(tag.to_string()))
            .find_map(|name| {
                self.constructors
                    .get(&name)
                    .map(|ctor| (name.clone(), ctor.clone()))
            })
            .ok_or_else(|| AlgError::UnknownNodeKind(tag.to_string()))
    }

    pub fn construct(&self, tag: &str, input: &dyn AlgInput) -> Result<AlgRef> {
        let (name, constructor) = self.resolve(tag)?;
        trace!(tag, name = %name, "constructing node");
        constructor(input)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{explain, AggregateCall, ExplainValue, JoinType, ModifyOperation};
    use super::*;
    use crate::catalog::EntityRef;
    use crate::context::AlgContext;
    use crate::exec::Condition;
    use crate::operator::OperatorKind;
    use crate::rex::RexRef;
    use crate::traits::{Collation, FieldCollation};
    use crate::types::RowType;

    /// Binds a node's own explain terms, so a node can be rebuilt from itself.
    struct TermsInput<'a> {
        context: &'a AlgContext,
        terms: Vec<(&'static str, ExplainValue)>,
    }

    impl TermsInput<'_> {
        fn term(&self, label: &str) -> Result<&ExplainValue> {
            self.terms
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v)
                .ok_or_else(|| AlgError::malformed(format!("missing '{}'", label)))
        }
    }

    fn wrong(label: &str) -> AlgError {
        AlgError::malformed(format!("wrong kind for '{}'", label))
    }

    impl AlgInput for TermsInput<'_> {
        fn context(&self) -> &AlgContext {
            self.context
        }

        fn has(&self, label: &str) -> bool {
            self.terms.iter().any(|(l, _)| *l == label)
        }

        fn input(&self, label: &str) -> Result<AlgRef> {
            match self.term(label)? {
                ExplainValue::Input(n) => Ok(n.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn inputs(&self, label: &str) -> Result<Vec<AlgRef>> {
            match self.term(label)? {
                ExplainValue::Inputs(n) => Ok(n.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn string(&self, label: &str) -> Result<String> {
            match self.term(label)? {
                ExplainValue::Str(s) => Ok(s.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn integer(&self, label: &str) -> Result<i64> {
            match self.term(label)? {
                ExplainValue::Int(v) => Ok(*v),
                _ => Err(wrong(label)),
            }
        }

        fn boolean(&self, label: &str) -> Result<bool> {
            match self.term(label)? {
                ExplainValue::Bool(v) => Ok(*v),
                _ => Err(wrong(label)),
            }
        }

        fn integer_list(&self, label: &str) -> Result<Vec<usize>> {
            match self.term(label)? {
                ExplainValue::IntList(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn string_list(&self, label: &str) -> Result<Vec<String>> {
            match self.term(label)? {
                ExplainValue::StrList(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn row_type(&self, label: &str) -> Result<RowType> {
            match self.term(label)? {
                ExplainValue::RowType(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn expression(&self, label: &str) -> Result<RexRef> {
            match self.term(label)? {
                ExplainValue::Expr(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn expression_list(&self, label: &str) -> Result<Vec<RexRef>> {
            match self.term(label)? {
                ExplainValue::ExprList(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn collation(&self, label: &str) -> Result<Collation> {
            match self.term(label)? {
                ExplainValue::Collation(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn agg_calls(&self, label: &str) -> Result<Vec<AggregateCall>> {
            match self.term(label)? {
                ExplainValue::AggCalls(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn entity(&self, label: &str) -> Result<EntityRef> {
            match self.term(label)? {
                ExplainValue::Entity(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }

        fn tuples(&self, label: &str, _row_type: &RowType) -> Result<Vec<Vec<RexRef>>> {
            match self.term(label)? {
                ExplainValue::Tuples(v) => Ok(v.clone()),
                _ => Err(wrong(label)),
            }
        }
    }

    fn rebuild(ctx: &AlgContext, node: &AlgRef) -> AlgRef {
        let input = TermsInput {
            context: ctx,
            terms: node.explain_terms(),
        };
        ctx.nodes()
            .construct(&tag_for(&node.type_name()), &input)
            .unwrap()
    }

    fn sample_plans(ctx: &AlgContext) -> Vec<AlgRef> {
        let rex = ctx.rex_builder();
        let t = TraitSet::abstract_;
        let emp_scan = Scan::create(t(), emp());
        let dept_scan = Scan::narrowed(t(), dept(), vec![1, 0]).unwrap();
        let cond = rex
            .equals(
                rex.field_ref(0, 2, emp_scan.row_type()).unwrap(),
                rex.field_ref(1, 1, dept_scan.row_type()).unwrap(),
            )
            .unwrap();
        let join = Join::create(t(), emp_scan.clone(), dept_scan.clone(), cond, JoinType::Full).unwrap();
        let sum = AggregateCall::create(
            ctx.type_system(),
            ctx.operators().get(OperatorKind::Sum).unwrap(),
            false,
            vec![3],
            Some("total".into()),
            join.row_type(),
            1,
        )
        .unwrap();
        let agg = Aggregate::create(t(), join, vec![2], vec![sum]).unwrap();
        let sort = Sort::create(
            t(),
            agg,
            Collation::of(vec![FieldCollation::desc(1)]),
            Some(2),
            Some(5),
        )
        .unwrap();
        let values = Values::create(
            t(),
            emp_row_type(),
            vec![vec![
                rex.integer(7),
                rex.string("ann"),
                rex.null(crate::types::DataType::integer()),
                rex.decimal(1250, 10, 2),
            ]],
        )
        .unwrap();
        let insert = Modify::create(t(), values.clone(), emp(), ModifyOperation::Insert, None, None, true).unwrap();
        let collect = ModifyCollect::create(t(), vec![insert.clone()], true).unwrap();
        let enforcer = ConstraintEnforcer::create(
            t(),
            collect,
            Filter::create(t(), emp_scan.clone(), rex.boolean(false)).unwrap(),
            vec!["PK".into()],
            vec!["duplicate".into()],
        )
        .unwrap();
        let guarded = ConditionalExecute::create(t(), insert, enforcer, Condition::EqualToZero, "E", "m");
        let ident = Identifier::create(t(), values, emp());
        let switched = ContextSwitcher::create(t(), ident);
        let union = SetOp::create(
            TraitSet::of(Convention::Compiled),
            SetOpKind::Union,
            vec![emp_scan.clone(), emp_scan.clone()],
            false,
            *ctx.type_system(),
        )
        .unwrap();
        let union = union
            .copy_as(union.traits().clone(), union.inputs(), Some(RowFormat::Array))
            .unwrap();
        vec![sort, guarded, switched, union, dept_scan]
    }

    fn rebuild_deep(ctx: &AlgContext, node: &AlgRef) -> AlgRef {
        let inputs: Vec<AlgRef> = node.inputs().iter().map(|i| rebuild_deep(ctx, i)).collect();
        let fresh = node.with_inputs(inputs).unwrap();
        rebuild(ctx, &fresh)
    }

    #[test]
    fn test_tag_shortening() {
        assert_eq!(tag_for("algebra.logical.LogicalFilter"), "LogicalFilter");
        assert_eq!(tag_for("algebra.compiled.CompiledScan"), "CompiledScan");
        assert_eq!(tag_for("algebra.interpreted.Interpretable"), "Interpretable");
        assert_eq!(tag_for("com.example.CustomScan"), "com.example.CustomScan");
        assert_eq!(tag_for("algebra.logical.Inner$Node"), "algebra.logical.Inner$Node");
    }

    #[test]
    fn test_resolve_tag_and_unknown() {
        let registry = NodeRegistry::standard();
        let (name, _) = registry.resolve("LogicalJoin").unwrap();
        assert_eq!(name, "algebra.logical.LogicalJoin");
        let (name, _) = registry.resolve("algebra.compiled.CompiledSort").unwrap();
        assert_eq!(name, "algebra.compiled.CompiledSort");
        match registry.resolve("NoSuchNode") {
            Err(AlgError::UnknownNodeKind(tag)) => assert_eq!(tag, "NoSuchNode"),
            other => panic!("unexpected {:?}", other.map(|(n, _)| n)),
        }
    }

    #[test]
    fn test_every_kind_rebuilds_from_its_terms() {
        let ctx = context();
        for plan in sample_plans(&ctx) {
            let rebuilt = rebuild_deep(&ctx, &plan);
            assert_eq!(explain(&rebuilt), explain(&plan));
            assert_eq!(rebuilt.row_type(), plan.row_type());
            assert_eq!(rebuilt.traits(), plan.traits());
        }
    }

    #[test]
    fn test_custom_kind_registration() {
        let mut registry = NodeRegistry::standard();
        let before = registry.len();
        registry.register("com.example.CustomScan", |input| {
            Ok(Scan::create(TraitSet::abstract_(), input.entity("entity")?))
        });
        assert_eq!(registry.len(), before + 1);
        assert!(registry.resolve("com.example.CustomScan").is_ok());
    }
}
