//! # Plan Nodes
//!
//! The relational algebra IR. Every plan node implements [`AlgNode`] and is shared as
//! an [`AlgRef`] (`Arc<dyn AlgNode>`). Nodes are immutable values: a rewrite never
//! mutates a node, it builds a new one through [`AlgNode::copy`] (or the shorthand
//! [`AlgNode::with_inputs`]) and leaves the old tree intact. Sub-plans may therefore be
//! shared by several parents, which turns a plan into a DAG of values.
//!
//! ## Node Contract
//!
//! - `row_type()` is a pure function of the inputs' row types and the node's own
//!   parameters. Every constructor re-derives it, so copying a node onto new inputs
//!   yields the same row type as building it from scratch.
//! - `inputs()` lists the child nodes in the order of the input terms (`input`, `left`,
//!   `right`, `inputs`).
//! - `explain_terms()` is the ordered list of `(label, value)` pairs that both the text
//!   explain and the serializer consume. Input terms come first.
//!
//! ## Node Kinds
//!
//! | Kind                 | Inputs          | Row type                               |
//! |----------------------|-----------------|----------------------------------------|
//! | `Scan`               | none            | entity fields (optionally narrowed)    |
//! | `Values`             | none            | declared                               |
//! | `Project`            | input           | one field per expression               |
//! | `Filter`             | input           | input                                  |
//! | `Join`               | left, right     | left ++ right (nullability by type)    |
//! | `Aggregate`          | input           | group fields ++ aggregate calls        |
//! | `Sort`               | input           | input                                  |
//! | `Union`/`Intersect`/`Minus` | inputs   | least restrictive per column           |
//! | `Modify`             | input           | `ROWCOUNT`                             |
//! | `ModifyCollect`      | inputs          | `ROWCOUNT`                             |
//! | `Identifier`         | input           | `_eid` ++ input                        |
//! | `ConstraintEnforcer` | left, right     | left                                   |
//! | `ConditionalExecute` | left, right     | right                                  |
//! | `ContextSwitcher`    | input           | input                                  |
//! | `Interpretable`      | input           | input                                  |
//!
//! Each kind exists in the abstract convention (`algebra.logical.Logical<Kind>`) and the
//! compiled convention (`algebra.compiled.Compiled<Kind>`, which also carries a row
//! layout). `Interpretable` is the single node of the interpreted convention.

pub mod aggregate;
pub mod enforcer;
pub mod filter;
pub mod input;
pub mod interpretable;
pub mod join;
pub mod modify;
pub mod project;
pub mod registry;
pub mod scan;
pub mod set_op;
pub mod sort;
pub mod values;

pub use aggregate::{Aggregate, AggregateCall};
pub use enforcer::{ConditionalExecute, ConstraintEnforcer, ContextSwitcher};
pub use filter::Filter;
pub use input::{AlgEnum, AlgInput, AlgInputExt};
pub use interpretable::Interpretable;
pub use join::{Join, JoinType};
pub use modify::{Identifier, Modify, ModifyCollect, ModifyOperation};
pub use project::Project;
pub use registry::NodeRegistry;
pub use scan::Scan;
pub use set_op::{SetOp, SetOpKind};
pub use sort::Sort;
pub use values::Values;

use crate::catalog::{Catalog, EntityRef};
use crate::cost::Cost;
use crate::error::{AlgError, Result};
use crate::rex::RexRef;
use crate::traits::{Collation, Convention, RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::fmt::{self, Write as _};
use std::sync::Arc;

pub type AlgRef = Arc<dyn AlgNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scan,
    Values,
    Project,
    Filter,
    Join,
    Aggregate,
    Sort,
    Union,
    Intersect,
    Minus,
    Modify,
    ModifyCollect,
    Identifier,
    ConstraintEnforcer,
    ConditionalExecute,
    ContextSwitcher,
    Interpretable,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scan => "Scan",
            NodeKind::Values => "Values",
            NodeKind::Project => "Project",
            NodeKind::Filter => "Filter",
            NodeKind::Join => "Join",
            NodeKind::Aggregate => "Aggregate",
            NodeKind::Sort => "Sort",
            NodeKind::Union => "Union",
            NodeKind::Intersect => "Intersect",
            NodeKind::Minus => "Minus",
            NodeKind::Modify => "Modify",
            NodeKind::ModifyCollect => "ModifyCollect",
            NodeKind::Identifier => "Identifier",
            NodeKind::ConstraintEnforcer => "ConstraintEnforcer",
            NodeKind::ConditionalExecute => "ConditionalExecute",
            NodeKind::ContextSwitcher => "ContextSwitcher",
            NodeKind::Interpretable => "Interpretable",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully qualified type name of a node kind in a convention.
pub fn qualified_type_name(kind: NodeKind, convention: Convention) -> String {
    match convention {
        Convention::Abstract => format!("algebra.logical.Logical{}", kind),
        Convention::Compiled => format!("algebra.compiled.Compiled{}", kind),
        Convention::Interpreted => format!("algebra.interpreted.Interpreted{}", kind),
    }
}

/// A term value in a node's explain output.
#[derive(Debug, Clone)]
pub enum ExplainValue {
    Input(AlgRef),
    Inputs(Vec<AlgRef>),
    Str(String),
    Int(i64),
    Bool(bool),
    IntList(Vec<usize>),
    StrList(Vec<String>),
    Expr(RexRef),
    ExprList(Vec<RexRef>),
    RowType(RowType),
    Collation(Collation),
    AggCalls(Vec<AggregateCall>),
    Entity(EntityRef),
    /// Literal rows of a `Values` node.
    Tuples(Vec<Vec<RexRef>>),
}

impl ExplainValue {
    pub fn is_input(&self) -> bool {
        matches!(self, ExplainValue::Input(_) | ExplainValue::Inputs(_))
    }
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            write!(f, "]")
        }

        match self {
            ExplainValue::Input(node) => write!(f, "{}", node.type_name()),
            ExplainValue::Inputs(nodes) => write!(f, "{} inputs", nodes.len()),
            ExplainValue::Str(s) => write!(f, "{}", s),
            ExplainValue::Int(v) => write!(f, "{}", v),
            ExplainValue::Bool(v) => write!(f, "{}", v),
            ExplainValue::IntList(v) => list(f, v),
            ExplainValue::StrList(v) => list(f, v),
            ExplainValue::Expr(e) => write!(f, "{}", e),
            ExplainValue::ExprList(v) => list(f, v),
            ExplainValue::RowType(rt) => write!(f, "{}", rt),
            ExplainValue::Collation(c) => write!(f, "{}", c),
            ExplainValue::AggCalls(v) => list(f, v),
            ExplainValue::Entity(e) => write!(f, "{}", e),
            ExplainValue::Tuples(rows) => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    list(f, row)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Ordered explain terms of a node.
pub type ExplainTerms = Vec<(&'static str, ExplainValue)>;

/// A relational plan node.
pub trait AlgNode: fmt::Debug + Send + Sync + Any {
    fn kind(&self) -> NodeKind;

    /// Fully qualified type name, e.g. `algebra.logical.LogicalFilter`.
    fn type_name(&self) -> String {
        qualified_type_name(self.kind(), self.traits().convention())
    }

    fn traits(&self) -> &TraitSet;

    fn row_type(&self) -> &RowType;

    fn inputs(&self) -> Vec<AlgRef>;

    /// Row layout of a compiled node.
    fn format(&self) -> Option<RowFormat> {
        None
    }

    /// A node of the same kind and parameters over new inputs, with new traits and row
    /// layout. Derived traits (e.g. the collation of a sort) are recomputed.
    fn copy_as(
        &self,
        traits: TraitSet,
        inputs: Vec<AlgRef>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef>;

    fn copy(&self, traits: TraitSet, inputs: Vec<AlgRef>) -> Result<AlgRef> {
        self.copy_as(traits, inputs, self.format())
    }

    fn with_inputs(&self, inputs: Vec<AlgRef>) -> Result<AlgRef> {
        self.copy(self.traits().clone(), inputs)
    }

    fn explain_terms(&self) -> ExplainTerms;

    fn as_any(&self) -> &dyn Any;

    /// Output rows given the estimated rows of each input.
    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        input_rows.first().copied().unwrap_or(1.0)
    }

    /// Cost of this node alone, excluding its inputs.
    fn self_cost(&self, rows: f64, _input_rows: &[f64]) -> Cost {
        Cost::new(rows)
    }
}

/// Downcast helper used by rules.
pub fn downcast<T: AlgNode>(node: &AlgRef) -> Option<&T> {
    node.as_any().downcast_ref::<T>()
}

/// Terms shared by every compiled node.
pub(crate) fn push_format_term(terms: &mut ExplainTerms, format: Option<RowFormat>) {
    if let Some(format) = format {
        terms.push(("format", ExplainValue::Str(format.as_str().to_string())));
    }
}

pub(crate) fn expect_inputs(kind: NodeKind, inputs: &[AlgRef], count: usize) -> Result<()> {
    if inputs.len() != count {
        return Err(AlgError::malformed(format!(
            "{} takes {} input(s), got {}",
            kind,
            count,
            inputs.len()
        )));
    }
    Ok(())
}

/// Indented text explain of a plan. One line per node, children indented below their
/// parent. Two plans with the same explain are structurally equal, so the text also
/// serves as the digest the planner memoizes on.
pub fn explain(node: &AlgRef) -> String {
    let mut out = String::new();
    explain_into(node, 0, &mut out);
    out
}

fn explain_into(node: &AlgRef, depth: usize, out: &mut String) {
    let terms = node.explain_terms();
    let _ = write!(out, "{:indent$}{}(", "", short_name(node), indent = depth * 2);
    let mut first = true;
    for (label, value) in terms.iter().filter(|(_, v)| !v.is_input()) {
        if !first {
            out.push_str(", ");
        }
        first = false;
        let _ = write!(out, "{}=[{}]", label, value);
    }
    out.push_str(")\n");
    for input in node.inputs() {
        explain_into(&input, depth + 1, out);
    }
}

fn short_name(node: &AlgRef) -> String {
    let name = node.type_name();
    match name.rsplit_once('.') {
        Some((_, short)) => short.to_string(),
        None => name,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::operator::OperatorKind;

    #[test]
    fn test_qualified_type_names() {
        assert_eq!(
            qualified_type_name(NodeKind::Filter, Convention::Abstract),
            "algebra.logical.LogicalFilter"
        );
        assert_eq!(
            qualified_type_name(NodeKind::Scan, Convention::Compiled),
            "algebra.compiled.CompiledScan"
        );
    }

    #[test]
    fn test_explain_indents_children() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let cond = rex
            .call_kind(
                OperatorKind::GreaterThan,
                vec![rex.field_ref(0, 0, scan.row_type()).unwrap(), rex.integer(10)],
            )
            .unwrap();
        let filter = Filter::create(TraitSet::abstract_(), scan, cond).unwrap();
        assert_eq!(
            explain(&filter),
            "LogicalFilter(condition=[>($0, 10)])\n  LogicalScan(entity=[public.emp])\n"
        );
    }
}
