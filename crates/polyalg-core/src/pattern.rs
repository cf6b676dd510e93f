//! # Declarative Pattern Matching for Rules
//!
//! Every rule declares a [`Pattern`] describing the plan shape it applies to. The
//! planner checks the pattern before calling the rule, so rules never see nodes they
//! cannot handle.
//!
//! ## Pattern Language
//!
//! - `Pattern::Node(matcher, inputs)`: matches a node whose kind and convention satisfy
//!   `matcher`. With [`Inputs::Exactly`] the node must have exactly that many inputs,
//!   each matching its child pattern; with [`Inputs::Unchecked`] inputs are ignored.
//! - `Pattern::Any`: matches any node. The usual child pattern for inputs a rule does
//!   not inspect.
//! - `Pattern::Leaf`: matches nodes without inputs.
//!
//! Matching is ordinary structural recursion over the node tree. Traits other than
//! the convention are not inspected by patterns.

use crate::alg::{AlgRef, NodeKind};
use crate::traits::Convention;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Node(NodeMatcher, Inputs),
    Any,
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inputs {
    Unchecked,
    Exactly(Vec<Pattern>),
}

/// Kind and convention constraints on a single node. `None` accepts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMatcher {
    pub kind: Option<NodeKind>,
    pub convention: Option<Convention>,
}

impl NodeMatcher {
    pub fn accepts(&self, node: &AlgRef) -> bool {
        self.kind.map_or(true, |k| k == node.kind())
            && self
                .convention
                .map_or(true, |c| c == node.traits().convention())
    }
}

impl Pattern {
    /// Abstract node of `kind` with the given child patterns.
    pub fn logical(kind: NodeKind, inputs: Vec<Pattern>) -> Self {
        Pattern::Node(
            NodeMatcher {
                kind: Some(kind),
                convention: Some(Convention::Abstract),
            },
            Inputs::Exactly(inputs),
        )
    }

    /// Node of `kind` in `convention`, whatever its inputs.
    pub fn kind_in(kind: NodeKind, convention: Convention) -> Self {
        Pattern::Node(
            NodeMatcher {
                kind: Some(kind),
                convention: Some(convention),
            },
            Inputs::Unchecked,
        )
    }

    /// Any node in `convention`.
    pub fn any_in(convention: Convention) -> Self {
        Pattern::Node(
            NodeMatcher {
                kind: None,
                convention: Some(convention),
            },
            Inputs::Unchecked,
        )
    }

    pub fn project_scan() -> Self {
        Self::logical(
            NodeKind::Project,
            vec![Self::logical(NodeKind::Scan, vec![])],
        )
    }

    pub fn project() -> Self {
        Self::logical(NodeKind::Project, vec![Pattern::Any])
    }

    pub fn project_project() -> Self {
        Self::logical(NodeKind::Project, vec![Self::project()])
    }

    pub fn filter_filter() -> Self {
        Self::logical(
            NodeKind::Filter,
            vec![Self::logical(NodeKind::Filter, vec![Pattern::Any])],
        )
    }

    pub fn filter_join() -> Self {
        Self::logical(
            NodeKind::Filter,
            vec![Self::logical(NodeKind::Join, vec![Pattern::Any, Pattern::Any])],
        )
    }

    /// The node kind a rule with this pattern fires on, if it is fixed.
    pub fn root_kind(&self) -> Option<NodeKind> {
        match self {
            Pattern::Node(matcher, _) => matcher.kind,
            _ => None,
        }
    }
}

/// Whether the plan rooted at `node` matches `pattern`.
pub fn matches(node: &AlgRef, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Any => true,
        Pattern::Leaf => node.inputs().is_empty(),
        Pattern::Node(matcher, inputs) => {
            if !matcher.accepts(node) {
                return false;
            }
            match inputs {
                Inputs::Unchecked => true,
                Inputs::Exactly(children) => {
                    let actual = node.inputs();
                    actual.len() == children.len()
                        && actual
                            .iter()
                            .zip(children.iter())
                            .all(|(input, child)| matches(input, child))
                }
            }
        }
    }
}
