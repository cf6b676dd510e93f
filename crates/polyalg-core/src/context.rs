//! Long-lived context shared by every component that builds or resolves plans.
//!
//! The operator table and the node registry are built once and passed around by
//! reference instead of living in global state.

use crate::alg::registry::NodeRegistry;
use crate::catalog::Catalog;
use crate::operator::OperatorTable;
use crate::rex::RexBuilder;
use crate::types::TypeSystem;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct AlgContext {
    type_system: TypeSystem,
    operators: Arc<OperatorTable>,
    nodes: Arc<NodeRegistry>,
    catalog: Arc<dyn Catalog>,
}

impl fmt::Debug for AlgContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgContext")
            .field("type_system", &self.type_system)
            .field("node_kinds", &self.nodes.len())
            .finish()
    }
}

impl AlgContext {
    /// Context with the standard operator table and node registry.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            type_system: TypeSystem::default(),
            operators: Arc::new(OperatorTable::standard()),
            nodes: Arc::new(NodeRegistry::standard()),
            catalog,
        }
    }

    pub fn with_type_system(mut self, type_system: TypeSystem) -> Self {
        self.type_system = type_system;
        self
    }

    pub fn with_operators(mut self, operators: OperatorTable) -> Self {
        self.operators = Arc::new(operators);
        self
    }

    pub fn with_nodes(mut self, nodes: NodeRegistry) -> Self {
        self.nodes = Arc::new(nodes);
        self
    }

    pub fn type_system(&self) -> &TypeSystem {
        &self.type_system
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.operators
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn rex_builder(&self) -> RexBuilder {
        RexBuilder::new(self.type_system.clone(), self.operators.clone())
    }
}
