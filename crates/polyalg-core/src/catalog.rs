//! # Catalog and Scan Contracts
//!
//! The plan IR does not own metadata. It consumes two narrow interfaces:
//!
//! - [`Catalog`]: resolves a `(namespace, name)` pair to a stable [`EntityRef`] with a
//!   row type, and optionally provides statistics and a scannable source for it. The
//!   plan reader uses it to rebuild scan nodes from serialized identifiers.
//! - [`ScannableEntity`]: the leaf contract an adapter implements. It exposes a row
//!   type and produces a lazy row sequence for a [`DataContext`].
//!
//! [`InMemoryCatalog`] keys entities by `"namespace.name"` and is populated
//! programmatically.

use crate::error::Result;
use crate::exec::{DataContext, Row};
use crate::stats::Statistics;
use crate::types::RowType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable handle to a table-like entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub namespace: String,
    pub name: String,
    pub row_type: RowType,
}

impl EntityRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, row_type: RowType) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            row_type,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Lazy, possibly unbounded, sequence of rows.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// Leaf data source implemented by an adapter.
pub trait ScannableEntity: Send + Sync {
    fn row_type(&self) -> &RowType;

    /// Starts a scan. Nothing is read until the returned iterator is polled.
    fn scan(&self, ctx: &DataContext) -> Result<RowIter>;
}

pub trait Catalog: Send + Sync {
    fn entity(&self, namespace: &str, name: &str) -> Option<EntityRef>;

    fn statistics(&self, _entity: &EntityRef) -> Option<Statistics> {
        None
    }

    fn source(&self, _entity: &EntityRef) -> Option<Arc<dyn ScannableEntity>> {
        None
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    entities: HashMap<String, EntityRef>,
    statistics: HashMap<String, Statistics>,
    sources: HashMap<String, Arc<dyn ScannableEntity>>,
}

impl fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCatalog")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: EntityRef, stats: Option<Statistics>) -> EntityRef {
        let key = entity.qualified_name();
        if let Some(stats) = stats {
            self.statistics.insert(key.clone(), stats);
        }
        self.entities.insert(key, entity.clone());
        entity
    }

    pub fn add_source(&mut self, entity: &EntityRef, source: Arc<dyn ScannableEntity>) {
        self.sources.insert(entity.qualified_name(), source);
    }
}

impl Catalog for InMemoryCatalog {
    fn entity(&self, namespace: &str, name: &str) -> Option<EntityRef> {
        self.entities.get(&format!("{}.{}", namespace, name)).cloned()
    }

    fn statistics(&self, entity: &EntityRef) -> Option<Statistics> {
        self.statistics.get(&entity.qualified_name()).cloned()
    }

    fn source(&self, entity: &EntityRef) -> Option<Arc<dyn ScannableEntity>> {
        self.sources.get(&entity.qualified_name()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn test_lookup_by_namespace_and_name() {
        let mut catalog = InMemoryCatalog::new();
        let rt = RowType::builder().add("id", DataType::integer()).build();
        catalog.add_entity(
            EntityRef::new("public", "emp", rt.clone()),
            Some(Statistics::new(42.0, 420.0)),
        );
        let entity = catalog.entity("public", "emp").unwrap();
        assert_eq!(entity.row_type, rt);
        assert_eq!(catalog.statistics(&entity).unwrap().row_count, 42.0);
        assert!(catalog.entity("public", "dept").is_none());
        assert!(catalog.source(&entity).is_none());
    }
}
