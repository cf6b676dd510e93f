//! Leaf scan over a catalog entity.
//!
//! A scan may be narrowed to a subset of the entity's fields. Narrowing changes the
//! scan's self-cost by [`crate::cost::narrowing_cost`], which is what makes
//! project-into-scan pushdown attractive to a cost-driven planner.

use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::catalog::{Catalog, EntityRef};
use crate::cost::{narrowing_cost, Cost};
use crate::error::{AlgError, Result};
use crate::stats::DEFAULT_ROW_COUNT;
use crate::traits::{RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Scan {
    traits: TraitSet,
    entity: EntityRef,
    fields: Option<Vec<usize>>,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Scan {
    /// Scan of every field of `entity`.
    pub fn create(traits: TraitSet, entity: EntityRef) -> AlgRef {
        let row_type = entity.row_type.clone();
        Arc::new(Scan {
            traits,
            entity,
            fields: None,
            row_type,
            format: None,
        })
    }

    /// Scan of the given entity fields, in the given order.
    pub fn narrowed(traits: TraitSet, entity: EntityRef, fields: Vec<usize>) -> Result<AlgRef> {
        Self::build(traits, entity, Some(fields), None)
    }

    fn build(
        traits: TraitSet,
        entity: EntityRef,
        fields: Option<Vec<usize>>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        let row_type = match &fields {
            None => entity.row_type.clone(),
            Some(fields) => entity.row_type.project(fields).ok_or_else(|| {
                AlgError::malformed(format!("scan field list {:?} out of range for {}", fields, entity))
            })?,
        };
        Ok(Arc::new(Scan {
            traits,
            entity,
            fields,
            row_type,
            format,
        }))
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Entity field indexes this scan produces, `None` for all of them.
    pub fn fields(&self) -> Option<&[usize]> {
        self.fields.as_deref()
    }

    /// Entity field index behind output field `i`.
    pub fn source_field(&self, i: usize) -> usize {
        match &self.fields {
            Some(fields) => fields.get(i).copied().unwrap_or(i),
            None => i,
        }
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let entity = input.entity("entity")?;
        let fields = if input.has("fields") {
            Some(input.integer_list("fields")?)
        } else {
            None
        };
        Self::build(traits, entity, fields, format)
    }
}

impl AlgNode for Scan {
    fn kind(&self) -> NodeKind {
        NodeKind::Scan
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        &self.row_type
    }

    fn inputs(&self) -> Vec<AlgRef> {
        Vec::new()
    }

    fn format(&self) -> Option<RowFormat> {
        self.format
    }

    fn copy_as(
        &self,
        traits: TraitSet,
        inputs: Vec<AlgRef>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        expect_inputs(self.kind(), &inputs, 0)?;
        Self::build(traits, self.entity.clone(), self.fields.clone(), format)
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![("entity", ExplainValue::Entity(self.entity.clone()))];
        if let Some(fields) = &self.fields {
            terms.push(("fields", ExplainValue::IntList(fields.clone())));
        }
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, _input_rows: &[f64], catalog: &dyn Catalog) -> f64 {
        catalog
            .statistics(&self.entity)
            .map(|s| s.row_count)
            .unwrap_or(DEFAULT_ROW_COUNT)
    }

    fn self_cost(&self, rows: f64, _input_rows: &[f64]) -> Cost {
        let total = self.entity.row_type.field_count();
        let kept = self.row_type.field_count();
        narrowing_cost(Cost::new(rows), kept, total)
    }
}
