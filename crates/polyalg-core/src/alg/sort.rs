use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::catalog::Catalog;
use crate::cost::Cost;
use crate::error::{AlgError, Result};
use crate::traits::{Collation, RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

/// Orders its input by `collation`, optionally skipping `offset` rows and keeping at
/// most `fetch`. The node's collation trait is the sort collation.
#[derive(Debug, Clone)]
pub struct Sort {
    traits: TraitSet,
    input: AlgRef,
    collation: Collation,
    offset: Option<i64>,
    fetch: Option<i64>,
    format: Option<RowFormat>,
}

impl Sort {
    pub fn create(
        traits: TraitSet,
        input: AlgRef,
        collation: Collation,
        offset: Option<i64>,
        fetch: Option<i64>,
    ) -> Result<AlgRef> {
        Self::build(traits, input, collation, offset, fetch, None)
    }

    fn build(
        traits: TraitSet,
        input: AlgRef,
        collation: Collation,
        offset: Option<i64>,
        fetch: Option<i64>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        let field_count = input.row_type().field_count();
        if let Some(key) = collation.keys().iter().find(|k| k.field >= field_count) {
            return Err(AlgError::malformed(format!(
                "sort key {} out of range for {} fields",
                key.field, field_count
            )));
        }
        if offset.map_or(false, |o| o < 0) || fetch.map_or(false, |f| f < 0) {
            return Err(AlgError::malformed("negative offset or fetch"));
        }
        Ok(Arc::new(Sort {
            traits: traits.with_collation(collation.clone()),
            input,
            collation,
            offset,
            fetch,
            format,
        }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn fetch(&self) -> Option<i64> {
        self.fetch
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let collation = input.collation("collation")?;
        let offset = input.opt_integer("offset")?;
        let fetch = input.opt_integer("fetch")?;
        Self::build(traits, child, collation, offset, fetch, format)
    }
}

impl AlgNode for Sort {
    fn kind(&self) -> NodeKind {
        NodeKind::Sort
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        self.input.row_type()
    }

    fn inputs(&self) -> Vec<AlgRef> {
        vec![self.input.clone()]
    }

    fn format(&self) -> Option<RowFormat> {
        self.format
    }

    fn copy_as(
        &self,
        traits: TraitSet,
        mut inputs: Vec<AlgRef>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        expect_inputs(self.kind(), &inputs, 1)?;
        Self::build(
            traits,
            inputs.remove(0),
            self.collation.clone(),
            self.offset,
            self.fetch,
            format,
        )
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("collation", ExplainValue::Collation(self.collation.clone())),
        ];
        if let Some(offset) = self.offset {
            terms.push(("offset", ExplainValue::Int(offset)));
        }
        if let Some(fetch) = self.fetch {
            terms.push(("fetch", ExplainValue::Int(fetch)));
        }
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        let rows = input_rows.first().copied().unwrap_or(1.0);
        let rows = (rows - self.offset.unwrap_or(0) as f64).max(1.0);
        match self.fetch {
            Some(fetch) => rows.min(fetch as f64).max(1.0),
            None => rows,
        }
    }

    /// `n log n` comparisons over the input rows.
    fn self_cost(&self, _rows: f64, input_rows: &[f64]) -> Cost {
        let n = input_rows.first().copied().unwrap_or(1.0).max(1.0);
        Cost::new(n * n.log2().max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Scan;
    use super::*;
    use crate::traits::FieldCollation;

    #[test]
    fn test_sort_sets_collation_trait() {
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let collation = Collation::of(vec![FieldCollation::desc(3)]);
        let sort = Sort::create(TraitSet::abstract_(), scan, collation.clone(), None, Some(10)).unwrap();
        assert_eq!(sort.traits().collation(), &collation);
        assert_eq!(sort.estimate_row_count(&[1000.0], &crate::catalog::InMemoryCatalog::new()), 10.0);
    }

    #[test]
    fn test_sort_key_out_of_range() {
        let scan = Scan::create(TraitSet::abstract_(), dept());
        let collation = Collation::of(vec![FieldCollation::asc(5)]);
        assert!(Sort::create(TraitSet::abstract_(), scan, collation, None, None).is_err());
    }
}
