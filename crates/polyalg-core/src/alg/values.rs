//! Inline literal rows.
//!
//! Every tuple has one literal per field of the declared row type. An empty `Values`
//! is a valid relation with no rows and estimates zero rows.

use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::rex::{RexNode, RexRef};
use crate::traits::{RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

/// Literal rows with a declared row type.
#[derive(Debug, Clone)]
pub struct Values {
    traits: TraitSet,
    row_type: RowType,
    tuples: Vec<Vec<RexRef>>,
    format: Option<RowFormat>,
}

impl Values {
    pub fn create(traits: TraitSet, row_type: RowType, tuples: Vec<Vec<RexRef>>) -> Result<AlgRef> {
        Self::build(traits, row_type, tuples, None)
    }

    fn build(
        traits: TraitSet,
        row_type: RowType,
        tuples: Vec<Vec<RexRef>>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        for (i, tuple) in tuples.iter().enumerate() {
            if tuple.len() != row_type.field_count() {
                return Err(AlgError::malformed(format!(
                    "tuple {} has {} values, row type has {} fields",
                    i,
                    tuple.len(),
                    row_type.field_count()
                )));
            }
            if let Some(bad) = tuple.iter().position(|v| !matches!(v.as_ref(), RexNode::Literal { .. })) {
                return Err(AlgError::malformed(format!(
                    "tuple {} value {} is not a literal",
                    i, bad
                )));
            }
        }
        Ok(Arc::new(Values {
            traits,
            row_type,
            tuples,
            format,
        }))
    }

    pub fn tuples(&self) -> &[Vec<RexRef>] {
        &self.tuples
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let row_type = input.row_type("type")?;
        let tuples = input.tuples("tuples", &row_type)?;
        Self::build(traits, row_type, tuples, format)
    }
}

impl AlgNode for Values {
    fn kind(&self) -> NodeKind {
        NodeKind::Values
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
        Self::build(traits, self.row_type.clone(), self.tuples.clone(), format)
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("type", ExplainValue::RowType(self.row_type.clone())),
            ("tuples", ExplainValue::Tuples(self.tuples.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, _input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        self.tuples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::stats::row_count;
    use crate::types::DataType;

    #[test]
    fn test_tuple_arity_checked() {
        let rex = context().rex_builder();
        let rt = RowType::builder()
            .add("a", DataType::integer())
            .add("b", DataType::boolean())
            .build();
        let ok = Values::create(
            TraitSet::abstract_(),
            rt.clone(),
            vec![vec![rex.integer(1), rex.boolean(true)]],
        );
        assert!(ok.is_ok());
        let short = Values::create(TraitSet::abstract_(), rt, vec![vec![rex.integer(1)]]);
        assert!(short.is_err());
    }

    #[test]
    fn test_row_estimate_is_tuple_count() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let rt = RowType::builder().add("a", DataType::integer()).build();
        let empty = Values::create(TraitSet::abstract_(), rt.clone(), vec![]).unwrap();
        assert_eq!(row_count(&empty, ctx.catalog()), 0.0);
        let two = Values::create(
            TraitSet::abstract_(),
            rt,
            vec![vec![rex.integer(1)], vec![rex.integer(2)]],
        )
        .unwrap();
        assert_eq!(row_count(&two, ctx.catalog()), 2.0);
    }
}
