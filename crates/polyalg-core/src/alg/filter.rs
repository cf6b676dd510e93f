use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::rex::RexRef;
use crate::stats::derive_filter_rows;
use crate::traits::{RowFormat, TraitSet};
use crate::types::{RowType, TypeName};
use std::any::Any;
use std::sync::Arc;

/// Keeps the input rows for which `condition` is true. Preserves the input's order.
#[derive(Debug, Clone)]
pub struct Filter {
    traits: TraitSet,
    input: AlgRef,
    condition: RexRef,
    format: Option<RowFormat>,
}

impl Filter {
    pub fn create(traits: TraitSet, input: AlgRef, condition: RexRef) -> Result<AlgRef> {
        Self::build(traits, input, condition, None)
    }

    fn build(
        traits: TraitSet,
        input: AlgRef,
        condition: RexRef,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        if condition.ty().name() != TypeName::Boolean {
            return Err(AlgError::malformed(format!(
                "filter condition {} has type {}",
                condition,
                condition.ty()
            )));
        }
        let traits = traits.with_collation(input.traits().collation().clone());
        Ok(Arc::new(Filter {
            traits,
            input,
            condition,
            format,
        }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub fn condition(&self) -> &RexRef {
        &self.condition
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let condition = input.expression("condition")?;
        Self::build(traits, child, condition, format)
    }
}

impl AlgNode for Filter {
    fn kind(&self) -> NodeKind {
        NodeKind::Filter
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
        Self::build(traits, inputs.remove(0), self.condition.clone(), format)
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("condition", ExplainValue::Expr(self.condition.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        derive_filter_rows(input_rows.first().copied().unwrap_or(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Scan;
    use super::*;

    #[test]
    fn test_condition_must_be_boolean() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let not_boolean = rex.field_ref(0, 0, scan.row_type()).unwrap();
        assert!(Filter::create(TraitSet::abstract_(), scan, not_boolean).is_err());
    }
}
