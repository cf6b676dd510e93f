//! Binary join. Condition field references address `left` as input 0 and `right` as
//! input 1.

use super::{
    expect_inputs, push_format_term, AlgEnum, AlgInput, AlgInputExt, AlgNode, AlgRef,
    ExplainTerms, ExplainValue, NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::rex::RexRef;
use crate::stats::derive_join_rows;
use crate::traits::{RowFormat, TraitSet};
use crate::types::{RowType, TypeName};
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Whether fields of the left input may become NULL in the output.
    pub fn generates_nulls_on_left(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    pub fn generates_nulls_on_right(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }
}

impl AlgEnum for JoinType {
    const TYPE_NAME: &'static str = "join type";

    fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "INNER" => Some(JoinType::Inner),
            "LEFT" => Some(JoinType::Left),
            "RIGHT" => Some(JoinType::Right),
            "FULL" => Some(JoinType::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Join {
    traits: TraitSet,
    left: AlgRef,
    right: AlgRef,
    condition: RexRef,
    join_type: JoinType,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Join {
    pub fn create(
        traits: TraitSet,
        left: AlgRef,
        right: AlgRef,
        condition: RexRef,
        join_type: JoinType,
    ) -> Result<AlgRef> {
        Self::build(traits, left, right, condition, join_type, None)
    }

    fn build(
        traits: TraitSet,
        left: AlgRef,
        right: AlgRef,
        condition: RexRef,
        join_type: JoinType,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        if condition.ty().name() != TypeName::Boolean {
            return Err(AlgError::malformed(format!(
                "join condition {} has type {}",
                condition,
                condition.ty()
            )));
        }
        let row_type = Self::derive_row_type(left.row_type(), right.row_type(), join_type);
        Ok(Arc::new(Join {
            traits,
            left,
            right,
            condition,
            join_type,
            row_type,
            format,
        }))
    }

    fn derive_row_type(left: &RowType, right: &RowType, join_type: JoinType) -> RowType {
        let mut builder = RowType::builder();
        for (side, nullable) in [
            (left, join_type.generates_nulls_on_left()),
            (right, join_type.generates_nulls_on_right()),
        ] {
            for field in side.fields() {
                let ty = if nullable {
                    field.data_type.clone().with_nullable(true)
                } else {
                    field.data_type.clone()
                };
                builder.push(field.name.clone(), ty);
            }
        }
        builder.build()
    }

    pub fn left(&self) -> &AlgRef {
        &self.left
    }

    pub fn right(&self) -> &AlgRef {
        &self.right
    }

    pub fn condition(&self) -> &RexRef {
        &self.condition
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let left = input.input("left")?;
        let right = input.input("right")?;
        let condition = input.expression("condition")?;
        let join_type = input.enumeration::<JoinType>("joinType")?;
        Self::build(traits, left, right, condition, join_type, format)
    }
}

impl AlgNode for Join {
    fn kind(&self) -> NodeKind {
        NodeKind::Join
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        &self.row_type
    }

    fn inputs(&self) -> Vec<AlgRef> {
        vec![self.left.clone(), self.right.clone()]
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
        expect_inputs(self.kind(), &inputs, 2)?;
        let mut inputs = inputs.into_iter();
        let (Some(left), Some(right)) = (inputs.next(), inputs.next()) else {
            return Err(AlgError::malformed("join takes two inputs"));
        };
        Self::build(traits, left, right, self.condition.clone(), self.join_type, format)
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("left", ExplainValue::Input(self.left.clone())),
            ("right", ExplainValue::Input(self.right.clone())),
            ("condition", ExplainValue::Expr(self.condition.clone())),
            ("joinType", ExplainValue::Str(self.join_type.as_str().to_string())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        match input_rows {
            [left, right, ..] => derive_join_rows(*left, *right),
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Scan;
    use super::*;

    #[test]
    fn test_outer_join_nullability() {
        let rex = context().rex_builder();
        let emp = Scan::create(TraitSet::abstract_(), emp());
        let dept = Scan::create(TraitSet::abstract_(), dept());
        let cond = rex
            .equals(
                rex.field_ref(0, 2, emp.row_type()).unwrap(),
                rex.field_ref(1, 0, dept.row_type()).unwrap(),
            )
            .unwrap();

        let inner = Join::create(TraitSet::abstract_(), emp.clone(), dept.clone(), cond.clone(), JoinType::Inner).unwrap();
        assert_eq!(inner.row_type().field_count(), 6);
        assert!(!inner.row_type().field(4).unwrap().data_type.is_nullable());

        let left = Join::create(TraitSet::abstract_(), emp, dept, cond, JoinType::Left).unwrap();
        assert!(!left.row_type().field(0).unwrap().data_type.is_nullable());
        assert!(left.row_type().field(4).unwrap().data_type.is_nullable());
    }
}
