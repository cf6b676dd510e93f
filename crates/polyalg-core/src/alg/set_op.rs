use super::{
    push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue, NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::traits::{RowFormat, TraitSet};
use crate::types::{RowType, TypeSystem};
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOpKind {
    Union,
    Intersect,
    Minus,
}

impl SetOpKind {
    fn node_kind(&self) -> NodeKind {
        match self {
            SetOpKind::Union => NodeKind::Union,
            SetOpKind::Intersect => NodeKind::Intersect,
            SetOpKind::Minus => NodeKind::Minus,
        }
    }
}

/// `UNION`, `INTERSECT` or `MINUS` over two or more inputs of equal arity. Column `i`
/// of the output has the least restrictive type of column `i` of every input and the
/// name from the first input.
#[derive(Debug, Clone)]
pub struct SetOp {
    traits: TraitSet,
    kind: SetOpKind,
    inputs: Vec<AlgRef>,
    all: bool,
    type_system: TypeSystem,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl SetOp {
    pub fn create(
        traits: TraitSet,
        kind: SetOpKind,
        inputs: Vec<AlgRef>,
        all: bool,
        type_system: TypeSystem,
    ) -> Result<AlgRef> {
        Self::build(traits, kind, inputs, all, type_system, None)
    }

    fn build(
        traits: TraitSet,
        kind: SetOpKind,
        inputs: Vec<AlgRef>,
        all: bool,
        type_system: TypeSystem,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        let row_type = Self::derive_row_type(kind, &inputs, &type_system)?;
        Ok(Arc::new(SetOp {
            traits,
            kind,
            inputs,
            all,
            type_system,
            row_type,
            format,
        }))
    }

    fn derive_row_type(kind: SetOpKind, inputs: &[AlgRef], type_system: &TypeSystem) -> Result<RowType> {
        let Some(first) = inputs.first() else {
            return Err(AlgError::malformed(format!("{} needs at least one input", kind.node_kind())));
        };
        let arity = first.row_type().field_count();
        if let Some(bad) = inputs.iter().position(|i| i.row_type().field_count() != arity) {
            return Err(AlgError::malformed(format!(
                "{} input {} has {} fields, expected {}",
                kind.node_kind(),
                bad,
                inputs[bad].row_type().field_count(),
                arity
            )));
        }
        let mut builder = RowType::builder();
        for (i, field) in first.row_type().fields().iter().enumerate() {
            let column: Vec<_> = inputs
                .iter()
                .filter_map(|input| input.row_type().field(i).map(|f| f.data_type.clone()))
                .collect();
            let ty = type_system.least_restrictive(&column).ok_or_else(|| {
                AlgError::malformed(format!(
                    "{} column {} has no common type",
                    kind.node_kind(),
                    field.name
                ))
            })?;
            builder.push(field.name.clone(), ty);
        }
        Ok(builder.build())
    }

    pub fn set_kind(&self) -> SetOpKind {
        self.kind
    }

    pub fn all(&self) -> bool {
        self.all
    }

    pub(crate) fn reader(
        kind: SetOpKind,
    ) -> impl Fn(&dyn AlgInput, TraitSet, Option<RowFormat>) -> Result<AlgRef> + Send + Sync {
        move |input, traits, format| {
            let inputs = input.inputs("inputs")?;
            let all = input.boolean("all")?;
            let type_system = *input.context().type_system();
            Self::build(traits, kind, inputs, all, type_system, format)
        }
    }
}

impl AlgNode for SetOp {
    fn kind(&self) -> NodeKind {
        self.kind.node_kind()
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        &self.row_type
    }

    fn inputs(&self) -> Vec<AlgRef> {
        self.inputs.clone()
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
        Self::build(traits, self.kind, inputs, self.all, self.type_system, format)
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("inputs", ExplainValue::Inputs(self.inputs.clone())),
            ("all", ExplainValue::Bool(self.all)),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        let rows = match self.kind {
            SetOpKind::Union => input_rows.iter().sum(),
            SetOpKind::Intersect => input_rows.iter().copied().fold(f64::INFINITY, f64::min),
            SetOpKind::Minus => input_rows.first().copied().unwrap_or(1.0),
        };
        if rows.is_finite() {
            rows.max(1.0)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{Project, Scan};
    use super::*;
    use crate::types::DataType;

    #[test]
    fn test_union_least_restrictive_columns() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let emp = Scan::create(TraitSet::abstract_(), emp());
        let dept = Scan::create(TraitSet::abstract_(), dept());
        let emp_ids = Project::create(
            TraitSet::abstract_(),
            emp.clone(),
            vec![rex.field_ref(0, 2, emp.row_type()).unwrap()],
            vec!["k".into()],
        )
        .unwrap();
        let dept_ids = Project::create(
            TraitSet::abstract_(),
            dept,
            vec![rex.field_ref(0, 0, &dept_row_type()).unwrap()],
            vec!["deptno".into()],
        )
        .unwrap();
        let union = SetOp::create(
            TraitSet::abstract_(),
            SetOpKind::Union,
            vec![emp_ids, dept_ids],
            true,
            *ctx.type_system(),
        )
        .unwrap();
        assert_eq!(union.kind(), NodeKind::Union);
        assert_eq!(union.row_type().field_names(), vec!["k"]);
        assert_eq!(
            union.row_type().field(0).unwrap().data_type,
            DataType::integer().with_nullable(true)
        );

        let mismatched = SetOp::create(
            TraitSet::abstract_(),
            SetOpKind::Minus,
            vec![emp, Scan::create(TraitSet::abstract_(), super::super::test_support::dept())],
            false,
            *ctx.type_system(),
        );
        assert!(mismatched.is_err());
    }
}
