//! Projection: one output field per expression over the input row.

use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::error::{AlgError, Result};
use crate::rex::{RexNode, RexRef};
use crate::traits::{RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Project {
    traits: TraitSet,
    input: AlgRef,
    exprs: Vec<RexRef>,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Project {
    /// Projection of `exprs` named `names`. The two lists must have equal length.
    pub fn create(
        traits: TraitSet,
        input: AlgRef,
        exprs: Vec<RexRef>,
        names: Vec<String>,
    ) -> Result<AlgRef> {
        Self::build(traits, input, exprs, names, None)
    }

    /// Projection keeping the input names of plain field references and naming
    /// everything else `$f<i>`.
    pub fn with_derived_names(traits: TraitSet, input: AlgRef, exprs: Vec<RexRef>) -> Result<AlgRef> {
        let names = exprs
            .iter()
            .enumerate()
            .map(|(i, e)| match e.as_ref() {
                RexNode::FieldRef { input: 0, index, .. } => input
                    .row_type()
                    .field(*index)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| format!("$f{}", i)),
                _ => format!("$f{}", i),
            })
            .collect();
        Self::create(traits, input, exprs, names)
    }

    fn build(
        traits: TraitSet,
        input: AlgRef,
        exprs: Vec<RexRef>,
        names: Vec<String>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        if exprs.len() != names.len() {
            return Err(AlgError::malformed(format!(
                "project has {} expressions but {} names",
                exprs.len(),
                names.len()
            )));
        }
        let mut builder = RowType::builder();
        for (name, expr) in names.into_iter().zip(exprs.iter()) {
            builder.push(name, expr.ty().clone());
        }
        Ok(Arc::new(Project {
            traits,
            input,
            exprs,
            row_type: builder.build(),
            format,
        }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub fn exprs(&self) -> &[RexRef] {
        &self.exprs
    }

    /// Input field indexes when every expression is a plain field reference.
    pub fn as_field_mapping(&self) -> Option<Vec<usize>> {
        self.exprs
            .iter()
            .map(|e| match e.as_ref() {
                RexNode::FieldRef { input: 0, index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    /// Reproduces its input unchanged: `$0..$n` in order, with the input's names.
    pub fn is_identity(&self) -> bool {
        let input_type = self.input.row_type();
        self.exprs.len() == input_type.field_count()
            && self
                .as_field_mapping()
                .map(|m| m.iter().enumerate().all(|(i, &f)| i == f))
                .unwrap_or(false)
            && self.row_type.field_names() == input_type.field_names()
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let exprs = input.expression_list("exprs")?;
        let names = input.string_list("fields")?;
        Self::build(traits, child, exprs, names, format)
    }
}

impl AlgNode for Project {
    fn kind(&self) -> NodeKind {
        NodeKind::Project
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        &self.row_type
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
            self.exprs.clone(),
            self.row_type.field_names(),
            format,
        )
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("exprs", ExplainValue::ExprList(self.exprs.clone())),
            ("fields", ExplainValue::StrList(self.row_type.field_names())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{downcast, Scan};
    use super::*;

    #[test]
    fn test_identity_requires_names() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), dept());
        let rt = scan.row_type().clone();
        let refs = vec![rex.field_ref(0, 0, &rt).unwrap(), rex.field_ref(0, 1, &rt).unwrap()];

        let same = Project::with_derived_names(TraitSet::abstract_(), scan.clone(), refs.clone()).unwrap();
        assert!(downcast::<Project>(&same).unwrap().is_identity());

        let renamed = Project::create(
            TraitSet::abstract_(),
            scan,
            refs,
            vec!["deptno".into(), "label".into()],
        )
        .unwrap();
        assert!(!downcast::<Project>(&renamed).unwrap().is_identity());
    }

    #[test]
    fn test_row_type_rederived_on_copy() {
        let ctx = context();
        let rex = ctx.rex_builder();
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let expr = rex.field_ref(0, 3, scan.row_type()).unwrap();
        let project =
            Project::create(TraitSet::abstract_(), scan.clone(), vec![expr], vec!["pay".into()]).unwrap();
        let copied = project.with_inputs(vec![scan]).unwrap();
        assert_eq!(copied.row_type(), project.row_type());
        assert_eq!(copied.row_type().field_names(), vec!["pay"]);
    }
}
