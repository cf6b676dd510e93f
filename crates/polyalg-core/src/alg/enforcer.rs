//! Control-flow nodes around write plans.
//!
//! - [`ConstraintEnforcer`]: a modification (`left`) followed by a read-only control
//!   plan (`right`). Any row produced by the control plan is a constraint violation.
//! - [`ConditionalExecute`]: runs `right` only when the row count of `left` satisfies a
//!   [`Condition`], otherwise fails with a caller-supplied exception.
//! - [`ContextSwitcher`]: runs its input under a different execution context.
//!
//! The runtime side of these nodes lives in [`crate::exec`]; the nodes themselves only
//! carry the parameters.

use super::{
    expect_inputs, push_format_term, AlgEnum, AlgInput, AlgInputExt, AlgNode, AlgRef,
    ExplainTerms, ExplainValue, NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::exec::Condition;
use crate::traits::{RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

fn split_pair(kind: NodeKind, inputs: Vec<AlgRef>) -> Result<(AlgRef, AlgRef)> {
    expect_inputs(kind, &inputs, 2)?;
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next()) {
        (Some(left), Some(right)) => Ok((left, right)),
        _ => Err(AlgError::malformed(format!("{} takes two inputs", kind))),
    }
}

#[derive(Debug, Clone)]
pub struct ConstraintEnforcer {
    traits: TraitSet,
    modify: AlgRef,
    control: AlgRef,
    exception_classes: Vec<String>,
    exception_messages: Vec<String>,
    format: Option<RowFormat>,
}

impl ConstraintEnforcer {
    /// Exception `i` is raised for a violation of constraint `i`.
    pub fn create(
        traits: TraitSet,
        modify: AlgRef,
        control: AlgRef,
        exception_classes: Vec<String>,
        exception_messages: Vec<String>,
    ) -> Result<AlgRef> {
        Self::build(traits, modify, control, exception_classes, exception_messages, None)
    }

    fn build(
        traits: TraitSet,
        modify: AlgRef,
        control: AlgRef,
        exception_classes: Vec<String>,
        exception_messages: Vec<String>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        if exception_classes.is_empty() || exception_classes.len() != exception_messages.len() {
            return Err(AlgError::malformed(format!(
                "constraint enforcer needs matching exception lists, got {} classes and {} messages",
                exception_classes.len(),
                exception_messages.len()
            )));
        }
        Ok(Arc::new(ConstraintEnforcer {
            traits,
            modify,
            control,
            exception_classes,
            exception_messages,
            format,
        }))
    }

    pub fn modify(&self) -> &AlgRef {
        &self.modify
    }

    pub fn control(&self) -> &AlgRef {
        &self.control
    }

    /// `(class, message)` pairs, one per constraint.
    pub fn exceptions(&self) -> Vec<(String, String)> {
        self.exception_classes
            .iter()
            .cloned()
            .zip(self.exception_messages.iter().cloned())
            .collect()
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let modify = input.input("left")?;
        let control = input.input("right")?;
        let classes = input.string_list("exceptionClasses")?;
        let messages = input.string_list("exceptionMessages")?;
        Self::build(traits, modify, control, classes, messages, format)
    }
}

impl AlgNode for ConstraintEnforcer {
    fn kind(&self) -> NodeKind {
        NodeKind::ConstraintEnforcer
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        self.modify.row_type()
    }

    fn inputs(&self) -> Vec<AlgRef> {
        vec![self.modify.clone(), self.control.clone()]
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
        let (modify, control) = split_pair(self.kind(), inputs)?;
        Self::build(
            traits,
            modify,
            control,
            self.exception_classes.clone(),
            self.exception_messages.clone(),
            format,
        )
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("left", ExplainValue::Input(self.modify.clone())),
            ("right", ExplainValue::Input(self.control.clone())),
            ("exceptionClasses", ExplainValue::StrList(self.exception_classes.clone())),
            ("exceptionMessages", ExplainValue::StrList(self.exception_messages.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConditionalExecute {
    traits: TraitSet,
    left: AlgRef,
    right: AlgRef,
    condition: Condition,
    exception_class: String,
    exception_message: String,
    format: Option<RowFormat>,
}

impl ConditionalExecute {
    pub fn create(
        traits: TraitSet,
        left: AlgRef,
        right: AlgRef,
        condition: Condition,
        exception_class: impl Into<String>,
        exception_message: impl Into<String>,
    ) -> AlgRef {
        Arc::new(ConditionalExecute {
            traits,
            left,
            right,
            condition,
            exception_class: exception_class.into(),
            exception_message: exception_message.into(),
            format: None,
        })
    }

    pub fn left(&self) -> &AlgRef {
        &self.left
    }

    pub fn right(&self) -> &AlgRef {
        &self.right
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn exception_class(&self) -> &str {
        &self.exception_class
    }

    pub fn exception_message(&self) -> &str {
        &self.exception_message
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        Ok(Arc::new(ConditionalExecute {
            traits,
            left: input.input("left")?,
            right: input.input("right")?,
            condition: input.enumeration::<Condition>("condition")?,
            exception_class: input.string("exceptionClass")?,
            exception_message: input.string("exceptionMessage")?,
            format,
        }))
    }
}

impl AlgNode for ConditionalExecute {
    fn kind(&self) -> NodeKind {
        NodeKind::ConditionalExecute
    }

    fn traits(&self) -> &TraitSet {
        &self.traits
    }

    fn row_type(&self) -> &RowType {
        self.right.row_type()
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
        let (left, right) = split_pair(self.kind(), inputs)?;
        Ok(Arc::new(ConditionalExecute {
            traits,
            left,
            right,
            condition: self.condition,
            exception_class: self.exception_class.clone(),
            exception_message: self.exception_message.clone(),
            format,
        }))
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("left", ExplainValue::Input(self.left.clone())),
            ("right", ExplainValue::Input(self.right.clone())),
            ("condition", ExplainValue::Str(self.condition.as_str().to_string())),
            ("exceptionClass", ExplainValue::Str(self.exception_class.clone())),
            ("exceptionMessage", ExplainValue::Str(self.exception_message.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        input_rows.get(1).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ContextSwitcher {
    traits: TraitSet,
    input: AlgRef,
    format: Option<RowFormat>,
}

impl ContextSwitcher {
    pub fn create(traits: TraitSet, input: AlgRef) -> AlgRef {
        Arc::new(ContextSwitcher {
            traits,
            input,
            format: None,
        })
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        Ok(Arc::new(ContextSwitcher {
            traits,
            input: input.input("input")?,
            format,
        }))
    }
}

impl AlgNode for ContextSwitcher {
    fn kind(&self) -> NodeKind {
        NodeKind::ContextSwitcher
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
        Ok(Arc::new(ContextSwitcher {
            traits,
            input: inputs.remove(0),
            format,
        }))
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![("input", ExplainValue::Input(self.input.clone()))];
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
    use super::super::Scan;
    use super::*;

    #[test]
    fn test_enforcer_exception_lists_must_match() {
        let modify = Scan::create(TraitSet::abstract_(), emp());
        let control = Scan::create(TraitSet::abstract_(), dept());
        let err = ConstraintEnforcer::create(
            TraitSet::abstract_(),
            modify.clone(),
            control.clone(),
            vec!["UniqueViolation".into()],
            vec![],
        );
        assert!(err.is_err());
        let ok = ConstraintEnforcer::create(
            TraitSet::abstract_(),
            modify.clone(),
            control,
            vec!["UniqueViolation".into()],
            vec!["duplicate key".into()],
        )
        .unwrap();
        assert_eq!(ok.row_type(), modify.row_type());
    }

    #[test]
    fn test_conditional_execute_takes_right_row_type() {
        let left = Scan::create(TraitSet::abstract_(), emp());
        let right = Scan::create(TraitSet::abstract_(), dept());
        let node = ConditionalExecute::create(
            TraitSet::abstract_(),
            left,
            right.clone(),
            Condition::GreaterZero,
            "NotFound",
            "no rows",
        );
        assert_eq!(node.row_type(), right.row_type());
        assert_eq!(node.inputs().len(), 2);
    }
}
