use super::{expect_inputs, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue, NodeKind};
use crate::cost::Cost;
use crate::error::{AlgError, Result};
use crate::traits::{Convention, RowFormat, TraitSet};
use crate::types::RowType;
use std::any::Any;
use std::sync::Arc;

/// Type name of the only interpreted node.
pub const INTERPRETABLE_TYPE_NAME: &str = "algebra.interpreted.Interpretable";

/// Extra cost per row of interpreting instead of running compiled code.
const INTERPRETATION_OVERHEAD: f64 = 0.1;

/// Executes a compiled subtree without a compilation step. It can wrap any compiled
/// plan, so it is the terminal sink of the conversion pipeline.
#[derive(Debug, Clone)]
pub struct Interpretable {
    traits: TraitSet,
    input: AlgRef,
}

impl Interpretable {
    pub fn create(traits: TraitSet, input: AlgRef) -> Result<AlgRef> {
        if input.traits().convention() != Convention::Compiled {
            return Err(AlgError::malformed(format!(
                "Interpretable wraps compiled plans, got {}",
                input.type_name()
            )));
        }
        let traits = traits
            .with_convention(Convention::Interpreted)
            .with_collation(input.traits().collation().clone());
        Ok(Arc::new(Interpretable { traits, input }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, _format: Option<RowFormat>) -> Result<AlgRef> {
        Self::create(traits, input.input("input")?)
    }
}

impl AlgNode for Interpretable {
    fn kind(&self) -> NodeKind {
        NodeKind::Interpretable
    }

    fn type_name(&self) -> String {
        INTERPRETABLE_TYPE_NAME.to_string()
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

    fn copy_as(
        &self,
        traits: TraitSet,
        mut inputs: Vec<AlgRef>,
        _format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        expect_inputs(self.kind(), &inputs, 1)?;
        Self::create(traits, inputs.remove(0))
    }

    fn explain_terms(&self) -> ExplainTerms {
        vec![("input", ExplainValue::Input(self.input.clone()))]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn self_cost(&self, rows: f64, _input_rows: &[f64]) -> Cost {
        Cost::new(rows * INTERPRETATION_OVERHEAD)
    }
}
