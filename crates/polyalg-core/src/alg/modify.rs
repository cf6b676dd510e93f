//! Write nodes: table modification, collection of several modifications, and entity
//! id assignment for inserted rows. All modifications report a single `ROWCOUNT`.

use super::{
    expect_inputs, push_format_term, AlgEnum, AlgInput, AlgInputExt, AlgNode, AlgRef,
    ExplainTerms, ExplainValue, NodeKind,
};
use crate::catalog::{Catalog, EntityRef};
use crate::error::{AlgError, Result};
use crate::rex::RexRef;
use crate::traits::{RowFormat, TraitSet};
use crate::types::{DataType, RowType};
use std::any::Any;
use std::sync::Arc;

/// Name of the field an [`Identifier`] prepends.
pub const ENTITY_ID_FIELD: &str = "_eid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifyOperation {
    Insert,
    Update,
    Delete,
    Merge,
}

impl AlgEnum for ModifyOperation {
    const TYPE_NAME: &'static str = "modify operation";

    fn as_str(&self) -> &'static str {
        match self {
            ModifyOperation::Insert => "INSERT",
            ModifyOperation::Update => "UPDATE",
            ModifyOperation::Delete => "DELETE",
            ModifyOperation::Merge => "MERGE",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "INSERT" => Some(ModifyOperation::Insert),
            "UPDATE" => Some(ModifyOperation::Update),
            "DELETE" => Some(ModifyOperation::Delete),
            "MERGE" => Some(ModifyOperation::Merge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Modify {
    traits: TraitSet,
    input: AlgRef,
    entity: EntityRef,
    operation: ModifyOperation,
    update_columns: Option<Vec<String>>,
    source_exprs: Option<Vec<RexRef>>,
    flattened: bool,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Modify {
    /// `update_columns` and `source_exprs` are required for `UPDATE` and must have the
    /// same length; other operations must not carry them.
    pub fn create(
        traits: TraitSet,
        input: AlgRef,
        entity: EntityRef,
        operation: ModifyOperation,
        update_columns: Option<Vec<String>>,
        source_exprs: Option<Vec<RexRef>>,
        flattened: bool,
    ) -> Result<AlgRef> {
        Self::build(
            traits,
            input,
            entity,
            operation,
            update_columns,
            source_exprs,
            flattened,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        traits: TraitSet,
        input: AlgRef,
        entity: EntityRef,
        operation: ModifyOperation,
        update_columns: Option<Vec<String>>,
        source_exprs: Option<Vec<RexRef>>,
        flattened: bool,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        match (operation, &update_columns, &source_exprs) {
            (ModifyOperation::Update, Some(columns), Some(exprs)) => {
                if columns.len() != exprs.len() {
                    return Err(AlgError::malformed(format!(
                        "update of {} columns with {} expressions",
                        columns.len(),
                        exprs.len()
                    )));
                }
                if let Some(unknown) = columns.iter().find(|c| entity.row_type.index_of(c).is_none()) {
                    return Err(AlgError::malformed(format!(
                        "entity {} has no column '{}'",
                        entity, unknown
                    )));
                }
            }
            (ModifyOperation::Update, _, _) => {
                return Err(AlgError::malformed("update needs a column list and source expressions"));
            }
            (_, None, None) => {}
            (op, _, _) => {
                return Err(AlgError::malformed(format!(
                    "{} does not take update columns",
                    op.as_str()
                )));
            }
        }
        Ok(Arc::new(Modify {
            traits,
            input,
            entity,
            operation,
            update_columns,
            source_exprs,
            flattened,
            row_type: RowType::row_count(),
            format,
        }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn operation(&self) -> ModifyOperation {
        self.operation
    }

    pub fn update_columns(&self) -> Option<&[String]> {
        self.update_columns.as_deref()
    }

    pub fn source_exprs(&self) -> Option<&[RexRef]> {
        self.source_exprs.as_deref()
    }

    pub fn flattened(&self) -> bool {
        self.flattened
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let entity = input.entity("entity")?;
        let operation = input.enumeration::<ModifyOperation>("operation")?;
        let update_columns = if input.has("updateColumnList") {
            Some(input.string_list("updateColumnList")?)
        } else {
            None
        };
        let source_exprs = if input.has("sourceExpressionList") {
            Some(input.expression_list("sourceExpressionList")?)
        } else {
            None
        };
        let flattened = input.boolean("flattened")?;
        Self::build(
            traits,
            child,
            entity,
            operation,
            update_columns,
            source_exprs,
            flattened,
            format,
        )
    }
}

impl AlgNode for Modify {
    fn kind(&self) -> NodeKind {
        NodeKind::Modify
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
            self.entity.clone(),
            self.operation,
            self.update_columns.clone(),
            self.source_exprs.clone(),
            self.flattened,
            format,
        )
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("entity", ExplainValue::Entity(self.entity.clone())),
            ("operation", ExplainValue::Str(self.operation.as_str().to_string())),
        ];
        if let Some(columns) = &self.update_columns {
            terms.push(("updateColumnList", ExplainValue::StrList(columns.clone())));
        }
        if let Some(exprs) = &self.source_exprs {
            terms.push(("sourceExpressionList", ExplainValue::ExprList(exprs.clone())));
        }
        terms.push(("flattened", ExplainValue::Bool(self.flattened)));
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, _input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        1.0
    }
}

/// Runs several modifications and reports the combined row count.
#[derive(Debug, Clone)]
pub struct ModifyCollect {
    traits: TraitSet,
    inputs: Vec<AlgRef>,
    all: bool,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl ModifyCollect {
    pub fn create(traits: TraitSet, inputs: Vec<AlgRef>, all: bool) -> Result<AlgRef> {
        Self::build(traits, inputs, all, None)
    }

    fn build(traits: TraitSet, inputs: Vec<AlgRef>, all: bool, format: Option<RowFormat>) -> Result<AlgRef> {
        if inputs.is_empty() {
            return Err(AlgError::malformed("ModifyCollect needs at least one input"));
        }
        Ok(Arc::new(ModifyCollect {
            traits,
            inputs,
            all,
            row_type: RowType::row_count(),
            format,
        }))
    }

    pub fn all(&self) -> bool {
        self.all
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let inputs = input.inputs("inputs")?;
        let all = input.boolean("all")?;
        Self::build(traits, inputs, all, format)
    }
}

impl AlgNode for ModifyCollect {
    fn kind(&self) -> NodeKind {
        NodeKind::ModifyCollect
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
        Self::build(traits, inputs, self.all, format)
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

    fn estimate_row_count(&self, _input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        1.0
    }
}

/// Assigns a fresh entity id to every input row, prepended as `_eid BIGINT`.
#[derive(Debug, Clone)]
pub struct Identifier {
    traits: TraitSet,
    input: AlgRef,
    entity: EntityRef,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Identifier {
    pub fn create(traits: TraitSet, input: AlgRef, entity: EntityRef) -> AlgRef {
        Arc::new(Self::build(traits, input, entity, None))
    }

    fn build(traits: TraitSet, input: AlgRef, entity: EntityRef, format: Option<RowFormat>) -> Self {
        let mut builder = RowType::builder().add(ENTITY_ID_FIELD, DataType::bigint());
        for field in input.row_type().fields() {
            builder.push(field.name.clone(), field.data_type.clone());
        }
        Identifier {
            traits,
            input,
            entity,
            row_type: builder.build(),
            format,
        }
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let entity = input.entity("entity")?;
        Ok(Arc::new(Self::build(traits, child, entity, format)))
    }
}

impl AlgNode for Identifier {
    fn kind(&self) -> NodeKind {
        NodeKind::Identifier
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
        Ok(Arc::new(Self::build(traits, inputs.remove(0), self.entity.clone(), format)))
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("entity", ExplainValue::Entity(self.entity.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
