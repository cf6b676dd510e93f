//! Grouped aggregation.
//!
//! The output row is the grouping columns, in ascending input order, followed by one
//! field per [`AggregateCall`]. Aggregate call types are computed once, when the call
//! is created, with a binding that knows the number of grouping columns: that is how
//! `SUM` over a global aggregate becomes nullable while `$SUM0` never does.

use super::{
    expect_inputs, push_format_term, AlgInput, AlgNode, AlgRef, ExplainTerms, ExplainValue,
    NodeKind,
};
use crate::catalog::Catalog;
use crate::error::{AlgError, Result};
use crate::inference::OperatorBinding;
use crate::operator::OperatorRef;
use crate::stats::derive_aggregate_rows;
use crate::traits::{RowFormat, TraitSet};
use crate::types::{DataType, RowType, TypeName, TypeSystem};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// One aggregate function applied to input fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateCall {
    pub op: OperatorRef,
    pub distinct: bool,
    /// Input field indexes.
    pub args: Vec<usize>,
    pub ty: DataType,
    pub name: Option<String>,
    /// BOOLEAN input field restricting the rows the call sees.
    pub filter: Option<usize>,
}

impl AggregateCall {
    /// Types a call to `op` over `args` of `input` within an aggregate with
    /// `group_count` grouping columns.
    pub fn create(
        type_system: &TypeSystem,
        op: OperatorRef,
        distinct: bool,
        args: Vec<usize>,
        name: Option<String>,
        input: &RowType,
        group_count: usize,
    ) -> Result<Self> {
        Self::create_filtered(type_system, op, distinct, args, None, name, input, group_count)
    }

    /// Like [`AggregateCall::create`], with an optional `filter` field. A filtered
    /// call may see no rows in a group, so its type follows the global-aggregate rules.
    #[allow(clippy::too_many_arguments)]
    pub fn create_filtered(
        type_system: &TypeSystem,
        op: OperatorRef,
        distinct: bool,
        args: Vec<usize>,
        filter: Option<usize>,
        name: Option<String>,
        input: &RowType,
        group_count: usize,
    ) -> Result<Self> {
        if !op.is_aggregate() {
            return Err(AlgError::type_inference(op.name(), 0, "not an aggregate function"));
        }
        if !op.accepts_operand_count(args.len()) {
            return Err(AlgError::type_inference(
                op.name(),
                args.len(),
                format!("wrong number of operands: {}", args.len()),
            ));
        }
        let mut operand_types = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            let field = input.field(arg).ok_or_else(|| {
                AlgError::type_inference(op.name(), i, format!("input field {} does not exist", arg))
            })?;
            if !op.family(i).accepts(&field.data_type) {
                return Err(AlgError::type_inference(
                    op.name(),
                    i,
                    format!("expected {} operand, got {}", op.family(i), field.data_type),
                ));
            }
            operand_types.push(field.data_type.clone());
        }
        if let Some(f) = filter {
            let is_boolean = input
                .field(f)
                .map_or(false, |field| field.data_type.name() == TypeName::Boolean);
            if !is_boolean {
                return Err(AlgError::type_inference(
                    op.name(),
                    args.len(),
                    format!("filter field {} is not a BOOLEAN input field", f),
                ));
            }
        }
        let binding =
            OperatorBinding::for_aggregate(type_system, &operand_types, group_count, filter.is_some());
        let ty = op
            .return_inference()
            .infer_return_type(&binding)
            .ok_or_else(|| AlgError::type_inference(op.name(), 0, "return type inference yielded no type"))?;
        Ok(Self {
            op,
            distinct,
            args,
            ty,
            name,
            filter,
        })
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op.name())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "${}", arg)?;
        }
        write!(f, ")")?;
        if let Some(filter) = self.filter {
            write!(f, " FILTER ${}", filter)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Aggregate {
    traits: TraitSet,
    input: AlgRef,
    group_set: Vec<usize>,
    agg_calls: Vec<AggregateCall>,
    row_type: RowType,
    format: Option<RowFormat>,
}

impl Aggregate {
    /// `group_set` is normalized to ascending order without duplicates.
    pub fn create(
        traits: TraitSet,
        input: AlgRef,
        group_set: Vec<usize>,
        agg_calls: Vec<AggregateCall>,
    ) -> Result<AlgRef> {
        Self::build(traits, input, group_set, agg_calls, None)
    }

    fn build(
        traits: TraitSet,
        input: AlgRef,
        mut group_set: Vec<usize>,
        agg_calls: Vec<AggregateCall>,
        format: Option<RowFormat>,
    ) -> Result<AlgRef> {
        group_set.sort_unstable();
        group_set.dedup();
        let input_type = input.row_type();
        let mut builder = RowType::builder();
        for &g in &group_set {
            let field = input_type.field(g).ok_or_else(|| {
                AlgError::malformed(format!("group field {} out of range", g))
            })?;
            builder.push(field.name.clone(), field.data_type.clone());
        }
        for (i, call) in agg_calls.iter().enumerate() {
            let name = call
                .name
                .clone()
                .unwrap_or_else(|| format!("$f{}", group_set.len() + i));
            builder.push(name, call.ty.clone());
        }
        Ok(Arc::new(Aggregate {
            traits,
            input,
            group_set,
            agg_calls,
            row_type: builder.build(),
            format,
        }))
    }

    pub fn input(&self) -> &AlgRef {
        &self.input
    }

    pub fn group_set(&self) -> &[usize] {
        &self.group_set
    }

    pub fn agg_calls(&self) -> &[AggregateCall] {
        &self.agg_calls
    }

    pub(crate) fn read(input: &dyn AlgInput, traits: TraitSet, format: Option<RowFormat>) -> Result<AlgRef> {
        let child = input.input("input")?;
        let group_set = input.bit_set("group")?;
        let agg_calls = input.agg_calls("aggs")?;
        Self::build(traits, child, group_set, agg_calls, format)
    }
}

impl AlgNode for Aggregate {
    fn kind(&self) -> NodeKind {
        NodeKind::Aggregate
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
            self.group_set.clone(),
            self.agg_calls.clone(),
            format,
        )
    }

    fn explain_terms(&self) -> ExplainTerms {
        let mut terms = vec![
            ("input", ExplainValue::Input(self.input.clone())),
            ("group", ExplainValue::IntList(self.group_set.clone())),
            ("aggs", ExplainValue::AggCalls(self.agg_calls.clone())),
        ];
        push_format_term(&mut terms, self.format);
        terms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn estimate_row_count(&self, input_rows: &[f64], _catalog: &dyn Catalog) -> f64 {
        derive_aggregate_rows(input_rows.first().copied().unwrap_or(1.0), self.group_set.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Scan;
    use super::*;
    use crate::operator::OperatorKind;

    fn call(kind: OperatorKind, args: Vec<usize>, group_count: usize) -> Result<AggregateCall> {
        let ctx = context();
        let op = ctx.operators().get(kind)?;
        AggregateCall::create(ctx.type_system(), op, false, args, None, &emp_row_type(), group_count)
    }

    #[test]
    fn test_sum_nullable_only_without_groups() {
        let grouped = call(OperatorKind::Sum, vec![3], 1).unwrap();
        assert!(!grouped.ty.is_nullable());
        let global = call(OperatorKind::Sum, vec![3], 0).unwrap();
        assert!(global.ty.is_nullable());
        let sum0 = call(OperatorKind::Sum0, vec![3], 0).unwrap();
        assert!(!sum0.ty.is_nullable());
    }

    fn flagged_row_type() -> RowType {
        RowType::builder()
            .add("salary", DataType::decimal(10, 2))
            .add("active", DataType::boolean())
            .build()
    }

    fn filtered_sum(filter: Option<usize>) -> Result<AggregateCall> {
        let ctx = context();
        let op = ctx.operators().get(OperatorKind::Sum)?;
        AggregateCall::create_filtered(
            ctx.type_system(),
            op,
            false,
            vec![0],
            filter,
            None,
            &flagged_row_type(),
            1,
        )
    }

    #[test]
    fn test_filtered_grouped_sum_is_nullable() {
        assert!(!filtered_sum(None).unwrap().ty.is_nullable());
        let filtered = filtered_sum(Some(1)).unwrap();
        assert!(filtered.ty.is_nullable());
        assert_eq!(filtered.to_string(), "SUM($0) FILTER $1");
    }

    #[test]
    fn test_filter_must_be_boolean_field() {
        assert!(matches!(filtered_sum(Some(0)), Err(AlgError::TypeInference { .. })));
        assert!(matches!(filtered_sum(Some(5)), Err(AlgError::TypeInference { .. })));
    }

    #[test]
    fn test_sum_rejects_character_operand() {
        let err = call(OperatorKind::Sum, vec![1], 1).unwrap_err();
        assert!(matches!(err, AlgError::TypeInference { operand: 0, .. }));
    }

    #[test]
    fn test_row_type_groups_then_calls() {
        let scan = Scan::create(TraitSet::abstract_(), emp());
        let count = call(OperatorKind::Count, vec![], 1).unwrap();
        let agg = Aggregate::create(TraitSet::abstract_(), scan, vec![2, 2], vec![count]).unwrap();
        assert_eq!(agg.row_type().field_names(), vec!["dept", "$f1"]);
        assert_eq!(agg.row_type().field(1).unwrap().data_type, DataType::bigint());
    }
}
