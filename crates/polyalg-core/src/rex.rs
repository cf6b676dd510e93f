//! # Scalar Expressions
//!
//! [`RexNode`] is the scalar expression tree evaluated in the context of a row:
//! literals, positional field references, correlation variables, field access into a
//! row-typed value, operator calls and dynamic parameters.
//!
//! Every node carries its fully resolved [`DataType`]. Nodes are immutable and shared
//! through [`RexRef`] (`Arc<RexNode>`). Rewrites that leave a subtree unchanged hand
//! back the very same `Arc`, so callers can short-circuit with [`is_identical`].
//!
//! Call nodes are only built through [`RexBuilder`], which checks operand counts and
//! families, fills in unknown operand types and resolves the result type. A call that
//! cannot be typed fails with [`AlgError::TypeInference`] naming the operand.

use crate::error::{AlgError, Result};
use crate::inference::OperatorBinding;
use crate::operator::{OperatorKind, OperatorRef, OperatorTable};
use crate::types::{DataType, RowType, TypeName, TypeSystem};
use ordered_float::OrderedFloat;
use std::fmt;
use std::sync::Arc;

pub type RexRef = Arc<RexNode>;

/// Raw literal values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Exact decimal as an unscaled integer: `unscaled * 10^-scale`.
    Decimal { unscaled: i128, scale: u32 },
    Double(OrderedFloat<f64>),
    String(String),
}

impl LiteralValue {
    pub fn is_null(&self) -> bool {
        matches!(self, LiteralValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LiteralValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LiteralValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Parses the canonical text form of a decimal (`-12.340`).
    pub fn parse_decimal(text: &str) -> Option<LiteralValue> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return None;
        }
        let combined = format!("{}{}", int_part, frac_part);
        let unscaled: i128 = combined.parse().ok()?;
        Some(LiteralValue::Decimal {
            unscaled: if negative { -unscaled } else { unscaled },
            scale: frac_part.len() as u32,
        })
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Boolean(v) => write!(f, "{}", v),
            LiteralValue::Integer(v) => write!(f, "{}", v),
            LiteralValue::Decimal { unscaled, scale } => {
                if *scale == 0 {
                    return write!(f, "{}", unscaled);
                }
                let sign = if *unscaled < 0 { "-" } else { "" };
                let digits = unscaled.unsigned_abs().to_string();
                let scale = *scale as usize;
                let padded = format!("{:0>width$}", digits, width = scale + 1);
                let (int_part, frac_part) = padded.split_at(padded.len() - scale);
                write!(f, "{}{}.{}", sign, int_part, frac_part)
            }
            LiteralValue::Double(v) => write!(f, "{:?}", v.0),
            LiteralValue::String(v) => write!(f, "'{}'", v),
        }
    }
}

/// Scalar expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RexNode {
    Literal {
        value: LiteralValue,
        ty: DataType,
    },
    /// Field `index` of input `input` of the enclosing plan node.
    FieldRef {
        input: usize,
        index: usize,
        ty: DataType,
    },
    /// Reference to the current row of an outer (correlated) scope.
    CorrelVariable {
        id: String,
        ty: DataType,
    },
    FieldAccess {
        expr: RexRef,
        field: String,
        ty: DataType,
    },
    Call {
        op: OperatorRef,
        operands: Vec<RexRef>,
        ty: DataType,
    },
    /// Query parameter bound at execution time; its type may still be `UNKNOWN`.
    DynamicParam {
        index: usize,
        ty: DataType,
    },
}

impl RexNode {
    pub fn ty(&self) -> &DataType {
        match self {
            RexNode::Literal { ty, .. }
            | RexNode::FieldRef { ty, .. }
            | RexNode::CorrelVariable { ty, .. }
            | RexNode::FieldAccess { ty, .. }
            | RexNode::Call { ty, .. }
            | RexNode::DynamicParam { ty, .. } => ty,
        }
    }

    pub fn operands(&self) -> &[RexRef] {
        match self {
            RexNode::Call { operands, .. } => operands,
            _ => &[],
        }
    }

    pub fn is_call_of(&self, kind: OperatorKind) -> bool {
        matches!(self, RexNode::Call { op, .. } if op.kind() == kind)
    }

    pub fn is_always_true(&self) -> bool {
        matches!(
            self,
            RexNode::Literal {
                value: LiteralValue::Boolean(true),
                ..
            }
        )
    }

    /// `(input, index)` pairs of every field reference in this tree.
    pub fn field_refs(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        self.collect_field_refs(&mut out);
        out
    }

    fn collect_field_refs(&self, out: &mut Vec<(usize, usize)>) {
        match self {
            RexNode::FieldRef { input, index, .. } => out.push((*input, *index)),
            RexNode::FieldAccess { expr, .. } => expr.collect_field_refs(out),
            RexNode::Call { operands, .. } => {
                for operand in operands {
                    operand.collect_field_refs(out);
                }
            }
            _ => {}
        }
    }

    /// Top-level conjuncts of an `AND` tree.
    pub fn conjunctions(node: &RexRef) -> Vec<RexRef> {
        if node.is_call_of(OperatorKind::And) {
            node.operands()
                .iter()
                .flat_map(RexNode::conjunctions)
                .collect()
        } else {
            vec![node.clone()]
        }
    }
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::Literal { value, ty } => {
                if value.is_null() {
                    write!(f, "null:{}", ty.name())
                } else {
                    write!(f, "{}", value)
                }
            }
            RexNode::FieldRef { input, index, .. } => {
                if *input == 0 {
                    write!(f, "${}", index)
                } else {
                    write!(f, "${}.{}", input, index)
                }
            }
            RexNode::CorrelVariable { id, .. } => write!(f, "{}", id),
            RexNode::FieldAccess { expr, field, .. } => write!(f, "{}.{}", expr, field),
            RexNode::Call { op, operands, ty } => {
                write!(f, "{}(", op.name())?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")?;
                if op.kind() == OperatorKind::Cast {
                    write!(f, ":{}", ty)?;
                }
                Ok(())
            }
            RexNode::DynamicParam { index, .. } => write!(f, "?{}", index),
        }
    }
}

/// Whether two expression handles point at the same node.
pub fn is_identical(a: &RexRef, b: &RexRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Rewrites every field reference through `f`. Unchanged subtrees are returned as the
/// same `Arc`.
pub fn remap_field_refs(
    node: &RexRef,
    f: &mut dyn FnMut(usize, usize, &DataType) -> Option<RexRef>,
) -> RexRef {
    match node.as_ref() {
        RexNode::FieldRef { input, index, ty } => f(*input, *index, ty).unwrap_or_else(|| node.clone()),
        RexNode::FieldAccess { expr, field, ty } => {
            let new_expr = remap_field_refs(expr, f);
            if is_identical(&new_expr, expr) {
                node.clone()
            } else {
                Arc::new(RexNode::FieldAccess {
                    expr: new_expr,
                    field: field.clone(),
                    ty: ty.clone(),
                })
            }
        }
        RexNode::Call { op, operands, ty } => {
            let new_operands: Vec<RexRef> =
                operands.iter().map(|o| remap_field_refs(o, f)).collect();
            let unchanged = new_operands
                .iter()
                .zip(operands.iter())
                .all(|(a, b)| is_identical(a, b));
            if unchanged {
                node.clone()
            } else {
                Arc::new(RexNode::Call {
                    op: op.clone(),
                    operands: new_operands,
                    ty: ty.clone(),
                })
            }
        }
        _ => node.clone(),
    }
}

/// Replaces `$i` (input 0) with `exprs[i]`, as when merging two projections.
pub fn substitute_inputs(node: &RexRef, exprs: &[RexRef]) -> RexRef {
    remap_field_refs(node, &mut |input, index, _| {
        if input == 0 {
            exprs.get(index).cloned()
        } else {
            None
        }
    })
}

/// Builds expressions, typing every call as it is created.
#[derive(Debug, Clone)]
pub struct RexBuilder {
    type_system: TypeSystem,
    operators: Arc<OperatorTable>,
}

impl RexBuilder {
    pub fn new(type_system: TypeSystem, operators: Arc<OperatorTable>) -> Self {
        Self {
            type_system,
            operators,
        }
    }

    pub fn type_system(&self) -> &TypeSystem {
        &self.type_system
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.operators
    }

    pub fn literal(&self, value: LiteralValue, ty: DataType) -> RexRef {
        Arc::new(RexNode::Literal { value, ty })
    }

    pub fn boolean(&self, value: bool) -> RexRef {
        self.literal(LiteralValue::Boolean(value), DataType::boolean())
    }

    pub fn bigint(&self, value: i64) -> RexRef {
        self.literal(LiteralValue::Integer(value), DataType::bigint())
    }

    pub fn integer(&self, value: i64) -> RexRef {
        self.literal(LiteralValue::Integer(value), DataType::integer())
    }

    pub fn double(&self, value: f64) -> RexRef {
        self.literal(LiteralValue::Double(OrderedFloat(value)), DataType::double())
    }

    /// `CHAR(len)` literal.
    pub fn string(&self, value: impl Into<String>) -> RexRef {
        let value = value.into();
        let len = value.chars().count() as u32;
        self.literal(
            LiteralValue::String(value),
            DataType::with_precision(TypeName::Char, len),
        )
    }

    pub fn null(&self, ty: DataType) -> RexRef {
        self.literal(LiteralValue::Null, ty.with_nullable(true))
    }

    pub fn decimal(&self, unscaled: i128, precision: u32, scale: u32) -> RexRef {
        self.literal(
            LiteralValue::Decimal { unscaled, scale },
            self.type_system.create_decimal(precision, scale),
        )
    }

    /// Reference to field `index` of input `input`, typed from that input's row type.
    pub fn field_ref(&self, input: usize, index: usize, row_type: &RowType) -> Result<RexRef> {
        let field = row_type.field(index).ok_or_else(|| {
            AlgError::malformed(format!(
                "field {} out of range for input {} with {} fields",
                index,
                input,
                row_type.field_count()
            ))
        })?;
        Ok(Arc::new(RexNode::FieldRef {
            input,
            index,
            ty: field.data_type.clone(),
        }))
    }

    pub fn correl(&self, id: impl Into<String>, ty: DataType) -> RexRef {
        Arc::new(RexNode::CorrelVariable { id: id.into(), ty })
    }

    pub fn field_access(&self, expr: RexRef, field: &str) -> Result<RexRef> {
        let ty = expr
            .ty()
            .fields()
            .and_then(|rt| rt.index_of(field).and_then(|i| rt.field(i)))
            .map(|f| f.data_type.clone())
            .ok_or_else(|| {
                AlgError::malformed(format!("type {} has no field '{}'", expr.ty(), field))
            })?;
        Ok(Arc::new(RexNode::FieldAccess {
            expr,
            field: field.to_string(),
            ty,
        }))
    }

    pub fn dynamic_param(&self, index: usize, ty: DataType) -> RexRef {
        Arc::new(RexNode::DynamicParam { index, ty })
    }

    /// Call whose type is derived from the operator's return type inference.
    pub fn call(&self, op: &OperatorRef, operands: Vec<RexRef>) -> Result<RexRef> {
        let operands = self.check_operands(op, operands, None)?;
        let types: Vec<DataType> = operands.iter().map(|o| o.ty().clone()).collect();
        let binding = OperatorBinding::new(&self.type_system, &types);
        let ty = op
            .return_inference()
            .infer_return_type(&binding)
            .ok_or_else(|| {
                AlgError::type_inference(op.name(), 0, "return type inference yielded no type")
            })?;
        Ok(Arc::new(RexNode::Call {
            op: op.clone(),
            operands,
            ty,
        }))
    }

    /// Call with an explicitly supplied type (e.g. `CAST`).
    pub fn call_with_type(
        &self,
        op: &OperatorRef,
        operands: Vec<RexRef>,
        ty: DataType,
    ) -> Result<RexRef> {
        let operands = self.check_operands(op, operands, Some(&ty))?;
        Ok(Arc::new(RexNode::Call {
            op: op.clone(),
            operands,
            ty,
        }))
    }

    pub fn call_kind(&self, kind: OperatorKind, operands: Vec<RexRef>) -> Result<RexRef> {
        let op = self.operators.get(kind)?;
        self.call(&op, operands)
    }

    pub fn cast(&self, expr: RexRef, ty: DataType) -> Result<RexRef> {
        let op = self.operators.get(OperatorKind::Cast)?;
        self.call_with_type(&op, vec![expr], ty)
    }

    pub fn equals(&self, left: RexRef, right: RexRef) -> Result<RexRef> {
        self.call_kind(OperatorKind::Equals, vec![left, right])
    }

    /// Conjunction of the given predicates, flattened. One predicate is returned as is,
    /// none yields `TRUE`.
    pub fn and(&self, predicates: Vec<RexRef>) -> Result<RexRef> {
        let mut conjuncts: Vec<RexRef> = predicates
            .iter()
            .flat_map(RexNode::conjunctions)
            .filter(|c| !c.is_always_true())
            .collect();
        match conjuncts.len() {
            0 => Ok(self.boolean(true)),
            1 => Ok(conjuncts.remove(0)),
            _ => self.call_kind(OperatorKind::And, conjuncts),
        }
    }

    /// Checks count and families, and types `UNKNOWN` operands via operand inference.
    fn check_operands(
        &self,
        op: &OperatorRef,
        operands: Vec<RexRef>,
        return_type: Option<&DataType>,
    ) -> Result<Vec<RexRef>> {
        let count = operands.len();
        if !op.accepts_operand_count(count) {
            let (min, max) = op.operand_count_range();
            let operand = if count < min { count } else { max.unwrap_or(count) };
            return Err(AlgError::type_inference(
                op.name(),
                operand,
                format!("wrong number of operands: {}", count),
            ));
        }

        let operands = if operands.iter().any(|o| o.ty().is_unknown()) {
            self.infer_unknown_operands(op, operands, return_type)
        } else {
            operands
        };

        for (i, operand) in operands.iter().enumerate() {
            if operand.ty().is_unknown() {
                return Err(AlgError::type_inference(
                    op.name(),
                    i,
                    "operand type could not be inferred",
                ));
            }
            let family = op.family(i);
            if !family.accepts(operand.ty()) {
                return Err(AlgError::type_inference(
                    op.name(),
                    i,
                    format!("expected {} operand, got {}", family, operand.ty()),
                ));
            }
        }
        Ok(operands)
    }

    fn infer_unknown_operands(
        &self,
        op: &OperatorRef,
        operands: Vec<RexRef>,
        return_type: Option<&DataType>,
    ) -> Vec<RexRef> {
        let Some(inference) = op.operand_type_inference() else {
            return operands;
        };
        let bound: Vec<DataType> = operands.iter().map(|o| o.ty().clone()).collect();
        let mut inferred = bound.clone();
        let binding = OperatorBinding::new(&self.type_system, &bound);
        inference.infer_operand_types(&binding, return_type, &mut inferred);

        operands
            .into_iter()
            .zip(inferred)
            .map(|(operand, ty)| match operand.as_ref() {
                RexNode::DynamicParam { index, ty: old } if old.is_unknown() && !ty.is_unknown() => {
                    Arc::new(RexNode::DynamicParam { index: *index, ty })
                }
                _ => operand,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RexBuilder {
        RexBuilder::new(TypeSystem::default(), Arc::new(OperatorTable::standard()))
    }

    fn emp() -> RowType {
        RowType::builder()
            .add("id", DataType::integer())
            .add("salary", DataType::decimal(10, 2).with_nullable(true))
            .add("name", DataType::varchar(Some(20)))
            .build()
    }

    #[test]
    fn test_call_resolves_type() {
        let b = builder();
        let salary = b.field_ref(0, 1, &emp()).unwrap();
        let bonus = b.decimal(150, 3, 1);
        let sum = b.call_kind(OperatorKind::Plus, vec![salary, bonus]).unwrap();
        let expected = TypeSystem::default()
            .derive_decimal_sum(&DataType::decimal(10, 2), &DataType::decimal(3, 1))
            .unwrap()
            .with_nullable(true);
        assert_eq!(sum.ty(), &expected);
        assert_eq!(sum.to_string(), "+($1, 15.0)");
    }

    #[test]
    fn test_bad_operand_family_names_operand() {
        let b = builder();
        let name = b.field_ref(0, 2, &emp()).unwrap();
        let one = b.integer(1);
        let err = b
            .call_kind(OperatorKind::Plus, vec![one, name])
            .unwrap_err();
        match err {
            AlgError::TypeInference {
                operator, operand, ..
            } => {
                assert_eq!(operator, "+");
                assert_eq!(operand, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_wrong_operand_count() {
        let b = builder();
        let err = b
            .call_kind(OperatorKind::Not, vec![b.boolean(true), b.boolean(false)])
            .unwrap_err();
        assert!(matches!(err, AlgError::TypeInference { operand: 1, .. }));
    }

    #[test]
    fn test_unknown_parameter_takes_first_known_type() {
        let b = builder();
        let id = b.field_ref(0, 0, &emp()).unwrap();
        let param = b.dynamic_param(0, DataType::unknown());
        let eq = b.equals(id, param).unwrap();
        match eq.as_ref() {
            RexNode::Call { operands, .. } => {
                assert_eq!(operands[1].ty(), &DataType::integer());
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_cast_keeps_explicit_type() {
        let b = builder();
        let id = b.field_ref(0, 0, &emp()).unwrap();
        let cast = b.cast(id, DataType::varchar(Some(10))).unwrap();
        assert_eq!(cast.ty(), &DataType::varchar(Some(10)));
        assert!(b
            .call_kind(OperatorKind::Cast, vec![b.integer(1)])
            .is_err());
    }

    #[test]
    fn test_remap_preserves_identity_when_unchanged() {
        let b = builder();
        let id = b.field_ref(0, 0, &emp()).unwrap();
        let cond = b.equals(id, b.integer(3)).unwrap();
        let same = remap_field_refs(&cond, &mut |_, _, _| None);
        assert!(is_identical(&same, &cond));

        let shifted = remap_field_refs(&cond, &mut |input, index, ty| {
            Some(Arc::new(RexNode::FieldRef {
                input,
                index: index + 2,
                ty: ty.clone(),
            }))
        });
        assert!(!is_identical(&shifted, &cond));
        assert_eq!(shifted.field_refs(), vec![(0, 2)]);
    }

    #[test]
    fn test_and_flattens() {
        let b = builder();
        let rt = emp();
        let p1 = b.equals(b.field_ref(0, 0, &rt).unwrap(), b.integer(1)).unwrap();
        let p2 = b
            .call_kind(OperatorKind::IsNotNull, vec![b.field_ref(0, 1, &rt).unwrap()])
            .unwrap();
        let inner = b.and(vec![p1.clone(), p2.clone()]).unwrap();
        let outer = b.and(vec![inner, b.boolean(true), p1]).unwrap();
        assert_eq!(outer.operands().len(), 3);
        assert!(is_identical(&b.and(vec![p2.clone()]).unwrap(), &p2));
    }

    #[test]
    fn test_decimal_literal_text() {
        assert_eq!(
            LiteralValue::parse_decimal("-12.340"),
            Some(LiteralValue::Decimal {
                unscaled: -12340,
                scale: 3
            })
        );
        let v = LiteralValue::Decimal {
            unscaled: -5,
            scale: 2,
        };
        assert_eq!(v.to_string(), "-0.05");
        assert_eq!(LiteralValue::parse_decimal(v.to_string().as_str()), Some(v));
    }
}
