//! # Operand and Return Type Inference
//!
//! Every operator carries a [`ReturnTypeInference`] strategy that computes the type of
//! a call from the types of its bound operands, and optionally an
//! [`OperandTypeInference`] strategy that fills in operand types that are still
//! `UNKNOWN` (e.g. untyped dynamic parameters).
//!
//! ## Composition
//!
//! Strategies are small values composed with three primitives:
//!
//! - [`explicit`]: ignore operands, always return a fixed type.
//! - [`chain`]: try each strategy in order, the first one that yields a type wins.
//! - [`cascade`]: compute a base type, then run it through a list of
//!   [`TypeTransform`]s (e.g. [`ToNullable`], [`ToVarying`]). When the base yields
//!   nothing the transforms are not invoked.
//!
//! The named strategies in [`return_types`] and [`operand_types`] are built from these
//! primitives plus a handful of leaf strategies (decimal arithmetic, string
//! concatenation, aggregates).
//!
//! ## Failure
//!
//! A strategy that cannot produce a type returns `None`. That is not an error at this
//! layer; the caller (usually [`crate::rex::RexBuilder`]) decides whether to fail.

use crate::types::{DataType, TypeFamily, TypeName, TypeSystem};
use std::fmt;
use std::sync::Arc;

/// The bound operand types of a call plus the context aggregate inference needs.
#[derive(Debug, Clone, Copy)]
pub struct OperatorBinding<'a> {
    pub type_system: &'a TypeSystem,
    pub operand_types: &'a [DataType],
    /// Number of grouping columns of the enclosing aggregate (0 for a global aggregate).
    pub group_count: usize,
    /// Whether the aggregate call carries a `FILTER` clause.
    pub has_filter: bool,
}

impl<'a> OperatorBinding<'a> {
    pub fn new(type_system: &'a TypeSystem, operand_types: &'a [DataType]) -> Self {
        Self {
            type_system,
            operand_types,
            group_count: 1,
            has_filter: false,
        }
    }

    pub fn for_aggregate(
        type_system: &'a TypeSystem,
        operand_types: &'a [DataType],
        group_count: usize,
        has_filter: bool,
    ) -> Self {
        Self {
            type_system,
            operand_types,
            group_count,
            has_filter,
        }
    }

    pub fn operand_count(&self) -> usize {
        self.operand_types.len()
    }

    pub fn operand_type(&self, ordinal: usize) -> Option<&DataType> {
        self.operand_types.get(ordinal)
    }

    /// The aggregate may see an empty input: no grouping columns, or a filter.
    pub fn may_be_empty(&self) -> bool {
        self.group_count == 0 || self.has_filter
    }
}

/// Computes the type of a call from its bound operand types.
pub trait ReturnTypeInference: Send + Sync + fmt::Debug {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType>;
}

/// Adjusts a type computed by a base strategy.
pub trait TypeTransform: Send + Sync + fmt::Debug {
    fn transform(&self, binding: &OperatorBinding<'_>, data_type: DataType) -> DataType;
}

/// Fills in operand types that are still `UNKNOWN`.
pub trait OperandTypeInference: Send + Sync + fmt::Debug {
    fn infer_operand_types(
        &self,
        binding: &OperatorBinding<'_>,
        return_type: Option<&DataType>,
        operand_types: &mut [DataType],
    );
}

pub type ReturnTypeRef = Arc<dyn ReturnTypeInference>;
pub type TypeTransformRef = Arc<dyn TypeTransform>;
pub type OperandTypeRef = Arc<dyn OperandTypeInference>;

// ---------------------------------------------------------------------------
// Composition primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExplicitReturnType(pub DataType);

impl ReturnTypeInference for ExplicitReturnType {
    fn infer_return_type(&self, _binding: &OperatorBinding<'_>) -> Option<DataType> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ReturnTypeChain {
    rules: Vec<ReturnTypeRef>,
}

impl ReturnTypeInference for ReturnTypeChain {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        self.rules
            .iter()
            .find_map(|rule| rule.infer_return_type(binding))
    }
}

#[derive(Debug, Clone)]
pub struct ReturnTypeCascade {
    rule: ReturnTypeRef,
    transforms: Vec<TypeTransformRef>,
}

impl ReturnTypeInference for ReturnTypeCascade {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let base = self.rule.infer_return_type(binding)?;
        Some(
            self.transforms
                .iter()
                .fold(base, |ty, transform| transform.transform(binding, ty)),
        )
    }
}

/// Type of the operand at the given ordinal.
#[derive(Debug, Clone, Copy)]
pub struct OrdinalReturnType(pub usize);

impl ReturnTypeInference for OrdinalReturnType {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        binding.operand_type(self.0).cloned()
    }
}

pub fn explicit(data_type: DataType) -> ReturnTypeRef {
    Arc::new(ExplicitReturnType(data_type))
}

pub fn chain(rules: Vec<ReturnTypeRef>) -> ReturnTypeRef {
    Arc::new(ReturnTypeChain { rules })
}

pub fn cascade(rule: ReturnTypeRef, transforms: Vec<TypeTransformRef>) -> ReturnTypeRef {
    Arc::new(ReturnTypeCascade { rule, transforms })
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Nullable if any operand is nullable; otherwise unchanged.
#[derive(Debug, Clone, Copy)]
pub struct ToNullable;

impl TypeTransform for ToNullable {
    fn transform(&self, binding: &OperatorBinding<'_>, data_type: DataType) -> DataType {
        if binding.operand_types.iter().any(|t| t.is_nullable()) {
            data_type.with_nullable(true)
        } else {
            data_type
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToNotNullable;

impl TypeTransform for ToNotNullable {
    fn transform(&self, _binding: &OperatorBinding<'_>, data_type: DataType) -> DataType {
        data_type.with_nullable(false)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForceNullable;

impl TypeTransform for ForceNullable {
    fn transform(&self, _binding: &OperatorBinding<'_>, data_type: DataType) -> DataType {
        data_type.with_nullable(true)
    }
}

/// CHAR becomes VARCHAR, BINARY becomes VARBINARY.
#[derive(Debug, Clone, Copy)]
pub struct ToVarying;

impl TypeTransform for ToVarying {
    fn transform(&self, _binding: &OperatorBinding<'_>, data_type: DataType) -> DataType {
        let varying = data_type.name().to_varying();
        data_type.with_name(varying)
    }
}

// ---------------------------------------------------------------------------
// Leaf strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct LeastRestrictive;

impl ReturnTypeInference for LeastRestrictive {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        binding.type_system.least_restrictive(binding.operand_types)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecimalSum;

impl ReturnTypeInference for DecimalSum {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let (a, b) = (binding.operand_type(0)?, binding.operand_type(1)?);
        binding.type_system.derive_decimal_sum(a, b)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecimalProduct;

impl ReturnTypeInference for DecimalProduct {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let (a, b) = (binding.operand_type(0)?, binding.operand_type(1)?);
        binding.type_system.derive_decimal_product(a, b)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecimalQuotient;

impl ReturnTypeInference for DecimalQuotient {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let (a, b) = (binding.operand_type(0)?, binding.operand_type(1)?);
        binding.type_system.derive_decimal_quotient(a, b)
    }
}

/// `DECIMAL(p, 0)` for a decimal first operand, keeping its nullability.
#[derive(Debug, Clone, Copy)]
pub struct DecimalScale0;

impl ReturnTypeInference for DecimalScale0 {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let arg = binding.operand_type(0)?;
        if arg.name() != TypeName::Decimal {
            return None;
        }
        let precision = arg.precision()?;
        Some(
            binding
                .type_system
                .create_decimal(precision, 0)
                .with_nullable(arg.is_nullable()),
        )
    }
}

/// Concatenation of two character (or two binary) strings.
///
/// Precision is the sum of both precisions, or unspecified when either is unspecified
/// or the sum exceeds the system maximum. The result is varying when either input is.
#[derive(Debug, Clone, Copy)]
pub struct DyadicStringSumPrecision;

impl ReturnTypeInference for DyadicStringSumPrecision {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let (a, b) = (binding.operand_type(0)?, binding.operand_type(1)?);
        let family = a.family();
        if family != b.family() || !matches!(family, TypeFamily::Character | TypeFamily::Binary)
        {
            return None;
        }
        let name = if a.name().is_varying() || b.name().is_varying() {
            a.name().to_varying()
        } else {
            a.name()
        };
        let max = binding.type_system.max_precision(name)?;
        let precision = match (a.precision(), b.precision()) {
            (Some(p1), Some(p2)) if p1 + p2 <= max => Some(p1 + p2),
            _ => None,
        };
        Some(DataType::new(name).with_precision_scale(precision, None))
    }
}

/// `SUM`-family result: nullable when the input may be empty, else operand nullability.
#[derive(Debug, Clone, Copy)]
pub struct AggSum;

impl ReturnTypeInference for AggSum {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let arg = binding.operand_type(0)?;
        let ty = binding.type_system.derive_sum_type(arg);
        let nullable = binding.may_be_empty() || arg.is_nullable();
        Some(ty.with_nullable(nullable))
    }
}

/// `$SUM0`: a sum that yields zero on empty input, never nullable.
#[derive(Debug, Clone, Copy)]
pub struct AggSumEmptyIsZero;

impl ReturnTypeInference for AggSumEmptyIsZero {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let arg = binding.operand_type(0)?;
        Some(binding.type_system.derive_sum_type(arg).with_nullable(false))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AvgAgg;

impl ReturnTypeInference for AvgAgg {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let arg = binding.operand_type(0)?;
        let ty = binding.type_system.derive_avg_type(arg);
        let nullable = binding.may_be_empty() || arg.is_nullable();
        Some(ty.with_nullable(nullable))
    }
}

/// First operand's type, forced nullable when the aggregate input may be empty.
#[derive(Debug, Clone, Copy)]
pub struct Arg0NullableIfEmpty;

impl ReturnTypeInference for Arg0NullableIfEmpty {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let arg = binding.operand_type(0)?.clone();
        if binding.may_be_empty() {
            Some(arg.with_nullable(true))
        } else {
            Some(arg)
        }
    }
}

/// Least restrictive type of the THEN/ELSE branches of a `CASE`.
///
/// Operands are laid out as `when1, then1, when2, then2, ..., else`.
#[derive(Debug, Clone, Copy)]
pub struct CaseReturnType;

impl ReturnTypeInference for CaseReturnType {
    fn infer_return_type(&self, binding: &OperatorBinding<'_>) -> Option<DataType> {
        let n = binding.operand_count();
        if n == 0 {
            return None;
        }
        let branches: Vec<DataType> = binding
            .operand_types
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == 1 || *i == n - 1)
            .map(|(_, t)| t.clone())
            .collect();
        binding.type_system.least_restrictive(&branches)
    }
}

/// Named return type strategies.
pub mod return_types {
    use super::*;

    pub fn arg0() -> ReturnTypeRef {
        Arc::new(OrdinalReturnType(0))
    }

    pub fn arg0_nullable() -> ReturnTypeRef {
        cascade(arg0(), vec![Arc::new(ToNullable)])
    }

    pub fn arg0_force_nullable() -> ReturnTypeRef {
        cascade(arg0(), vec![Arc::new(ForceNullable)])
    }

    pub fn arg0_nullable_if_empty() -> ReturnTypeRef {
        Arc::new(Arg0NullableIfEmpty)
    }

    pub fn boolean() -> ReturnTypeRef {
        explicit(DataType::boolean())
    }

    pub fn boolean_nullable() -> ReturnTypeRef {
        cascade(boolean(), vec![Arc::new(ToNullable)])
    }

    pub fn boolean_not_null() -> ReturnTypeRef {
        cascade(boolean(), vec![Arc::new(ToNotNullable)])
    }

    pub fn bigint() -> ReturnTypeRef {
        explicit(DataType::bigint())
    }

    pub fn double() -> ReturnTypeRef {
        explicit(DataType::double())
    }

    pub fn least_restrictive() -> ReturnTypeRef {
        Arc::new(LeastRestrictive)
    }

    pub fn decimal_scale0() -> ReturnTypeRef {
        Arc::new(DecimalScale0)
    }

    pub fn arg0_or_exact_no_scale() -> ReturnTypeRef {
        chain(vec![decimal_scale0(), arg0()])
    }

    /// `+` and `-`: decimal law, falling back to least restrictive, then nullable.
    pub fn nullable_sum() -> ReturnTypeRef {
        cascade(
            chain(vec![Arc::new(DecimalSum), least_restrictive()]),
            vec![Arc::new(ToNullable)],
        )
    }

    pub fn product_nullable() -> ReturnTypeRef {
        cascade(
            chain(vec![Arc::new(DecimalProduct), least_restrictive()]),
            vec![Arc::new(ToNullable)],
        )
    }

    pub fn quotient_nullable() -> ReturnTypeRef {
        cascade(
            chain(vec![Arc::new(DecimalQuotient), least_restrictive()]),
            vec![Arc::new(ToNullable)],
        )
    }

    pub fn dyadic_string_sum_precision_nullable() -> ReturnTypeRef {
        cascade(Arc::new(DyadicStringSumPrecision), vec![Arc::new(ToNullable)])
    }

    pub fn dyadic_string_sum_precision_nullable_varying() -> ReturnTypeRef {
        cascade(
            Arc::new(DyadicStringSumPrecision),
            vec![Arc::new(ToNullable), Arc::new(ToVarying)],
        )
    }

    pub fn agg_sum() -> ReturnTypeRef {
        Arc::new(AggSum)
    }

    pub fn agg_sum_empty_is_zero() -> ReturnTypeRef {
        Arc::new(AggSumEmptyIsZero)
    }

    pub fn avg_agg() -> ReturnTypeRef {
        Arc::new(AvgAgg)
    }

    pub fn case() -> ReturnTypeRef {
        Arc::new(CaseReturnType)
    }
}

// ---------------------------------------------------------------------------
// Operand type inference
// ---------------------------------------------------------------------------

/// Unknown operands take the type of the first known operand.
#[derive(Debug, Clone, Copy)]
pub struct FirstKnown;

impl OperandTypeInference for FirstKnown {
    fn infer_operand_types(
        &self,
        binding: &OperatorBinding<'_>,
        _return_type: Option<&DataType>,
        operand_types: &mut [DataType],
    ) {
        let Some(known) = binding.operand_types.iter().find(|t| !t.is_unknown()).cloned() else {
            return;
        };
        for ty in operand_types.iter_mut().filter(|t| t.is_unknown()) {
            *ty = known.clone();
        }
    }
}

/// Unknown operands take the call's return type.
#[derive(Debug, Clone, Copy)]
pub struct FromReturnType;

impl OperandTypeInference for FromReturnType {
    fn infer_operand_types(
        &self,
        _binding: &OperatorBinding<'_>,
        return_type: Option<&DataType>,
        operand_types: &mut [DataType],
    ) {
        let Some(return_type) = return_type else {
            return;
        };
        for ty in operand_types.iter_mut().filter(|t| t.is_unknown()) {
            *ty = return_type.clone();
        }
    }
}

/// Unknown operands become nullable BOOLEAN.
#[derive(Debug, Clone, Copy)]
pub struct BooleanOperands;

impl OperandTypeInference for BooleanOperands {
    fn infer_operand_types(
        &self,
        _binding: &OperatorBinding<'_>,
        _return_type: Option<&DataType>,
        operand_types: &mut [DataType],
    ) {
        for ty in operand_types.iter_mut().filter(|t| t.is_unknown()) {
            *ty = DataType::boolean().with_nullable(true);
        }
    }
}

/// Named operand type strategies.
pub mod operand_types {
    use super::*;

    pub fn first_known() -> OperandTypeRef {
        Arc::new(FirstKnown)
    }

    pub fn return_type() -> OperandTypeRef {
        Arc::new(FromReturnType)
    }

    pub fn boolean() -> OperandTypeRef {
        Arc::new(BooleanOperands)
    }
}
