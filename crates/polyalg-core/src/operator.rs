//! # Operators and the Operator Table
//!
//! An [`Operator`] describes a scalar function or aggregate: its display name, how many
//! operands it takes, which type family each operand must belong to, and the inference
//! strategies that type a call to it.
//!
//! The [`OperatorTable`] is built once at startup ([`OperatorTable::standard`]) and
//! shared by reference through [`crate::context::AlgContext`]. Name resolution looks at
//! the standard display names first and then at user-defined operators, which are
//! registered under a fully qualified name and serialized with that name so a reader
//! can find them again.

use crate::error::{AlgError, Result};
use crate::inference::{operand_types, return_types, OperandTypeRef, ReturnTypeRef};
use crate::types::{DataType, TypeFamily};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Well-known operator identities. Rules match on these instead of names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    And,
    Or,
    Not,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Times,
    Divide,
    Concat,
    Cast,
    IsNull,
    IsNotNull,
    Case,
    Coalesce,
    Floor,
    Ceil,
    Item,
    Count,
    Sum,
    Sum0,
    Avg,
    Min,
    Max,
    /// User-defined function.
    Other,
}

/// Type family an operand must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandFamily {
    Any,
    Numeric,
    Character,
    Binary,
    Boolean,
    Datetime,
}

impl OperandFamily {
    /// Whether a value of the given type may be passed. `NULL`, `ANY` and still-unknown
    /// operands are accepted by every family.
    pub fn accepts(&self, data_type: &DataType) -> bool {
        let family = data_type.family();
        if matches!(family, TypeFamily::Null | TypeFamily::Any | TypeFamily::Unknown) {
            return true;
        }
        match self {
            OperandFamily::Any => true,
            OperandFamily::Numeric => family == TypeFamily::Numeric,
            OperandFamily::Character => family == TypeFamily::Character,
            OperandFamily::Binary => family == TypeFamily::Binary,
            OperandFamily::Boolean => family == TypeFamily::Boolean,
            OperandFamily::Datetime => family == TypeFamily::Datetime,
        }
    }
}

impl fmt::Display for OperandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandFamily::Any => "ANY",
            OperandFamily::Numeric => "NUMERIC",
            OperandFamily::Character => "CHARACTER",
            OperandFamily::Binary => "BINARY",
            OperandFamily::Boolean => "BOOLEAN",
            OperandFamily::Datetime => "DATETIME",
        };
        f.write_str(name)
    }
}

pub type OperatorRef = Arc<Operator>;

#[derive(Debug, Clone)]
pub struct Operator {
    name: String,
    kind: OperatorKind,
    class: Option<String>,
    min_operands: usize,
    max_operands: Option<usize>,
    families: Vec<OperandFamily>,
    return_inference: ReturnTypeRef,
    operand_inference: Option<OperandTypeRef>,
    aggregate: bool,
}

impl Operator {
    pub fn new(name: impl Into<String>, kind: OperatorKind, return_inference: ReturnTypeRef) -> Self {
        Self {
            name: name.into(),
            kind,
            class: None,
            min_operands: 0,
            max_operands: None,
            families: Vec::new(),
            return_inference,
            operand_inference: None,
            aggregate: false,
        }
    }

    /// Operand count range; `max = None` means variadic.
    pub fn operands(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_operands = min;
        self.max_operands = max;
        self
    }

    /// Per-operand families; the last entry applies to every further operand.
    pub fn families(mut self, families: Vec<OperandFamily>) -> Self {
        self.families = families;
        self
    }

    pub fn operand_inference(mut self, inference: OperandTypeRef) -> Self {
        self.operand_inference = Some(inference);
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    /// Marks the operator as user-defined under a fully qualified name.
    pub fn class(mut self, qualified_name: impl Into<String>) -> Self {
        self.class = Some(qualified_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn return_inference(&self) -> &ReturnTypeRef {
        &self.return_inference
    }

    pub fn operand_type_inference(&self) -> Option<&OperandTypeRef> {
        self.operand_inference.as_ref()
    }

    pub fn accepts_operand_count(&self, count: usize) -> bool {
        count >= self.min_operands && self.max_operands.map_or(true, |max| count <= max)
    }

    pub fn operand_count_range(&self) -> (usize, Option<usize>) {
        (self.min_operands, self.max_operands)
    }

    pub fn family(&self, ordinal: usize) -> OperandFamily {
        self.families
            .get(ordinal)
            .or_else(|| self.families.last())
            .copied()
            .unwrap_or(OperandFamily::Any)
    }

    /// Identity used for equality: the qualified name for user-defined operators,
    /// the display name otherwise.
    fn identity(&self) -> &str {
        self.class.as_deref().unwrap_or(&self.name)
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.identity() == other.identity()
    }
}

impl Eq for Operator {}

impl Hash for Operator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.identity().hash(state);
    }
}

/// Registry of operators, by display name and by qualified name.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    by_name: HashMap<String, OperatorRef>,
    by_kind: HashMap<OperatorKind, OperatorRef>,
    user_defined: HashMap<String, OperatorRef>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard scalar operators and aggregates.
    pub fn standard() -> Self {
        use OperandFamily as F;
        use OperatorKind as K;

        let mut table = Self::new();
        let comparison = |name: &str, kind| {
            Operator::new(name, kind, return_types::boolean_nullable())
                .operands(2, Some(2))
                .families(vec![F::Any])
                .operand_inference(operand_types::first_known())
        };
        let arithmetic = |name: &str, kind, rt| {
            Operator::new(name, kind, rt)
                .operands(2, Some(2))
                .families(vec![F::Numeric])
                .operand_inference(operand_types::first_known())
        };

        table.add(
            Operator::new("AND", K::And, return_types::boolean_nullable())
                .operands(2, None)
                .families(vec![F::Boolean])
                .operand_inference(operand_types::boolean()),
        );
        table.add(
            Operator::new("OR", K::Or, return_types::boolean_nullable())
                .operands(2, None)
                .families(vec![F::Boolean])
                .operand_inference(operand_types::boolean()),
        );
        table.add(
            Operator::new("NOT", K::Not, return_types::arg0())
                .operands(1, Some(1))
                .families(vec![F::Boolean])
                .operand_inference(operand_types::boolean()),
        );
        table.add(comparison("=", K::Equals));
        table.add(comparison("<>", K::NotEquals));
        table.add(comparison("<", K::LessThan));
        table.add(comparison("<=", K::LessThanOrEqual));
        table.add(comparison(">", K::GreaterThan));
        table.add(comparison(">=", K::GreaterThanOrEqual));
        table.add(arithmetic("+", K::Plus, return_types::nullable_sum()));
        table.add(arithmetic("-", K::Minus, return_types::nullable_sum()));
        table.add(arithmetic("*", K::Times, return_types::product_nullable()));
        table.add(arithmetic("/", K::Divide, return_types::quotient_nullable()));
        table.add(
            Operator::new(
                "||",
                K::Concat,
                return_types::dyadic_string_sum_precision_nullable(),
            )
            .operands(2, Some(2))
            .families(vec![F::Character]),
        );
        // The target type of a CAST is always explicit.
        table.add(
            Operator::new("CAST", K::Cast, Arc::new(NoReturnType))
                .operands(1, Some(1))
                .families(vec![F::Any]),
        );
        table.add(
            Operator::new("IS NULL", K::IsNull, return_types::boolean_not_null())
                .operands(1, Some(1))
                .operand_inference(operand_types::first_known()),
        );
        table.add(
            Operator::new("IS NOT NULL", K::IsNotNull, return_types::boolean_not_null())
                .operands(1, Some(1))
                .operand_inference(operand_types::first_known()),
        );
        table.add(Operator::new("CASE", K::Case, return_types::case()).operands(3, None));
        table.add(
            Operator::new("COALESCE", K::Coalesce, return_types::least_restrictive())
                .operands(1, None)
                .operand_inference(operand_types::first_known()),
        );
        table.add(
            Operator::new("FLOOR", K::Floor, return_types::arg0_or_exact_no_scale())
                .operands(1, Some(1))
                .families(vec![F::Numeric]),
        );
        table.add(
            Operator::new("CEIL", K::Ceil, return_types::arg0_or_exact_no_scale())
                .operands(1, Some(1))
                .families(vec![F::Numeric]),
        );
        table.add(
            Operator::new(
                "ITEM",
                K::Item,
                crate::inference::explicit(
                    DataType::new(crate::types::TypeName::Any).with_nullable(true),
                ),
            )
            .operands(2, Some(2)),
        );

        table.add(
            Operator::new("COUNT", K::Count, return_types::bigint())
                .operands(0, None)
                .aggregate(),
        );
        table.add(
            Operator::new("SUM", K::Sum, return_types::agg_sum())
                .operands(1, Some(1))
                .families(vec![F::Numeric])
                .aggregate(),
        );
        table.add(
            Operator::new("$SUM0", K::Sum0, return_types::agg_sum_empty_is_zero())
                .operands(1, Some(1))
                .families(vec![F::Numeric])
                .aggregate(),
        );
        table.add(
            Operator::new("AVG", K::Avg, return_types::avg_agg())
                .operands(1, Some(1))
                .families(vec![F::Numeric])
                .aggregate(),
        );
        table.add(
            Operator::new("MIN", K::Min, return_types::arg0_nullable_if_empty())
                .operands(1, Some(1))
                .aggregate(),
        );
        table.add(
            Operator::new("MAX", K::Max, return_types::arg0_nullable_if_empty())
                .operands(1, Some(1))
                .aggregate(),
        );
        table
    }

    fn add(&mut self, op: Operator) {
        let op = Arc::new(op);
        self.by_kind.insert(op.kind(), op.clone());
        self.by_name.insert(op.name().to_string(), op);
    }

    /// Registers a user-defined operator under its qualified name.
    pub fn register_user_defined(&mut self, op: Operator) -> Result<OperatorRef> {
        let Some(class) = op.class_name().map(str::to_string) else {
            return Err(AlgError::UnknownOperator(format!(
                "{} (user-defined operators need a qualified name)",
                op.name()
            )));
        };
        let op = Arc::new(op);
        self.user_defined.insert(class, op.clone());
        Ok(op)
    }

    pub fn lookup(&self, name: &str) -> Option<OperatorRef> {
        self.by_name.get(name).cloned()
    }

    pub fn lookup_class(&self, qualified_name: &str) -> Option<OperatorRef> {
        self.user_defined.get(qualified_name).cloned()
    }

    /// A standard operator by kind.
    pub fn get(&self, kind: OperatorKind) -> Result<OperatorRef> {
        self.by_kind
            .get(&kind)
            .cloned()
            .ok_or_else(|| AlgError::UnknownOperator(format!("{:?}", kind)))
    }

    /// Standard table by display name first, then user-defined by qualified name.
    pub fn resolve(&self, name: &str, class: Option<&str>) -> Result<OperatorRef> {
        if class.is_none() {
            if let Some(op) = self.lookup(name) {
                return Ok(op);
            }
        }
        class
            .and_then(|c| self.lookup_class(c))
            .or_else(|| self.lookup_class(name))
            .ok_or_else(|| AlgError::UnknownOperator(class.unwrap_or(name).to_string()))
    }
}

/// Return inference that never yields a type; calls must supply theirs explicitly.
#[derive(Debug, Clone, Copy)]
pub struct NoReturnType;

impl crate::inference::ReturnTypeInference for NoReturnType {
    fn infer_return_type(
        &self,
        _binding: &crate::inference::OperatorBinding<'_>,
    ) -> Option<DataType> {
        None
    }
}
