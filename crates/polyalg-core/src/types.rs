//! # Type System
//!
//! Scalar and row types shared by expressions and plan nodes.
//!
//! ## Data Types
//!
//! A [`DataType`] is a [`TypeName`] plus optional precision/scale, a nullability flag
//! and, for `ROW`, a nested [`RowType`]. Types are plain values: equality is deep and a
//! clone of a row type only bumps a reference count.
//!
//! ## Row Types
//!
//! A [`RowType`] is an ordered list of named fields. Field order is the addressing
//! scheme for field references, so two row types with the same fields in a different
//! order are different types. Row types are built once through [`RowTypeBuilder`] and
//! are immutable afterwards.
//!
//! ## Type System Limits
//!
//! [`TypeSystem`] holds the clamping constants (maximum numeric precision and scale,
//! maximum character/binary length) and the derivation laws for decimal arithmetic:
//!
//! ```text
//! sum:      s = max(s1, s2)            p = min(max(p1 - s1, p2 - s2) + s + 1, maxP)
//! product:  s = min(s1 + s2, maxS)     p = min(p1 + p2, maxP)
//! quotient: d = min(p1 - s1 + s2, maxP)
//!           s = min(max(6, s1 + p2 + 1), maxP - d, maxS)
//!           p = d + s
//! ```
//!
//! Exact integer types take part in these laws with their implicit precision
//! (TINYINT 3, SMALLINT 5, INTEGER 10, BIGINT 19) and scale 0, but a decimal law only
//! applies when at least one operand is `DECIMAL`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of a primitive or composite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeName {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Decimal,
    Real,
    Double,
    Char,
    Varchar,
    Binary,
    Varbinary,
    Date,
    Time,
    Timestamp,
    Any,
    Null,
    /// Type of an operand whose type is not known yet (e.g. an untyped parameter).
    Unknown,
    Row,
}

/// Coarse grouping of types used by operand checking and least-restrictive derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Numeric,
    Character,
    Binary,
    Boolean,
    Datetime,
    Any,
    Null,
    Unknown,
    Row,
}

const ALL_TYPE_NAMES: [TypeName; 19] = [
    TypeName::Boolean,
    TypeName::TinyInt,
    TypeName::SmallInt,
    TypeName::Integer,
    TypeName::BigInt,
    TypeName::Decimal,
    TypeName::Real,
    TypeName::Double,
    TypeName::Char,
    TypeName::Varchar,
    TypeName::Binary,
    TypeName::Varbinary,
    TypeName::Date,
    TypeName::Time,
    TypeName::Timestamp,
    TypeName::Any,
    TypeName::Null,
    TypeName::Unknown,
    TypeName::Row,
];

impl TypeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeName::Boolean => "BOOLEAN",
            TypeName::TinyInt => "TINYINT",
            TypeName::SmallInt => "SMALLINT",
            TypeName::Integer => "INTEGER",
            TypeName::BigInt => "BIGINT",
            TypeName::Decimal => "DECIMAL",
            TypeName::Real => "REAL",
            TypeName::Double => "DOUBLE",
            TypeName::Char => "CHAR",
            TypeName::Varchar => "VARCHAR",
            TypeName::Binary => "BINARY",
            TypeName::Varbinary => "VARBINARY",
            TypeName::Date => "DATE",
            TypeName::Time => "TIME",
            TypeName::Timestamp => "TIMESTAMP",
            TypeName::Any => "ANY",
            TypeName::Null => "NULL",
            TypeName::Unknown => "UNKNOWN",
            TypeName::Row => "ROW",
        }
    }

    pub fn parse(name: &str) -> Option<TypeName> {
        ALL_TYPE_NAMES
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            TypeName::TinyInt
            | TypeName::SmallInt
            | TypeName::Integer
            | TypeName::BigInt
            | TypeName::Decimal
            | TypeName::Real
            | TypeName::Double => TypeFamily::Numeric,
            TypeName::Char | TypeName::Varchar => TypeFamily::Character,
            TypeName::Binary | TypeName::Varbinary => TypeFamily::Binary,
            TypeName::Boolean => TypeFamily::Boolean,
            TypeName::Date | TypeName::Time | TypeName::Timestamp => TypeFamily::Datetime,
            TypeName::Any => TypeFamily::Any,
            TypeName::Null => TypeFamily::Null,
            TypeName::Unknown => TypeFamily::Unknown,
            TypeName::Row => TypeFamily::Row,
        }
    }

    pub fn is_exact_numeric(&self) -> bool {
        matches!(
            self,
            TypeName::TinyInt
                | TypeName::SmallInt
                | TypeName::Integer
                | TypeName::BigInt
                | TypeName::Decimal
        )
    }

    pub fn is_approximate_numeric(&self) -> bool {
        matches!(self, TypeName::Real | TypeName::Double)
    }

    /// VARCHAR and VARBINARY.
    pub fn is_varying(&self) -> bool {
        matches!(self, TypeName::Varchar | TypeName::Varbinary)
    }

    pub fn allows_precision(&self) -> bool {
        matches!(
            self,
            TypeName::Decimal
                | TypeName::Char
                | TypeName::Varchar
                | TypeName::Binary
                | TypeName::Varbinary
                | TypeName::Time
                | TypeName::Timestamp
        )
    }

    pub fn allows_scale(&self) -> bool {
        matches!(self, TypeName::Decimal)
    }

    /// Precision an integer type has without declaring one.
    pub fn implicit_precision(&self) -> Option<u32> {
        match self {
            TypeName::TinyInt => Some(3),
            TypeName::SmallInt => Some(5),
            TypeName::Integer => Some(10),
            TypeName::BigInt => Some(19),
            _ => None,
        }
    }

    /// Widening order among numeric types; larger wins in least-restrictive derivation.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            TypeName::TinyInt => Some(1),
            TypeName::SmallInt => Some(2),
            TypeName::Integer => Some(3),
            TypeName::BigInt => Some(4),
            TypeName::Decimal => Some(5),
            TypeName::Real => Some(6),
            TypeName::Double => Some(7),
            _ => None,
        }
    }

    /// Fixed-width counterpart becomes varying; other names are returned unchanged.
    pub fn to_varying(&self) -> TypeName {
        match self {
            TypeName::Char => TypeName::Varchar,
            TypeName::Binary => TypeName::Varbinary,
            other => *other,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved scalar or row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    name: TypeName,
    precision: Option<u32>,
    scale: Option<u32>,
    nullable: bool,
    fields: Option<RowType>,
}

impl DataType {
    /// A NOT NULL type without precision or scale.
    pub fn new(name: TypeName) -> Self {
        Self {
            name,
            precision: None,
            scale: None,
            nullable: name == TypeName::Null,
            fields: None,
        }
    }

    pub fn with_precision(name: TypeName, precision: u32) -> Self {
        Self {
            precision: Some(precision),
            ..Self::new(name)
        }
    }

    pub fn decimal(precision: u32, scale: u32) -> Self {
        Self {
            precision: Some(precision),
            scale: Some(scale),
            ..Self::new(TypeName::Decimal)
        }
    }

    pub fn row(row_type: RowType) -> Self {
        Self {
            fields: Some(row_type),
            ..Self::new(TypeName::Row)
        }
    }

    pub fn boolean() -> Self {
        Self::new(TypeName::Boolean)
    }

    pub fn bigint() -> Self {
        Self::new(TypeName::BigInt)
    }

    pub fn integer() -> Self {
        Self::new(TypeName::Integer)
    }

    pub fn double() -> Self {
        Self::new(TypeName::Double)
    }

    pub fn varchar(precision: Option<u32>) -> Self {
        Self {
            precision,
            ..Self::new(TypeName::Varchar)
        }
    }

    pub fn unknown() -> Self {
        Self::new(TypeName::Unknown).with_nullable(true)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_name(mut self, name: TypeName) -> Self {
        self.name = name;
        self
    }

    pub fn with_precision_scale(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn name(&self) -> TypeName {
        self.name
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn family(&self) -> TypeFamily {
        self.name.family()
    }

    pub fn fields(&self) -> Option<&RowType> {
        self.fields.as_ref()
    }

    pub fn is_unknown(&self) -> bool {
        self.name == TypeName::Unknown
    }

    /// Declared precision, or the implicit precision of an integer type.
    pub fn effective_precision(&self) -> Option<u32> {
        self.precision.or_else(|| self.name.implicit_precision())
    }

    /// Declared scale; exact numerics without one have scale 0.
    pub fn effective_scale(&self) -> u32 {
        self.scale.unwrap_or(0)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fields) = &self.fields {
            write!(f, "RecordType(")?;
            for (i, field) in fields.fields().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", field.data_type, field.name)?;
            }
            write!(f, ")")?;
        } else {
            write!(f, "{}", self.name)?;
            match (self.precision, self.scale) {
                (Some(p), Some(s)) => write!(f, "({}, {})", p, s)?,
                (Some(p), None) => write!(f, "({})", p)?,
                _ => {}
            }
        }
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// A named field of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered list of named fields. Immutable; clones share the field list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowType {
    fields: Arc<[Field]>,
}

impl RowType {
    pub fn builder() -> RowTypeBuilder {
        RowTypeBuilder::default()
    }

    pub fn empty() -> Self {
        Self {
            fields: Arc::from(Vec::new()),
        }
    }

    /// Single `ROWCOUNT BIGINT NOT NULL` field, the result of DML-like nodes.
    pub fn row_count() -> Self {
        RowType::builder().add("ROWCOUNT", DataType::bigint()).build()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Row type made of the selected fields, in the order given.
    pub fn project(&self, indices: &[usize]) -> Option<RowType> {
        let mut builder = RowType::builder();
        for &i in indices {
            let field = self.fields.get(i)?;
            builder = builder.add(field.name.clone(), field.data_type.clone());
        }
        Some(builder.build())
    }

    /// Concatenation of several row types, as produced by a join.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a RowType>) -> RowType {
        let mut builder = RowType::builder();
        for part in parts {
            for field in part.fields() {
                builder = builder.add(field.name.clone(), field.data_type.clone());
            }
        }
        builder.build()
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DataType::row(self.clone()))
    }
}

/// Accumulates fields, then freezes them into a [`RowType`].
#[derive(Debug, Default)]
pub struct RowTypeBuilder {
    fields: Vec<Field>,
}

impl RowTypeBuilder {
    pub fn add(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.push(Field {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn push(&mut self, name: impl Into<String>, data_type: DataType) {
        self.fields.push(Field {
            name: name.into(),
            data_type,
        });
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(self) -> RowType {
        RowType {
            fields: Arc::from(self.fields),
        }
    }
}

/// Clamping constants and derivation laws of the type lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSystem {
    pub max_numeric_precision: u32,
    pub max_numeric_scale: u32,
    pub max_char_precision: u32,
    pub max_binary_precision: u32,
    pub default_decimal_precision: u32,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self {
            max_numeric_precision: 19,
            max_numeric_scale: 19,
            max_char_precision: 65536,
            max_binary_precision: 65536,
            default_decimal_precision: 19,
        }
    }
}

impl TypeSystem {
    /// Maximum precision for a type name, if the name takes a precision.
    pub fn max_precision(&self, name: TypeName) -> Option<u32> {
        match name {
            TypeName::Decimal => Some(self.max_numeric_precision),
            TypeName::Char | TypeName::Varchar => Some(self.max_char_precision),
            TypeName::Binary | TypeName::Varbinary => Some(self.max_binary_precision),
            _ => None,
        }
    }

    /// `DECIMAL(p, s)` with both values clamped to the system maxima.
    pub fn create_decimal(&self, precision: u32, scale: u32) -> DataType {
        let scale = scale.min(self.max_numeric_scale);
        let precision = precision.min(self.max_numeric_precision).max(1);
        DataType::decimal(precision, scale.min(precision))
    }

    /// Both operands exact numeric and at least one of them `DECIMAL`.
    fn decimal_operands(&self, a: &DataType, b: &DataType) -> Option<(u32, u32, u32, u32)> {
        if !(a.name().is_exact_numeric() && b.name().is_exact_numeric()) {
            return None;
        }
        if a.name() != TypeName::Decimal && b.name() != TypeName::Decimal {
            return None;
        }
        let p1 = a.effective_precision()?;
        let p2 = b.effective_precision()?;
        Some((p1, a.effective_scale(), p2, b.effective_scale()))
    }

    /// Result type of `a + b` / `a - b` for decimal operands, NOT NULL.
    pub fn derive_decimal_sum(&self, a: &DataType, b: &DataType) -> Option<DataType> {
        let (p1, s1, p2, s2) = self.decimal_operands(a, b)?;
        let scale = s1.max(s2).min(self.max_numeric_scale);
        let integer_digits = p1.saturating_sub(s1).max(p2.saturating_sub(s2));
        let precision = integer_digits
            .saturating_add(scale)
            .saturating_add(1)
            .min(self.max_numeric_precision);
        Some(DataType::decimal(precision, scale.min(precision)))
    }

    /// Result type of `a * b` for decimal operands, NOT NULL.
    pub fn derive_decimal_product(&self, a: &DataType, b: &DataType) -> Option<DataType> {
        let (p1, s1, p2, s2) = self.decimal_operands(a, b)?;
        let scale = s1.saturating_add(s2).min(self.max_numeric_scale);
        let precision = p1.saturating_add(p2).min(self.max_numeric_precision);
        Some(DataType::decimal(precision, scale.min(precision)))
    }

    /// Result type of `a / b` for decimal operands, NOT NULL.
    pub fn derive_decimal_quotient(&self, a: &DataType, b: &DataType) -> Option<DataType> {
        let (p1, s1, p2, s2) = self.decimal_operands(a, b)?;
        let max_precision = self.max_numeric_precision;
        let integer_digits = p1.saturating_sub(s1).saturating_add(s2).min(max_precision);
        let scale = s1
            .saturating_add(p2)
            .saturating_add(1)
            .max(6)
            .min(max_precision - integer_digits)
            .min(self.max_numeric_scale);
        Some(DataType::decimal(integer_digits + scale, scale))
    }

    /// Type of `SUM(x)` before nullability adjustment.
    pub fn derive_sum_type(&self, arg: &DataType) -> DataType {
        arg.clone()
    }

    /// Type of `AVG(x)` before nullability adjustment.
    pub fn derive_avg_type(&self, arg: &DataType) -> DataType {
        arg.clone()
    }

    /// Narrowest type every input can be converted to without loss, if any.
    ///
    /// `NULL` operands only contribute nullability. Numeric operands widen along
    /// TINYINT < SMALLINT < INTEGER < BIGINT < DECIMAL < REAL < DOUBLE, character and
    /// binary operands widen to the longest length and become varying if any input is.
    pub fn least_restrictive(&self, types: &[DataType]) -> Option<DataType> {
        let nullable = types.iter().any(|t| t.is_nullable());
        let typed: Vec<&DataType> = types
            .iter()
            .filter(|t| t.name() != TypeName::Null)
            .collect();
        let Some(first) = typed.first() else {
            return types.first().cloned();
        };
        if typed.iter().any(|t| t.name() == TypeName::Any) {
            return Some(DataType::new(TypeName::Any).with_nullable(nullable));
        }
        let family = first.family();
        if typed.iter().any(|t| t.family() != family) {
            return None;
        }

        let result = match family {
            TypeFamily::Numeric => self.least_restrictive_numeric(&typed)?,
            TypeFamily::Character | TypeFamily::Binary => {
                let varying = typed.iter().any(|t| t.name().is_varying());
                let mut precision = Some(0u32);
                for t in &typed {
                    precision = match (precision, t.precision()) {
                        (Some(acc), Some(p)) => Some(acc.max(p)),
                        _ => None,
                    };
                }
                let name = if varying {
                    first.name().to_varying()
                } else {
                    match first.name() {
                        TypeName::Varchar => TypeName::Char,
                        TypeName::Varbinary => TypeName::Binary,
                        other => other,
                    }
                };
                DataType::new(name).with_precision_scale(precision, None)
            }
            TypeFamily::Row => {
                if typed.iter().any(|t| t.fields() != first.fields()) {
                    return None;
                }
                (*first).clone()
            }
            _ => {
                if typed.iter().any(|t| t.name() != first.name()) {
                    return None;
                }
                let precision = typed.iter().filter_map(|t| t.precision()).max();
                DataType::new(first.name()).with_precision_scale(precision, None)
            }
        };
        Some(result.with_nullable(nullable))
    }

    fn least_restrictive_numeric(&self, typed: &[&DataType]) -> Option<DataType> {
        let widest = typed
            .iter()
            .max_by_key(|t| t.name().numeric_rank().unwrap_or(0))?;
        match widest.name() {
            TypeName::Decimal => {
                let mut integer_digits = 0;
                let mut scale = 0;
                for t in typed {
                    let p = t.effective_precision()?;
                    let s = t.effective_scale();
                    integer_digits = integer_digits.max(p.saturating_sub(s));
                    scale = scale.max(s);
                }
                Some(self.create_decimal(integer_digits + scale, scale))
            }
            name => Some(DataType::new(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_sum_follows_law() {
        let ts = TypeSystem::default();
        let a = DataType::decimal(5, 2);
        let b = DataType::decimal(3, 1);
        let sum = ts.derive_decimal_sum(&a, &b).unwrap();
        let scale = 2.max(1);
        let precision = ((5 - 2).max(3 - 1) + scale + 1).min(ts.max_numeric_precision);
        assert_eq!(sum.scale(), Some(scale));
        assert_eq!(sum.precision(), Some(precision));
        assert!(!sum.is_nullable());
    }

    #[test]
    fn test_decimal_sum_clamps_precision() {
        let ts = TypeSystem::default();
        let a = DataType::decimal(19, 0);
        let b = DataType::decimal(19, 0);
        let sum = ts.derive_decimal_sum(&a, &b).unwrap();
        assert_eq!(sum.precision(), Some(19));
    }

    #[test]
    fn test_decimal_rules_need_a_decimal_operand() {
        let ts = TypeSystem::default();
        assert!(ts
            .derive_decimal_sum(&DataType::integer(), &DataType::bigint())
            .is_none());
        let mixed = ts
            .derive_decimal_product(&DataType::integer(), &DataType::decimal(4, 2))
            .unwrap();
        assert_eq!(mixed.precision(), Some(14));
        assert_eq!(mixed.scale(), Some(2));
    }

    #[test]
    fn test_decimal_quotient() {
        let ts = TypeSystem::default();
        let q = ts
            .derive_decimal_quotient(&DataType::decimal(10, 2), &DataType::decimal(5, 1))
            .unwrap();
        // d = min(10 - 2 + 1, 19) = 9, s = min(max(6, 2 + 5 + 1), 19 - 9, 19) = 8
        assert_eq!(q.precision(), Some(17));
        assert_eq!(q.scale(), Some(8));
    }

    #[test]
    fn test_decimal_laws_saturate_on_huge_declarations() {
        let ts = TypeSystem::default();
        let huge = DataType::new(TypeName::Decimal)
            .with_precision_scale(Some(u32::MAX), Some(u32::MAX - 1));
        let max = ts.max_numeric_precision;
        for derived in [
            ts.derive_decimal_sum(&huge, &huge),
            ts.derive_decimal_product(&huge, &huge),
            ts.derive_decimal_quotient(&huge, &huge),
        ] {
            let derived = derived.unwrap();
            assert!(derived.precision().unwrap() <= max);
            assert!(derived.scale().unwrap() <= derived.precision().unwrap());
        }
    }

    #[test]
    fn test_least_restrictive_numeric_and_character() {
        let ts = TypeSystem::default();
        let t = ts
            .least_restrictive(&[DataType::integer(), DataType::bigint().with_nullable(true)])
            .unwrap();
        assert_eq!(t.name(), TypeName::BigInt);
        assert!(t.is_nullable());

        let c = ts
            .least_restrictive(&[
                DataType::with_precision(TypeName::Char, 3),
                DataType::varchar(Some(10)),
            ])
            .unwrap();
        assert_eq!(c.name(), TypeName::Varchar);
        assert_eq!(c.precision(), Some(10));

        assert!(ts
            .least_restrictive(&[DataType::boolean(), DataType::integer()])
            .is_none());
    }

    #[test]
    fn test_row_type_builder_and_project() {
        let rt = RowType::builder()
            .add("id", DataType::integer())
            .add("name", DataType::varchar(Some(20)))
            .add("salary", DataType::decimal(10, 2).with_nullable(true))
            .build();
        assert_eq!(rt.field_count(), 3);
        assert_eq!(rt.index_of("salary"), Some(2));
        let narrowed = rt.project(&[2, 0]).unwrap();
        assert_eq!(narrowed.field_names(), vec!["salary", "id"]);
        assert!(rt.project(&[5]).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::decimal(7, 2).to_string(), "DECIMAL(7, 2) NOT NULL");
        assert_eq!(DataType::varchar(None).with_nullable(true).to_string(), "VARCHAR");
        assert_eq!(TypeName::parse("bigint"), Some(TypeName::BigInt));
    }
}
