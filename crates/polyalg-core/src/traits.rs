//! # Traits and Conventions
//!
//! A [`TraitSet`] records the execution-relevant properties of a plan node, one value
//! per trait kind:
//!
//! - **Convention**: the execution regime. Plans start in [`Convention::Abstract`]
//!   (logical shapes, not executable), are lowered to [`Convention::Compiled`]
//!   (closed-form physical plan with a concrete row layout) and may finally be wrapped
//!   into [`Convention::Interpreted`] (executes a compiled subtree without a
//!   compilation step).
//! - **Collation**: the sort order the node's output is known to have.
//! - **Distribution**: how rows are spread across workers.
//!
//! Trait sets are immutable values. Rules do not inspect them beyond what their
//! pattern declares; the planner compares them with [`TraitSet::satisfies`].
//!
//! ## Row Layout Preference
//!
//! Compiled nodes materialize rows either as arrays of values, as structured records,
//! or (for single-field rows) as bare scalars. The caller picks via [`Prefer`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Convention {
    Abstract,
    Compiled,
    Interpreted,
}

impl Convention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Convention::Abstract => "ABSTRACT",
            Convention::Compiled => "COMPILED",
            Convention::Interpreted => "INTERPRETED",
        }
    }

    /// Whether this convention produces executable nodes.
    pub fn is_physical(&self) -> bool {
        !matches!(self, Convention::Abstract)
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NullDirection {
    First,
    Last,
    Unspecified,
}

/// Sort key on one output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldCollation {
    pub field: usize,
    pub direction: Direction,
    pub nulls: NullDirection,
}

impl FieldCollation {
    pub fn asc(field: usize) -> Self {
        Self {
            field,
            direction: Direction::Ascending,
            nulls: NullDirection::Unspecified,
        }
    }

    pub fn desc(field: usize) -> Self {
        Self {
            field,
            direction: Direction::Descending,
            nulls: NullDirection::Unspecified,
        }
    }
}

impl fmt::Display for FieldCollation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field)?;
        if self.direction == Direction::Descending {
            write!(f, " DESC")?;
        }
        match self.nulls {
            NullDirection::First => write!(f, " NULLS FIRST"),
            NullDirection::Last => write!(f, " NULLS LAST"),
            NullDirection::Unspecified => Ok(()),
        }
    }
}

/// Ordered list of sort keys; empty means "no known order".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collation(pub Vec<FieldCollation>);

impl Collation {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn of(keys: Vec<FieldCollation>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[FieldCollation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A required order is satisfied when it is a prefix of the provided order.
    pub fn satisfied_by(&self, provided: &Collation) -> bool {
        self.0.len() <= provided.0.len()
            && self.0.iter().zip(provided.0.iter()).all(|(r, p)| r == p)
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    #[default]
    Any,
    Singleton,
    Hash(Vec<usize>),
    Broadcast,
}

/// How a compiled node lays out its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowFormat {
    /// Single-field rows as the bare value.
    Scalar,
    /// Rows as arrays of values.
    Array,
    /// Rows as structured records with named members.
    Record,
}

impl RowFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowFormat::Scalar => "SCALAR",
            RowFormat::Array => "ARRAY",
            RowFormat::Record => "RECORD",
        }
    }

    pub fn parse(text: &str) -> Option<RowFormat> {
        match text {
            "SCALAR" => Some(RowFormat::Scalar),
            "ARRAY" => Some(RowFormat::Array),
            "RECORD" => Some(RowFormat::Record),
            _ => None,
        }
    }
}

/// Caller preference for the compiled row layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prefer {
    #[default]
    Any,
    Array,
    Custom,
}

impl Prefer {
    /// Layout for a row with the given number of fields. Single-field rows collapse to
    /// scalars unless arrays are explicitly preferred.
    pub fn resolve(&self, field_count: usize) -> RowFormat {
        match self {
            Prefer::Array => RowFormat::Array,
            Prefer::Any | Prefer::Custom if field_count == 1 => RowFormat::Scalar,
            Prefer::Any | Prefer::Custom => RowFormat::Record,
        }
    }
}

/// Immutable set of traits attached to a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraitSet {
    convention: Convention,
    collation: Collation,
    distribution: Distribution,
}

impl TraitSet {
    pub fn of(convention: Convention) -> Self {
        Self {
            convention,
            collation: Collation::empty(),
            distribution: Distribution::Any,
        }
    }

    pub fn abstract_() -> Self {
        Self::of(Convention::Abstract)
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn with_convention(&self, convention: Convention) -> Self {
        Self {
            convention,
            ..self.clone()
        }
    }

    pub fn with_collation(&self, collation: Collation) -> Self {
        Self {
            collation,
            ..self.clone()
        }
    }

    pub fn with_distribution(&self, distribution: Distribution) -> Self {
        Self {
            distribution,
            ..self.clone()
        }
    }

    /// Whether a node with these traits can stand where `required` is asked for.
    pub fn satisfies(&self, required: &TraitSet) -> bool {
        let distribution_ok = match &required.distribution {
            Distribution::Any => true,
            other => other == &self.distribution,
        };
        self.convention == required.convention
            && required.collation.satisfied_by(&self.collation)
            && distribution_ok
    }
}

impl fmt::Display for TraitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.convention, self.collation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collation_prefix() {
        let required = Collation::of(vec![FieldCollation::asc(0)]);
        let provided = Collation::of(vec![FieldCollation::asc(0), FieldCollation::desc(2)]);
        assert!(required.satisfied_by(&provided));
        assert!(!provided.satisfied_by(&required));
        assert!(Collation::empty().satisfied_by(&Collation::empty()));
    }

    #[test]
    fn test_trait_set_satisfies() {
        let compiled = TraitSet::of(Convention::Compiled)
            .with_collation(Collation::of(vec![FieldCollation::asc(1)]));
        assert!(compiled.satisfies(&TraitSet::of(Convention::Compiled)));
        assert!(!compiled.satisfies(&TraitSet::of(Convention::Interpreted)));
        assert!(!TraitSet::of(Convention::Compiled).satisfies(&compiled));
        assert!(!compiled.satisfies(
            &TraitSet::of(Convention::Compiled).with_distribution(Distribution::Singleton)
        ));
    }

    #[test]
    fn test_prefer_resolution() {
        assert_eq!(Prefer::Any.resolve(1), RowFormat::Scalar);
        assert_eq!(Prefer::Any.resolve(3), RowFormat::Record);
        assert_eq!(Prefer::Array.resolve(1), RowFormat::Array);
        assert_eq!(Prefer::Custom.resolve(2), RowFormat::Record);
    }
}
