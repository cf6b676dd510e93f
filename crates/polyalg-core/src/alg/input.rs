//! Typed accessor handed to node constructors when a plan is rebuilt.
//!
//! A reader binds an [`AlgInput`] to the raw attributes of one serialized node plus the
//! already-built inputs of that node, then calls the constructor registered for the
//! node's type tag. Constructors pull their parameters through the typed getters and
//! never see the wire format.
//!
//! Getters are keyed by the same labels the node emits in its explain terms. A missing
//! or ill-typed attribute fails with [`crate::error::AlgError::MalformedPlan`].

use super::{AggregateCall, AlgRef};
use crate::catalog::EntityRef;
use crate::context::AlgContext;
use crate::error::{AlgError, Result};
use crate::rex::RexRef;
use crate::traits::{Collation, RowFormat};
use crate::types::RowType;

/// An enumeration stored by name in explain terms.
pub trait AlgEnum: Sized + Copy {
    /// What the value is, for error messages.
    const TYPE_NAME: &'static str;

    fn as_str(&self) -> &'static str;

    fn parse(text: &str) -> Option<Self>;
}

impl AlgEnum for RowFormat {
    const TYPE_NAME: &'static str = "row format";

    fn as_str(&self) -> &'static str {
        RowFormat::as_str(self)
    }

    fn parse(text: &str) -> Option<Self> {
        RowFormat::parse(text)
    }
}

pub trait AlgInput {
    fn context(&self) -> &AlgContext;

    fn has(&self, label: &str) -> bool;

    fn input(&self, label: &str) -> Result<AlgRef>;

    fn inputs(&self, label: &str) -> Result<Vec<AlgRef>>;

    fn string(&self, label: &str) -> Result<String>;

    fn integer(&self, label: &str) -> Result<i64>;

    /// `None` when the attribute is absent.
    fn opt_integer(&self, label: &str) -> Result<Option<i64>> {
        if self.has(label) {
            self.integer(label).map(Some)
        } else {
            Ok(None)
        }
    }

    fn boolean(&self, label: &str) -> Result<bool>;

    fn integer_list(&self, label: &str) -> Result<Vec<usize>>;

    /// Integer list as a set: ascending, no duplicates.
    fn bit_set(&self, label: &str) -> Result<Vec<usize>> {
        let mut bits = self.integer_list(label)?;
        bits.sort_unstable();
        bits.dedup();
        Ok(bits)
    }

    fn string_list(&self, label: &str) -> Result<Vec<String>>;

    fn row_type(&self, label: &str) -> Result<RowType>;

    /// Expression over the concatenated row types of this node's inputs, in the
    /// order the inputs were requested. Read inputs before expressions.
    fn expression(&self, label: &str) -> Result<RexRef>;

    fn expression_list(&self, label: &str) -> Result<Vec<RexRef>>;

    fn collation(&self, label: &str) -> Result<Collation>;

    fn agg_calls(&self, label: &str) -> Result<Vec<AggregateCall>>;

    /// Entity resolved through the catalog.
    fn entity(&self, label: &str) -> Result<EntityRef>;

    /// Literal rows typed by `row_type`.
    fn tuples(&self, label: &str, row_type: &RowType) -> Result<Vec<Vec<RexRef>>>;
}

pub trait AlgInputExt: AlgInput {
    fn enumeration<E: AlgEnum>(&self, label: &str) -> Result<E> {
        let text = self.string(label)?;
        E::parse(&text).ok_or_else(|| {
            AlgError::malformed(format!(
                "'{}' is not a valid {} for attribute '{}'",
                text,
                E::TYPE_NAME,
                label
            ))
        })
    }

    fn opt_enumeration<E: AlgEnum>(&self, label: &str) -> Result<Option<E>> {
        if self.has(label) {
            self.enumeration(label).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<T: AlgInput + ?Sized> AlgInputExt for T {}
