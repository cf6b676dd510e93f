//! # Execution Contract
//!
//! The IR does not execute plans. This module pins down the runtime behavior an
//! execution layer must give the control-flow nodes of [`crate::alg::enforcer`]:
//!
//! - Sub-computations are [`Deferred`] values: closures stored by value that run at
//!   most once, and only when the consuming layer asks. Nothing is allocated and no
//!   parameter is bound before that.
//! - [`conditional_execute`] evaluates the guard first and never touches the guarded
//!   computation when the guard fails.
//! - [`enforce_constraints`] runs the modification, then the control plan. The first
//!   control row is a violation.
//! - [`ContextSwitch`] is a lazy row sequence whose wrapped computation starts on the
//!   first poll.

use crate::alg::AlgEnum;
use crate::catalog::RowIter;
use crate::error::{AlgError, Result};
use crate::rex::LiteralValue;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub type Row = Vec<LiteralValue>;

/// Runtime values of a query: bound dynamic parameters.
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    parameters: HashMap<usize, LiteralValue>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, index: usize, value: LiteralValue) -> Self {
        self.parameters.insert(index, value);
        self
    }

    pub fn bind(&mut self, index: usize, value: LiteralValue) {
        self.parameters.insert(index, value);
    }

    pub fn parameter(&self, index: usize) -> Option<&LiteralValue> {
        self.parameters.get(&index)
    }
}

/// A suspended computation. Running it consumes it.
pub struct Deferred<T> {
    thunk: Box<dyn FnOnce(&DataContext) -> Result<T> + Send>,
}

impl<T> Deferred<T> {
    pub fn new(thunk: impl FnOnce(&DataContext) -> Result<T> + Send + 'static) -> Self {
        Self {
            thunk: Box::new(thunk),
        }
    }

    pub fn run(self, ctx: &DataContext) -> Result<T> {
        (self.thunk)(ctx)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Guard of a conditional execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Row count above zero.
    GreaterZero,
    /// Row count exactly zero.
    EqualToZero,
    /// Boolean value is true.
    True,
    /// Boolean value is false.
    False,
}

impl AlgEnum for Condition {
    const TYPE_NAME: &'static str = "condition";

    fn as_str(&self) -> &'static str {
        match self {
            Condition::GreaterZero => "GREATER_ZERO",
            Condition::EqualToZero => "EQUAL_TO_ZERO",
            Condition::True => "TRUE",
            Condition::False => "FALSE",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "GREATER_ZERO" => Some(Condition::GreaterZero),
            "EQUAL_TO_ZERO" => Some(Condition::EqualToZero),
            "TRUE" => Some(Condition::True),
            "FALSE" => Some(Condition::False),
            _ => None,
        }
    }
}

impl Condition {
    /// Count conditions take an integer, boolean conditions a boolean.
    pub fn holds(&self, value: &LiteralValue) -> Result<bool> {
        let mismatch = || {
            AlgError::Execution(format!(
                "condition {} cannot be evaluated on {}",
                self.as_str(),
                value
            ))
        };
        match self {
            Condition::GreaterZero => value.as_i64().map(|n| n > 0).ok_or_else(mismatch),
            Condition::EqualToZero => value.as_i64().map(|n| n == 0).ok_or_else(mismatch),
            Condition::True => value.as_bool().ok_or_else(mismatch),
            Condition::False => value.as_bool().map(|b| !b).ok_or_else(mismatch),
        }
    }
}

/// Evaluates `left`; runs `right` only if `condition` holds on the result, otherwise
/// fails with the given exception kind and message.
pub fn conditional_execute<R>(
    ctx: &DataContext,
    condition: Condition,
    exception_class: &str,
    exception_message: &str,
    left: Deferred<LiteralValue>,
    right: Deferred<R>,
) -> Result<R> {
    let value = left.run(ctx)?;
    if !condition.holds(&value)? {
        debug!(condition = condition.as_str(), %value, "conditional execution guard failed");
        return Err(AlgError::ConditionalExecuteViolation {
            kind: exception_class.to_string(),
            message: exception_message.to_string(),
        });
    }
    right.run(ctx)
}

/// Runs `modify`, then `control`. A control row reports a violation of the constraint
/// whose position is in its last column; `exceptions[position]` is raised, or the
/// first exception when the position is missing or out of range.
pub fn enforce_constraints<T>(
    ctx: &DataContext,
    modify: Deferred<T>,
    control: Deferred<RowIter>,
    exceptions: &[(String, String)],
) -> Result<T> {
    let result = modify.run(ctx)?;
    let mut rows = control.run(ctx)?;
    let Some(row) = rows.next() else {
        return Ok(result);
    };
    let row = row?;
    let position = row
        .last()
        .and_then(LiteralValue::as_i64)
        .and_then(|p| usize::try_from(p).ok())
        .filter(|&p| p < exceptions.len())
        .unwrap_or(0);
    let (kind, message) = exceptions
        .get(position)
        .cloned()
        .unwrap_or_else(|| ("ConstraintViolation".to_string(), "constraint violated".to_string()));
    debug!(position, kind = %kind, "constraint violated");
    Err(AlgError::ConstraintViolation { kind, message })
}

/// Rows of a computation run under another execution context. The computation starts
/// on the first call to `next`.
pub struct ContextSwitch {
    ctx: DataContext,
    pending: Option<Deferred<RowIter>>,
    rows: Option<RowIter>,
}

impl ContextSwitch {
    pub fn new(ctx: DataContext, computation: Deferred<RowIter>) -> Self {
        Self {
            ctx,
            pending: Some(computation),
            rows: None,
        }
    }

    /// Whether the wrapped computation has started.
    pub fn is_started(&self) -> bool {
        self.pending.is_none()
    }
}

impl Iterator for ContextSwitch {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(computation) = self.pending.take() {
            match computation.run(&self.ctx) {
                Ok(rows) => self.rows = Some(rows),
                Err(e) => return Some(Err(e)),
            }
        }
        self.rows.as_mut()?.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn count(n: i64) -> Deferred<LiteralValue> {
        Deferred::new(move |_| Ok(LiteralValue::Integer(n)))
    }

    fn counted<T: Send + 'static>(calls: &Arc<AtomicUsize>, value: T) -> Deferred<T> {
        let calls = calls.clone();
        Deferred::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    fn rows(rows: Vec<Row>) -> RowIter {
        Box::new(rows.into_iter().map(Ok))
    }

    #[test]
    fn test_guard_failure_skips_right() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = conditional_execute(
            &DataContext::new(),
            Condition::GreaterZero,
            "NotFoundException",
            "nothing to update",
            count(0),
            counted(&calls, 42),
        )
        .unwrap_err();
        match err {
            AlgError::ConditionalExecuteViolation { kind, message } => {
                assert_eq!(kind, "NotFoundException");
                assert_eq!(message, "nothing to update");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_success_runs_right_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let out = conditional_execute(
            &DataContext::new(),
            Condition::EqualToZero,
            "E",
            "m",
            count(0),
            counted(&calls, "done"),
        )
        .unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_boolean_conditions() {
        assert!(Condition::True.holds(&LiteralValue::Boolean(true)).unwrap());
        assert!(Condition::False.holds(&LiteralValue::Boolean(false)).unwrap());
        assert!(Condition::True.holds(&LiteralValue::Integer(1)).is_err());
        assert!(Condition::GreaterZero.holds(&LiteralValue::Boolean(true)).is_err());
    }

    #[test]
    fn test_constraint_exception_selected_by_position() {
        let exceptions = vec![
            ("PrimaryKeyViolation".to_string(), "duplicate key".to_string()),
            ("ForeignKeyViolation".to_string(), "missing parent".to_string()),
        ];
        let err = enforce_constraints(
            &DataContext::new(),
            Deferred::new(|_| Ok(1i64)),
            Deferred::new(|_| Ok(rows(vec![vec![LiteralValue::Integer(9), LiteralValue::Integer(1)]]))),
            &exceptions,
        )
        .unwrap_err();
        assert!(matches!(err, AlgError::ConstraintViolation { ref kind, .. } if kind == "ForeignKeyViolation"));

        let err = enforce_constraints(
            &DataContext::new(),
            Deferred::new(|_| Ok(1i64)),
            Deferred::new(|_| Ok(rows(vec![vec![LiteralValue::String("x".into())]]))),
            &exceptions,
        )
        .unwrap_err();
        assert!(matches!(err, AlgError::ConstraintViolation { ref kind, .. } if kind == "PrimaryKeyViolation"));
    }

    #[test]
    fn test_empty_control_passes_modify_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let out = enforce_constraints(
            &DataContext::new(),
            counted(&calls, 3i64),
            Deferred::new(|_| Ok(rows(vec![]))),
            &[("E".to_string(), "m".to_string())],
        )
        .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_control_sees_parameters_bound_after_construction() {
        let control = Deferred::new(|ctx: &DataContext| {
            let limit = ctx.parameter(0).and_then(LiteralValue::as_i64).unwrap_or(0);
            Ok(rows(if limit > 5 { vec![vec![LiteralValue::Integer(0)]] } else { vec![] }))
        });
        let mut ctx = DataContext::new();
        ctx.bind(0, LiteralValue::Integer(10));
        let result = enforce_constraints(&ctx, Deferred::new(|_| Ok(())), control, &[("E".into(), "m".into())]);
        assert!(result.is_err());
    }

    #[test]
    fn test_context_switch_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let computation = {
            let calls = calls.clone();
            Deferred::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(rows(vec![vec![LiteralValue::Integer(1)], vec![LiteralValue::Integer(2)]]))
            })
        };
        let mut switch = ContextSwitch::new(DataContext::new(), computation);
        assert!(!switch.is_started());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first = switch.next().unwrap().unwrap();
        assert_eq!(first, vec![LiteralValue::Integer(1)]);
        assert_eq!(switch.count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
