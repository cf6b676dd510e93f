//! # Error Taxonomy
//!
//! Every fallible operation in the plan IR returns [`AlgError`]. The variants map
//! one-to-one onto the failure classes callers need to distinguish:
//!
//! - **Build time**: [`AlgError::TypeInference`] when a call cannot be typed.
//! - **Read time**: [`AlgError::UnknownNodeKind`], [`AlgError::UnknownOperator`],
//!   [`AlgError::DanglingReference`], [`AlgError::MalformedPlan`] and
//!   [`AlgError::UnsupportedVersion`]. All of them abort the whole parse.
//! - **Plan time**: [`AlgError::PlannerInfeasible`] when no conversion path reaches the
//!   requested convention.
//! - **Run time**: [`AlgError::ConditionalExecuteViolation`] and
//!   [`AlgError::ConstraintViolation`] carry a caller-supplied kind and message verbatim.
//!
//! A rule that does not apply is *not* an error. Rules abstain by returning an empty
//! proposal list.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlgError {
    #[error("cannot infer type of call to '{operator}' at operand {operand}: {message}")]
    TypeInference {
        operator: String,
        operand: usize,
        message: String,
    },

    #[error("unknown node kind '{0}'")]
    UnknownNodeKind(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("reference to unknown node id '{0}'")]
    DanglingReference(String),

    #[error("no conversion path lowers {kind} to convention {convention}")]
    PlannerInfeasible { kind: String, convention: String },

    #[error("{kind}: {message}")]
    ConditionalExecuteViolation { kind: String, message: String },

    #[error("{kind}: {message}")]
    ConstraintViolation { kind: String, message: String },

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("unsupported plan version {0}")]
    UnsupportedVersion(u64),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("execution failed: {0}")]
    Execution(String),
}

impl AlgError {
    pub fn type_inference(
        operator: impl Into<String>,
        operand: usize,
        message: impl Into<String>,
    ) -> Self {
        AlgError::TypeInference {
            operator: operator.into(),
            operand,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AlgError::MalformedPlan(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AlgError>;
