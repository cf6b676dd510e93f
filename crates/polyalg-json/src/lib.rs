//! # Plan Serialization Protocol
//!
//! Writes plan trees to a JSON document and reads them back.
//!
//! ## Round-Trip Contract
//!
//! `read_plan(write_plan(plan))` is structurally equal to `plan`: same node kinds and
//! conventions, same row types, same expressions. Node identity and ids are not
//! preserved, except that a sub-plan shared by several parents is read back as one
//! shared node.
//!
//! ## Module Overview
//!
//! - **`producer`**: the writer ([`write_plan`], [`to_json_string`]).
//! - **`consumer`**: the reader ([`read_plan`], [`from_json_str`]) and the
//!   [`consumer::JsonInput`] accessor handed to node constructors.
//! - **`codec`**: encodings of types, expressions, collations, aggregate calls and
//!   entities.

pub mod codec;
pub mod consumer;
pub mod producer;

pub use consumer::{from_json_str, read_plan};
pub use producer::{to_json_string, write_plan, WriterConfig};

/// Version written into every plan document.
pub const PLAN_VERSION: u64 = 1;
