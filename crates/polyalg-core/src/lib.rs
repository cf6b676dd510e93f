//! # polyalg-core: Relational Plan IR and Planner
//!
//! This crate holds the relational-algebra intermediate representation of the query
//! engine: scalar expressions, the type system, the plan node kinds and the
//! rule-driven planner that rewrites and lowers plans.
//!
//! ## Module Overview
//!
//! - **`types`**: SQL type descriptors, row types and the type system policy.
//! - **`operator`** / **`inference`**: the operator table and return-type inference.
//! - **`rex`**: scalar expressions and the builder that types them at construction.
//! - **`traits`**: physical traits (convention, collation, distribution) and row layouts.
//! - **`alg`**: the plan node kinds, text explain, and the node registry used by readers.
//! - **`catalog`** / **`stats`**: entity metadata, statistics and row count estimates.
//! - **`cost`**: cost values and the optional cost model.
//! - **`pattern`** / **`rule`**: rule patterns, the rule trait and the rule registry.
//! - **`planner`**: the explore/convert planner.
//! - **`exec`**: runtime contract of the control-flow nodes.
//! - **`context`** / **`config`**: shared registries and planner settings.

pub mod alg;
pub mod catalog;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod exec;
pub mod inference;
pub mod operator;
pub mod pattern;
pub mod planner;
pub mod rex;
pub mod rule;
pub mod stats;
pub mod traits;
pub mod types;

pub use alg::{explain, AlgNode, AlgRef, NodeKind};
pub use context::AlgContext;
pub use error::{AlgError, Result};
pub use planner::{Planner, PlannerState};
