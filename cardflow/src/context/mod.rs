//! Context management for pipeline execution.
//!
//! This module provides:
//! - A keyed value bag shared by every stage of a run
//! - The execution context carrying run identity and bookkeeping

mod bags;
mod execution;

pub use bags::ContextBag;
pub use execution::ExecutionContext;
