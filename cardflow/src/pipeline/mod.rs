//! Pipeline building and execution.
//!
//! This module provides:
//! - The pipeline catalogue and its stage execution wrapper
//! - A validating pipeline builder
//! - The pipeline registry used by the entry point to dispatch work
//! - The built-in `vocabulary` pipeline

mod builder;
#[allow(clippy::module_inception)]
mod pipeline;
mod registry;
mod vocabulary;

pub use builder::PipelineBuilder;
pub use pipeline::{Pipeline, StageInfo};
pub use registry::PipelineRegistry;
pub use vocabulary::{vocabulary_pipeline, VOCABULARY_PIPELINE};
