//! Catalogue of pipelines keyed by name.

use super::Pipeline;
use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::errors::{CardflowError, RegistryError};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry of pipelines.
///
/// Built once at startup and passed by reference to whatever dispatches
/// pipelines; there is no process-global instance.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Pipeline>,
}

impl PipelineRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pipeline.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyRegistered` if the name is taken.
    pub fn register(&mut self, pipeline: Pipeline) -> Result<(), RegistryError> {
        let name = pipeline.name().to_string();
        if self.pipelines.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        debug!(pipeline = %name, stages = ?pipeline.stage_names(), "Registered pipeline");
        self.pipelines.insert(name, pipeline);
        Ok(())
    }

    /// Gets a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for unknown names.
    pub fn get(&self, name: &str) -> Result<&Pipeline, RegistryError> {
        self.pipelines.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
            available: self.list(),
        })
    }

    /// Returns true if a pipeline with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Lists registered pipeline names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Dispatches a named pipeline/stage pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline or the stage is unknown.
    pub async fn execute(
        &self,
        pipeline: &str,
        stage: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<StageResult, CardflowError> {
        let pipeline = self.get(pipeline)?;
        Ok(pipeline.execute_stage(stage, ctx).await?)
    }
}
