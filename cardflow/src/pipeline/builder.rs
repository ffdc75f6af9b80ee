//! Pipeline builder with validation.

use super::Pipeline;
use crate::errors::PipelineError;
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Stages keep insertion order. A stage may only declare dependencies on
/// stages added before it, which also rules out cycles.
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// One-line description.
    description: String,
    /// The stages in insertion order.
    stages: Vec<Arc<dyn Stage>>,
    /// Names seen so far.
    names: HashSet<String>,
    /// Sink for lifecycle events.
    event_sink: Arc<dyn EventSink>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            stages: Vec::new(),
            names: HashSet::new(),
            event_sink: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a dependency is unknown.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, PipelineError> {
        let name = stage.name().to_string();

        if self.names.contains(&name) {
            return Err(PipelineError::DuplicateStage {
                pipeline: self.name.clone(),
                stage: name,
            });
        }

        if let Some(dependency) = stage
            .dependencies()
            .into_iter()
            .find(|dep| !self.names.contains(dep))
        {
            return Err(PipelineError::UnknownDependency {
                stage: name,
                dependency,
            });
        }

        self.names.insert(name);
        self.stages.push(stage);
        Ok(self)
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty(self.name));
        }

        Ok(Pipeline::new(
            self.name,
            self.description,
            self.stages,
            self.event_sink,
        ))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
