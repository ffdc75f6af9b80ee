//! Pipeline: an ordered catalogue of stages for one workflow.

use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::errors::PipelineError;
use crate::events::EventSink;
use crate::stages::Stage;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Read-only description of a stage, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Stage name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Advisory dependencies.
    pub dependencies: Vec<String>,
}

/// An ordered catalogue of stages.
///
/// A pipeline executes one named stage at a time and never advances on its
/// own; callers decide what runs next.
pub struct Pipeline {
    name: String,
    description: String,
    stages: Vec<Arc<dyn Stage>>,
    event_sink: Arc<dyn EventSink>,
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        description: String,
        stages: Vec<Arc<dyn Stage>>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            description,
            stages,
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the stage names in catalogue order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Describes every stage in catalogue order.
    #[must_use]
    pub fn describe(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|s| StageInfo {
                name: s.name().to_string(),
                description: s.description().to_string(),
                dependencies: s.dependencies(),
            })
            .collect()
    }

    /// Resolves a stage by name.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::StageNotFound` for unknown names.
    pub fn get_stage(&self, name: &str) -> Result<&Arc<dyn Stage>, PipelineError> {
        self.stages
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| PipelineError::stage_not_found(&self.name, name))
    }

    /// Returns the declared dependencies of `name` that have not completed.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::StageNotFound` for unknown names.
    pub fn pending_dependencies(
        &self,
        name: &str,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, PipelineError> {
        let stage = self.get_stage(name)?;
        Ok(stage
            .dependencies()
            .into_iter()
            .filter(|dep| !ctx.is_stage_complete(dep))
            .collect())
    }

    /// Executes one stage against the context.
    ///
    /// Context validation runs first; if it reports anything the stage body
    /// is not invoked. Errors and panics raised by the body become a failure
    /// result. Only a successful stage is marked complete.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::StageNotFound` for unknown names.
    pub async fn execute_stage(
        &self,
        name: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<StageResult, PipelineError> {
        let stage = Arc::clone(self.get_stage(name)?);

        let pending = self.pending_dependencies(name, ctx)?;
        if !pending.is_empty() {
            debug!(
                pipeline = %self.name,
                stage = %name,
                pending = ?pending,
                "Running stage before its declared dependencies"
            );
        }

        self.event_sink.try_emit(
            "stage.started",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "stage": name,
                "run_id": ctx.run_id().to_string(),
            })),
        );

        let start = Instant::now();
        let validation_errors = stage.validate_context(ctx);

        let result = if validation_errors.is_empty() {
            match AssertUnwindSafe(stage.execute(ctx)).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => {
                    error!(pipeline = %self.name, stage = %name, error = %format!("{err:#}"), "Stage raised an error");
                    StageResult::failure(
                        format!("Stage '{name}' raised an error"),
                        vec![format!("{err:#}")],
                    )
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(pipeline = %self.name, stage = %name, panic = %message, "Stage panicked");
                    StageResult::failure(
                        format!("Stage '{name}' panicked"),
                        vec![message],
                    )
                }
            }
        } else {
            StageResult::failure(
                format!("Context validation failed for stage '{name}'"),
                validation_errors,
            )
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        if result.is_success() {
            ctx.mark_stage_complete(name);
        } else if result.status.has_errors() {
            for err in &result.errors {
                ctx.add_error(format!("{name}: {err}"));
            }
        }

        self.event_sink.try_emit(
            result.status.event_type(),
            Some(serde_json::json!({
                "pipeline": &self.name,
                "stage": name,
                "message": &result.message,
                "errors": &result.errors,
                "duration_ms": duration_ms,
            })),
        );

        Ok(result)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
