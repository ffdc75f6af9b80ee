//! Mutable execution context threaded through one pipeline run.

use super::ContextBag;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The mutable context for a pipeline run.
///
/// Created once per invocation by the entry point and lent to every stage.
/// It performs no validation: stages read what earlier stages wrote.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Run identifier.
    run_id: Uuid,
    /// Pipeline the run belongs to.
    pipeline_name: String,
    /// Root directory of the project being processed.
    project_root: PathBuf,
    /// Shared keyed values.
    data: ContextBag,
    /// Stages that completed successfully, in completion order.
    completed_stages: Vec<String>,
    /// Non-fatal errors, in the order they were reported.
    errors: Vec<String>,
    /// Snapshot of the invocation arguments.
    args: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    /// Creates a new execution context.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            project_root: project_root.into(),
            data: ContextBag::new(),
            completed_stages: Vec::new(),
            errors: Vec::new(),
            args: HashMap::new(),
        }
    }

    /// Sets the invocation argument snapshot.
    #[must_use]
    pub fn with_args(mut self, args: HashMap<String, serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Seeds the value store.
    #[must_use]
    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data.extend(data);
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Returns the project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Gets a value, falling back to `default` when absent.
    #[must_use]
    pub fn get(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    /// Gets a value and deserializes it.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.get_as(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a value, visible to every later stage of the run.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.set(key, value);
    }

    /// Records a non-fatal error.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Marks a stage as completed. Repeated calls keep a single entry.
    pub fn mark_stage_complete(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.completed_stages.contains(&name) {
            self.completed_stages.push(name);
        }
    }

    /// Returns true if the stage completed successfully in this run.
    #[must_use]
    pub fn is_stage_complete(&self, name: &str) -> bool {
        self.completed_stages.iter().any(|s| s == name)
    }

    /// Returns the completed stage names in order.
    #[must_use]
    pub fn completed_stages(&self) -> &[String] {
        &self.completed_stages
    }

    /// Returns the accumulated errors in order.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns the invocation argument snapshot.
    #[must_use]
    pub fn args(&self) -> &HashMap<String, serde_json::Value> {
        &self.args
    }

    /// Returns the value store.
    #[must_use]
    pub fn data(&self) -> &ContextBag {
        &self.data
    }
}
