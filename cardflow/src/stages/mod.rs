//! Stage trait and implementations.
//!
//! Stages are the units of work a pipeline catalogues. A stage reports every
//! condition it can anticipate through its [`StageResult`]; an `Err` (or a
//! panic) is an unanticipated fault that the pipeline turns into a failure.

mod media;
mod sync;
mod validate;

pub use media::MediaStage;
pub use sync::SyncStage;
pub use validate::ValidateStage;

use crate::context::ExecutionContext;
use crate::core::StageResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns a one-line description.
    fn description(&self) -> &str {
        ""
    }

    /// Names of stages expected to run first.
    ///
    /// Advisory only: the pipeline reports them but never enforces them.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Checks that the context holds what the stage needs.
    ///
    /// Any returned message stops the stage before its body runs.
    fn validate_context(&self, _ctx: &ExecutionContext) -> Vec<String> {
        Vec::new()
    }

    /// Executes the stage.
    async fn execute(&self, ctx: &mut ExecutionContext) -> anyhow::Result<StageResult>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<StageResult> + Send + Sync,
{
    name: String,
    required_keys: Vec<String>,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<StageResult> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            required_keys: Vec::new(),
            func,
        }
    }

    /// Requires a context key to be present before the function runs.
    #[must_use]
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<StageResult> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("required_keys", &self.required_keys)
            .finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut ExecutionContext) -> anyhow::Result<StageResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_context(&self, ctx: &ExecutionContext) -> Vec<String> {
        missing_keys(ctx, &self.required_keys)
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> anyhow::Result<StageResult> {
        (self.func)(ctx)
    }
}

/// Returns one message per required key absent from the context.
pub(crate) fn missing_keys(ctx: &ExecutionContext, keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter(|key| !ctx.contains(key))
        .map(|key| format!("missing required context key '{key}'"))
        .collect()
}
