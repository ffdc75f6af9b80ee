//! Vocabulary validation stage.

use super::Stage;
use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::media::{StructuralValidator, VocabularyStore, VocabularyValidator};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

/// Loads the vocabulary and runs the structural checks.
///
/// Stores `card_count` in the context on success.
pub struct ValidateStage {
    store: Arc<dyn VocabularyStore>,
    validator: Arc<dyn VocabularyValidator>,
}

impl ValidateStage {
    /// Creates the stage with the structural validator.
    #[must_use]
    pub fn new(store: Arc<dyn VocabularyStore>) -> Self {
        Self {
            store,
            validator: Arc::new(StructuralValidator),
        }
    }

    /// Replaces the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn VocabularyValidator>) -> Self {
        self.validator = validator;
        self
    }
}

impl std::fmt::Debug for ValidateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ValidateStage {
    fn name(&self) -> &str {
        "validate"
    }

    fn description(&self) -> &str {
        "Load the vocabulary and check its structure"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> anyhow::Result<StageResult> {
        let cards = self.store.load().context("loading vocabulary")?;
        let errors = self.validator.validate(&cards);

        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "Vocabulary validation failed");
            return Ok(StageResult::failure(
                format!("{} vocabulary problem(s) found", errors.len()),
                errors,
            ));
        }

        ctx.set("card_count", serde_json::json!(cards.len()));
        Ok(StageResult::success(format!("{} cards valid", cards.len()))
            .add_data("card_count", serde_json::json!(cards.len())))
    }
}
