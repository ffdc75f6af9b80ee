//! Note-store sync stage.

use super::Stage;
use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::media::{CardSyncer, VocabularyStore};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Pushes cards to the spaced-repetition note store.
///
/// Syncs the context's `card_ids` when set, otherwise the whole deck. Without
/// a configured syncer the stage is skipped.
pub struct SyncStage {
    store: Arc<dyn VocabularyStore>,
    syncer: Option<Arc<dyn CardSyncer>>,
    media_dir: PathBuf,
}

impl SyncStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        store: Arc<dyn VocabularyStore>,
        syncer: Option<Arc<dyn CardSyncer>>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            syncer,
            media_dir: media_dir.into(),
        }
    }
}

impl std::fmt::Debug for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStage")
            .field("syncer", &self.syncer.as_ref().map(|s| s.name().to_string()))
            .field("media_dir", &self.media_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for SyncStage {
    fn name(&self) -> &str {
        "sync"
    }

    fn description(&self) -> &str {
        "Create or update notes in the spaced-repetition app"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["media".to_string()]
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> anyhow::Result<StageResult> {
        let Some(syncer) = self.syncer.as_ref() else {
            return Ok(StageResult::skipped("no note-store syncer configured"));
        };

        let mut cards = self.store.load().context("loading vocabulary")?;
        if let Some(ids) = ctx.get_as::<Vec<String>>("card_ids") {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            cards.retain(|card| wanted.contains(card.id.as_str()));
        }
        if cards.is_empty() {
            return Ok(StageResult::skipped("no cards to sync"));
        }

        let summary = syncer.sync(&cards, &self.media_dir).await?;
        tracing::info!(
            provider = syncer.name(),
            created = summary.created,
            updated = summary.updated,
            errors = summary.errors.len(),
            "Cards synced"
        );
        ctx.set("sync_summary", serde_json::to_value(&summary)?);

        let message = format!(
            "{} of {} cards synced ({} created, {} updated)",
            summary.synced(),
            cards.len(),
            summary.created,
            summary.updated
        );
        let data = serde_json::to_value(&summary)?;

        Ok(match (summary.synced(), summary.errors.len()) {
            (_, 0) => StageResult::success(message),
            (0, _) => StageResult::failure(message, summary.errors),
            (synced, failed) => StageResult::partial(message, synced, failed, summary.errors),
        }
        .add_data("sync_summary", data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::testing::{sample_cards, InMemoryVocabularyStore, MockCardSyncer};

    fn store() -> Arc<InMemoryVocabularyStore> {
        Arc::new(InMemoryVocabularyStore::new(sample_cards()))
    }

    #[tokio::test]
    async fn test_skipped_without_syncer() {
        let stage = SyncStage::new(store(), None, "media");
        let mut ctx = ExecutionContext::new("vocabulary", ".");

        let result = stage.execute(&mut ctx).await.unwrap();
        assert!(result.is_skipped());
    }

    #[tokio::test]
    async fn test_syncs_requested_cards() {
        let syncer = Arc::new(MockCardSyncer::new());
        let stage = SyncStage::new(store(), Some(syncer.clone()), "media");
        let mut ctx = ExecutionContext::new("vocabulary", ".");
        ctx.set("card_ids", serde_json::json!(["luna_1"]));

        let result = stage.execute(&mut ctx).await.unwrap();

        assert!(result.is_success());
        assert_eq!(syncer.synced(), vec!["luna_1".to_string()]);
        assert_eq!(
            ctx.get("sync_summary", serde_json::Value::Null)["created"],
            serde_json::json!(1)
        );
    }

    #[tokio::test]
    async fn test_rejected_card_makes_partial() {
        let syncer = Arc::new(MockCardSyncer::new().reject("sol_1"));
        let stage = SyncStage::new(store(), Some(syncer), "media");
        let mut ctx = ExecutionContext::new("vocabulary", ".");

        let result = stage.execute(&mut ctx).await.unwrap();

        assert_eq!(result.status, StageStatus::Partial);
        assert_eq!(result.errors, vec!["sol_1: rejected by note store".to_string()]);
    }

    #[tokio::test]
    async fn test_syncer_error_propagates() {
        let syncer = Arc::new(MockCardSyncer::new().failing("note store offline"));
        let stage = SyncStage::new(store(), Some(syncer), "media");
        let mut ctx = ExecutionContext::new("vocabulary", ".");

        let err = stage.execute(&mut ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "note store offline");
    }
}
