//! The built-in `vocabulary` pipeline.

use super::{Pipeline, PipelineBuilder};
use crate::errors::PipelineError;
use crate::media::{CardSyncer, MediaOrchestrator, VocabularyStore};
use crate::stages::{MediaStage, SyncStage, ValidateStage};
use std::sync::Arc;

/// Name the vocabulary pipeline is registered under.
pub const VOCABULARY_PIPELINE: &str = "vocabulary";

/// Builds `validate` → `media` → `sync` over shared collaborators.
///
/// # Errors
///
/// Returns a `PipelineError` if the stage catalogue is inconsistent.
pub fn vocabulary_pipeline(
    store: Arc<dyn VocabularyStore>,
    orchestrator: Arc<MediaOrchestrator>,
    syncer: Option<Arc<dyn CardSyncer>>,
) -> Result<Pipeline, PipelineError> {
    let media_dir = orchestrator.options().media_dir.clone();

    PipelineBuilder::new(VOCABULARY_PIPELINE)
        .description("Validate cards, generate their media and sync them to the note store")
        .stage(Arc::new(ValidateStage::new(Arc::clone(&store))))?
        .stage(Arc::new(MediaStage::new(orchestrator)))?
        .stage(Arc::new(SyncStage::new(store, syncer, media_dir)))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::core::StageStatus;
    use crate::pipeline::PipelineRegistry;
    use crate::testing::{MediaFixture, MockAudioDownloader, MockCardSyncer, MockImageGenerator};

    #[tokio::test]
    async fn test_vocabulary_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = MediaFixture::new(dir.path());
        let orchestrator = MediaOrchestrator::new(fixture.options(), fixture.store.clone())
            .with_image_generator(Arc::new(MockImageGenerator::new()))
            .with_audio_downloader(Arc::new(MockAudioDownloader::new()));
        let syncer = Arc::new(MockCardSyncer::new());

        let mut registry = PipelineRegistry::new();
        registry
            .register(
                vocabulary_pipeline(
                    fixture.store.clone(),
                    Arc::new(orchestrator),
                    Some(syncer.clone()),
                )
                .unwrap(),
            )
            .unwrap();

        let pipeline = registry.get(VOCABULARY_PIPELINE).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["validate", "media", "sync"]);

        let mut ctx = ExecutionContext::new(VOCABULARY_PIPELINE, dir.path());
        ctx.set("card_ids", serde_json::json!(["sol_1"]));

        for stage in ["validate", "media", "sync"] {
            let result = registry.execute(VOCABULARY_PIPELINE, stage, &mut ctx).await.unwrap();
            assert_eq!(result.status, StageStatus::Success, "stage {stage}");
        }

        assert_eq!(ctx.completed_stages(), ["validate", "media", "sync"]);
        assert_eq!(syncer.synced(), vec!["sol_1".to_string()]);
        assert!(fixture.has_media("sol_meaning1.png"));
    }

    #[tokio::test]
    async fn test_sync_skipped_without_syncer() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = MediaFixture::new(dir.path());
        let orchestrator = MediaOrchestrator::new(fixture.options(), fixture.store.clone());
        let pipeline =
            vocabulary_pipeline(fixture.store.clone(), Arc::new(orchestrator), None).unwrap();
        let mut ctx = ExecutionContext::new(VOCABULARY_PIPELINE, dir.path());

        let result = pipeline.execute_stage("sync", &mut ctx).await.unwrap();

        assert!(result.is_skipped());
        assert!(!ctx.is_stage_complete("sync"));
    }
}
