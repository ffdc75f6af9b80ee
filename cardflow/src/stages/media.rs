//! Media generation stage.

use super::{missing_keys, Stage};
use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::media::MediaOrchestrator;
use async_trait::async_trait;
use std::sync::Arc;

const CARD_IDS: &str = "card_ids";

/// Runs the media orchestrator for the context's `card_ids`.
///
/// The run report is stored under `media_report`. Fatal orchestrator errors
/// become a failure carrying the error details.
#[derive(Debug)]
pub struct MediaStage {
    orchestrator: Arc<MediaOrchestrator>,
    required: Vec<String>,
}

impl MediaStage {
    /// Creates the stage around `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: Arc<MediaOrchestrator>) -> Self {
        Self {
            orchestrator,
            required: vec![CARD_IDS.to_string()],
        }
    }
}

#[async_trait]
impl Stage for MediaStage {
    fn name(&self) -> &str {
        "media"
    }

    fn description(&self) -> &str {
        "Generate missing images and pronunciations"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["validate".to_string()]
    }

    fn validate_context(&self, ctx: &ExecutionContext) -> Vec<String> {
        let mut errors = missing_keys(ctx, &self.required);
        if errors.is_empty() && ctx.get_as::<Vec<String>>(CARD_IDS).is_none() {
            errors.push(format!("context key '{CARD_IDS}' must be a list of card ids"));
        }
        errors
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> anyhow::Result<StageResult> {
        let card_ids: Vec<String> = ctx.get_as(CARD_IDS).unwrap_or_default();

        match self.orchestrator.run_as(ctx.run_id(), &card_ids).await {
            Ok(report) => {
                let result = report.to_stage_result();
                ctx.set("media_report", serde_json::to_value(&report)?);
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "Media run aborted");
                Ok(StageResult::failure(e.to_string(), Vec::new()).with_data(e.to_dict()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::testing::{MediaFixture, MockAudioDownloader, MockImageGenerator};

    fn stage_for(fixture: &MediaFixture, cap: usize) -> MediaStage {
        let orchestrator = MediaOrchestrator::new(
            fixture.options().max_new_items(cap),
            fixture.store.clone(),
        )
        .with_image_generator(Arc::new(MockImageGenerator::new()))
        .with_audio_downloader(Arc::new(MockAudioDownloader::new()));
        MediaStage::new(Arc::new(orchestrator))
    }

    #[test]
    fn test_requires_card_id_list() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage_for(&MediaFixture::new(dir.path()), 50);
        let mut ctx = ExecutionContext::new("vocabulary", dir.path());

        assert_eq!(
            stage.validate_context(&ctx),
            vec!["missing required context key 'card_ids'".to_string()]
        );

        ctx.set("card_ids", serde_json::json!("sol_1"));
        assert_eq!(stage.validate_context(&ctx).len(), 1);

        ctx.set("card_ids", serde_json::json!(["sol_1"]));
        assert!(stage.validate_context(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_report_stored_in_context() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = MediaFixture::new(dir.path());
        let stage = stage_for(&fixture, 50);
        let mut ctx = ExecutionContext::new("vocabulary", dir.path());
        ctx.set("card_ids", serde_json::json!(["sol_1", "luna_1"]));

        let result = stage.execute(&mut ctx).await.unwrap();

        assert_eq!(result.status, StageStatus::Success);
        let report = ctx.get("media_report", serde_json::Value::Null);
        assert_eq!(report["images"]["generated"], serde_json::json!(2));
        assert_eq!(report["run_id"], serde_json::json!(ctx.run_id()));
    }

    #[tokio::test]
    async fn test_cap_exceeded_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = MediaFixture::new(dir.path());
        let stage = stage_for(&fixture, 1);
        let mut ctx = ExecutionContext::new("vocabulary", dir.path());
        ctx.set("card_ids", serde_json::json!(["sol_1"]));

        let result = stage.execute(&mut ctx).await.unwrap();

        assert!(result.is_failure());
        assert_eq!(result.get("code"), Some(&serde_json::json!("cap_exceeded")));
        assert!(!ctx.contains("media_report"));
    }
}
