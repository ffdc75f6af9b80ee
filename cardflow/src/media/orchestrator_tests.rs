use super::*;
use crate::media::Card;
use crate::testing::{MediaFixture, MockAudioDownloader, MockBehavior, MockImageGenerator};
use pretty_assertions::assert_eq;

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn orchestrator(
    fixture: &MediaFixture,
    options: MediaOptions,
    images: &Arc<MockImageGenerator>,
    audio: &Arc<MockAudioDownloader>,
) -> MediaOrchestrator {
    MediaOrchestrator::new(options, fixture.store.clone())
        .with_image_generator(images.clone())
        .with_audio_downloader(audio.clone())
}

#[tokio::test]
async fn test_single_missing_image_is_generated_once() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    for file in ["sol.mp3", "luna_meaning1.png", "luna.mp3", "buenos_dias_1.mp3"] {
        fixture.write_media(file);
    }
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().max_new_items(5), &images, &audio);

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Success);
    assert_eq!(
        report.images,
        FamilyCounts {
            planned: 1,
            generated: 1,
            skipped: 0,
            failed: 0
        }
    );
    assert_eq!(report.audio.generated, 0);
    assert_eq!(images.call_count(), 1);
    assert_eq!(audio.call_count(), 0);
    assert!(fixture.has_media("sol_meaning1.png"));
    assert!(!fixture.lock_path().exists());

    let index = ProvenanceIndex::load(&fixture.provenance_path()).unwrap();
    let record = index.get("sol_meaning1.png").unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(record.word, "sol");
    assert_eq!(record.provider, "mock-images");
    assert_eq!(
        record.prompt_hash,
        prompt_hash("sol", "a bright sun over the sea")
    );
    assert!(report.exit_ok());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);
    let request = ids(&["sol_1", "luna_1", "buenos_dias_1"]);

    let first = orch.run(&request).await.unwrap();
    assert_eq!(first.status, StageStatus::Success);
    assert_eq!(first.generated(), 5);

    let index_before = std::fs::read_to_string(fixture.provenance_path()).unwrap();
    let second = orch.run(&request).await.unwrap();

    assert_eq!(second.status, StageStatus::Success);
    assert_eq!(second.generated(), 0);
    assert!(second.plan.is_empty());
    assert_eq!(images.call_count(), 2);
    assert_eq!(audio.call_count(), 3);
    assert_eq!(
        std::fs::read_to_string(fixture.provenance_path()).unwrap(),
        index_before
    );
}

#[tokio::test]
async fn test_audio_words_come_from_filenames_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().skip_images(true), &images, &audio);

    let report = orch
        .run(&ids(&["sol_1", "luna_1", "buenos_dias_1"]))
        .await
        .unwrap();

    assert_eq!(report.status, StageStatus::Success);
    assert_eq!(audio.words(), ids(&["buenos dias", "luna", "sol"]));
    assert_eq!(images.call_count(), 0);
    assert!(report.plan.images_to_generate.is_empty());
    assert!(ProvenanceIndex::load(&fixture.provenance_path())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_plan_includes_audited_missing_from_other_cards() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    fixture.write_media("sol.mp3");
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().dry_run(true), &images, &audio);

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(
        report.plan.images_to_generate,
        BTreeSet::from(["luna_meaning1.png".to_string(), "sol_meaning1.png".to_string()])
    );
    assert_eq!(
        report.plan.audio_to_generate,
        BTreeSet::from(["buenos_dias_1.mp3".to_string(), "luna.mp3".to_string()])
    );
    assert_eq!(report.plan.words, BTreeSet::from(["sol".to_string()]));
}

#[tokio::test]
async fn test_cap_exceeded_aborts_before_provider_calls() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().max_new_items(2), &images, &audio);

    let err = orch.run(&ids(&["sol_1", "luna_1"])).await.unwrap_err();

    assert!(matches!(err, MediaError::CapExceeded { requested: 5, cap: 2 }));
    assert_eq!(images.call_count(), 0);
    assert_eq!(audio.call_count(), 0);
    assert!(!fixture.lock_path().exists());
    assert!(!fixture.provenance_path().exists());
}

#[tokio::test]
async fn test_dry_run_bypasses_cap_and_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let options = fixture.options().max_new_items(1).dry_run(true);
    let orch = orchestrator(&fixture, options, &images, &audio);

    let report = orch.run(&ids(&["sol_1", "luna_1"])).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.status, StageStatus::Success);
    assert_eq!(report.images.planned, 2);
    assert_eq!(report.audio.planned, 3);
    assert_eq!(report.generated(), 0);
    assert!((report.estimated_cost - 0.08).abs() < 1e-9);
    assert_eq!(images.call_count(), 0);
    assert_eq!(audio.call_count(), 0);
    assert!(!fixture.provenance_path().exists());
}

#[tokio::test]
async fn test_dry_run_ignores_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let _held = RunLock::acquire(&fixture.lock_path(), Uuid::new_v4()).unwrap();
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().dry_run(true), &images, &audio);

    assert!(orch.run(&ids(&["sol_1"])).await.is_ok());
}

#[tokio::test]
async fn test_held_lock_blocks_run() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let held = RunLock::acquire(&fixture.lock_path(), Uuid::new_v4()).unwrap();
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);

    let err = orch.run(&ids(&["sol_1"])).await.unwrap_err();

    assert_eq!(err.code(), "run_in_progress");
    assert_eq!(images.call_count(), 0);
    assert!(fixture.lock_path().exists());

    held.release();
    let report = orch.run(&ids(&["sol_1"])).await.unwrap();
    assert_eq!(report.status, StageStatus::Success);
}

#[tokio::test]
async fn test_unknown_card_id_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);

    let err = orch.run(&ids(&["sol_1", "mar_1"])).await.unwrap_err();

    match err {
        MediaError::ValidationFailed { errors } => {
            assert_eq!(errors, vec!["unknown card id 'mar_1'".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fixture.lock_path().exists());
}

#[tokio::test]
async fn test_empty_request_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let orch = MediaOrchestrator::new(fixture.options(), fixture.store.clone());

    let err = orch.run(&[]).await.unwrap_err();
    assert_eq!(err.code(), "validation_failed");
}

#[tokio::test]
async fn test_invalid_vocabulary_blocks_run() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path()).with_cards(vec![
        Card::new("sol_1", "sol").with_image("sol_meaning1.png", "a bright sun"),
        Card::new("sol_1", "sol"),
    ]);
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);

    let err = orch.run(&ids(&["sol_1"])).await.unwrap_err();

    assert_eq!(err.code(), "validation_failed");
    assert_eq!(images.call_count(), 0);
}

#[tokio::test]
async fn test_silent_provider_failure_caught_by_post_validation() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    fixture.write_media("sol.mp3");
    let images = Arc::new(MockImageGenerator::silent());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().skip_audio(true), &images, &audio);

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Failure);
    assert_eq!(report.images.generated, 2);
    assert_eq!(report.still_missing, ids(&["luna_meaning1.png", "sol_meaning1.png"]));
    assert!(!report.exit_ok());
}

#[tokio::test]
async fn test_silent_success_named_when_other_items_fail() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::silent());
    let audio = Arc::new(MockAudioDownloader::new().unknown("luna"));
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);

    let report = orch.run(&ids(&["sol_1", "luna_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Partial);
    assert_eq!(report.audio.failed, 1);
    assert_eq!(
        report.still_missing,
        ids(&["luna.mp3", "luna_meaning1.png", "sol_meaning1.png"])
    );
    let silent: Vec<&String> = report
        .warnings
        .iter()
        .filter(|w| w.contains("reported as generated"))
        .collect();
    assert_eq!(silent.len(), 2);
    assert!(silent[0].contains("luna_meaning1.png"));
    assert!(silent[1].contains("sol_meaning1.png"));
    assert!(!report.exit_ok());
}

#[tokio::test]
async fn test_some_failures_make_partial() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new().fail_on("luna_meaning1.png"));
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options().skip_audio(true), &images, &audio);

    let report = orch.run(&ids(&["sol_1", "luna_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Partial);
    assert_eq!(report.images.generated, 1);
    assert_eq!(report.images.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("image 'luna_meaning1.png'"));
    assert_eq!(report.still_missing, ids(&["luna_meaning1.png"]));
    assert!(!report.exit_ok());

    let index = ProvenanceIndex::load(&fixture.provenance_path()).unwrap();
    assert!(index.get("sol_meaning1.png").is_some());
    assert!(index.get("luna_meaning1.png").is_none());
}

#[tokio::test]
async fn test_all_failures_make_failure() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::with_behavior(MockBehavior::Fail(
        "service unavailable".to_string(),
    )));
    let orch = orchestrator(&fixture, fixture.options().skip_images(true), &images, &audio);

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Failure);
    assert_eq!(report.audio.failed, 3);
    assert_eq!(report.generated(), 0);
}

#[tokio::test]
async fn test_missing_provider_skips_family() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    fixture.write_media("sol.mp3");
    fixture.write_media("luna.mp3");
    fixture.write_media("buenos_dias_1.mp3");
    let orch = MediaOrchestrator::new(fixture.options(), fixture.store.clone());

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.images.skipped, 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("no image provider"));
    assert_eq!(report.status, StageStatus::Failure);
}

#[tokio::test]
async fn test_missing_image_with_drifted_provenance_is_kept_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    fixture.write_media("sol.mp3");
    let mut index = ProvenanceIndex::new();
    index.insert(
        "sol_meaning1.png",
        ProvenanceRecord::new("sol", prompt_hash("sol", "an old prompt"), "mock-images"),
    );
    index.save(&fixture.provenance_path()).unwrap();

    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let options = fixture.options().skip_audio(true);
    let orch = orchestrator(&fixture, options.clone(), &images, &audio);

    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.images.skipped, 1);
    assert_eq!(report.images.generated, 1);
    assert_eq!(images.calls()[0].0, "a full moon above hills");
    assert!(report.warnings.iter().any(|w| w.contains("sol_meaning1.png")));
    assert!(report.still_missing.contains(&"sol_meaning1.png".to_string()));
    assert_eq!(report.status, StageStatus::Failure);

    let forced = orchestrator(&fixture, options.force_regenerate(true), &images, &audio);
    let report = forced.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.status, StageStatus::Success);
    assert_eq!(report.images.generated, 1);
    let index = ProvenanceIndex::load(&fixture.provenance_path()).unwrap();
    assert_eq!(
        index.get("sol_meaning1.png").unwrap().prompt_hash,
        prompt_hash("sol", "a bright sun over the sea")
    );
}

#[tokio::test]
async fn test_dry_run_reports_drifted_missing_image_like_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    let mut index = ProvenanceIndex::new();
    index.insert(
        "sol_meaning1.png",
        ProvenanceRecord::new("sol", prompt_hash("sol", "an old prompt"), "mock-images"),
    );
    index.save(&fixture.provenance_path()).unwrap();

    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let options = fixture.options().skip_audio(true).max_new_items(1);

    let dry = orchestrator(&fixture, options.clone().dry_run(true), &images, &audio)
        .run(&ids(&["sol_1", "luna_1"]))
        .await
        .unwrap();

    assert_eq!(dry.plan.drifted_images, BTreeSet::from(["sol_meaning1.png".to_string()]));
    assert_eq!(
        dry.images,
        FamilyCounts {
            planned: 1,
            generated: 0,
            skipped: 1,
            failed: 0
        }
    );
    assert!(dry.warnings.iter().any(|w| w.contains("sol_meaning1.png")));
    assert!((dry.estimated_cost - DEFAULT_PER_IMAGE_COST).abs() < f64::EPSILON);
    assert_eq!(images.call_count(), 0);

    // The drifted image does not count against a cap of one.
    let real = orchestrator(&fixture, options, &images, &audio)
        .run(&ids(&["sol_1", "luna_1"]))
        .await
        .unwrap();

    assert_eq!(real.images.planned, dry.images.planned);
    assert_eq!(real.images.skipped, dry.images.skipped);
    assert_eq!(real.images.generated, 1);
    assert_eq!(real.warnings, dry.warnings);
    assert_eq!(images.calls()[0].0, "a full moon above hills");
    assert_eq!(real.still_missing, vec!["sol_meaning1.png".to_string()]);
}

#[tokio::test]
async fn test_present_stale_image_regenerated_only_with_force() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path()).with_cards(vec![Card::new("sol_1", "sol")
        .with_image("sol_meaning1.png", "a bright sun over the sea")]);
    fixture.write_media("sol_meaning1.png");
    let mut index = ProvenanceIndex::new();
    index.insert(
        "sol_meaning1.png",
        ProvenanceRecord::new("sol", prompt_hash("sol", "an old prompt"), "mock-images"),
    );
    index.save(&fixture.provenance_path()).unwrap();

    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());

    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);
    let report = orch.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.plan.stale_images, BTreeSet::from(["sol_meaning1.png".to_string()]));
    assert_eq!(report.images.skipped, 1);
    assert_eq!(report.status, StageStatus::Success);
    assert_eq!(images.call_count(), 0);

    let capped = orchestrator(
        &fixture,
        fixture.options().force_regenerate(true).max_new_items(0),
        &images,
        &audio,
    );
    let err = capped.run(&ids(&["sol_1"])).await.unwrap_err();
    assert!(matches!(err, MediaError::CapExceeded { requested: 1, cap: 0 }));

    let forced = orchestrator(&fixture, fixture.options().force_regenerate(true), &images, &audio);
    let report = forced.run(&ids(&["sol_1"])).await.unwrap();

    assert_eq!(report.images.generated, 1);
    assert_eq!(images.call_count(), 1);
    assert_eq!(report.status, StageStatus::Success);
}

#[tokio::test]
async fn test_corrupt_provenance_is_fatal_and_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MediaFixture::new(dir.path());
    std::fs::write(fixture.provenance_path(), "not json").unwrap();
    let images = Arc::new(MockImageGenerator::new());
    let audio = Arc::new(MockAudioDownloader::new());
    let orch = orchestrator(&fixture, fixture.options(), &images, &audio);

    let err = orch.run(&ids(&["sol_1"])).await.unwrap_err();

    assert_eq!(err.code(), "provenance");
    assert!(!fixture.lock_path().exists());
}

#[test]
fn test_to_stage_result_mirrors_status() {
    let mut report = RunState::new(Uuid::nil(), false, GenerationPlan::default(), 0.0).report;
    report.images.failed = 1;
    report.images.generated = 2;
    report.errors.push("image 'a.png': timeout".to_string());
    report.status = StageStatus::Partial;

    let result = report.to_stage_result();
    assert_eq!(result.status, StageStatus::Partial);
    assert_eq!(result.errors, vec!["image 'a.png': timeout".to_string()]);
    assert!(result.get("media_report").is_some());

    report.status = StageStatus::Failure;
    report.still_missing.push("a.png".to_string());
    let result = report.to_stage_result();
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[1], "still missing: a.png");
}
