//! The media generation orchestrator.
//!
//! A run validates the vocabulary, takes the run lock, plans what is missing,
//! enforces the new-item cap, calls the providers one item at a time, records
//! image provenance and finally re-audits the requested cards. Conditions that
//! make the run unsafe to start are returned as [`MediaError`]; everything
//! after that is reported through [`MediaRunReport`].

use super::auditor::{is_present, LocalMediaAuditor, MediaAuditor};
use super::lock::RunLock;
use super::plan::{Families, GenerationPlan};
use super::provenance::{prompt_hash, ProvenanceIndex, ProvenanceRecord};
use super::providers::{AudioDownloader, ImageGenerator};
use super::vocabulary::{
    word_from_audio_filename, Card, StructuralValidator, VocabularyStore, VocabularyValidator,
};
use crate::core::{StageResult, StageStatus};
use crate::errors::MediaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default cap on images plus audio files created by one run.
pub const DEFAULT_MAX_NEW_ITEMS: usize = 50;

/// Default estimated cost of one generated image.
pub const DEFAULT_PER_IMAGE_COST: f64 = 0.04;

/// Settings for a media run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaOptions {
    /// Directory holding the media files.
    pub media_dir: PathBuf,
    /// Provenance index location.
    pub provenance_path: PathBuf,
    /// Run lock location.
    pub lock_path: PathBuf,
    /// Maximum images plus audio files a run may create.
    pub max_new_items: usize,
    /// Estimated cost of one image.
    pub per_image_cost: f64,
    /// Plan and report without side effects.
    pub dry_run: bool,
    /// Regenerate images whose provenance drifted.
    pub force_regenerate: bool,
    /// Leave images out of the run.
    pub skip_images: bool,
    /// Leave audio out of the run.
    pub skip_audio: bool,
}

impl MediaOptions {
    /// Creates options for `media_dir` with the index and lock stored inside it.
    #[must_use]
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        let media_dir = media_dir.into();
        Self {
            provenance_path: media_dir.join(".provenance.json"),
            lock_path: media_dir.join(".cardflow.lock"),
            media_dir,
            max_new_items: DEFAULT_MAX_NEW_ITEMS,
            per_image_cost: DEFAULT_PER_IMAGE_COST,
            dry_run: false,
            force_regenerate: false,
            skip_images: false,
            skip_audio: false,
        }
    }

    /// Sets the new-item cap.
    #[must_use]
    pub fn max_new_items(mut self, cap: usize) -> Self {
        self.max_new_items = cap;
        self
    }

    /// Sets dry-run mode.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets forced regeneration of drifted images.
    #[must_use]
    pub fn force_regenerate(mut self, force: bool) -> Self {
        self.force_regenerate = force;
        self
    }

    /// Sets whether images are skipped.
    #[must_use]
    pub fn skip_images(mut self, skip: bool) -> Self {
        self.skip_images = skip;
        self
    }

    /// Sets whether audio is skipped.
    #[must_use]
    pub fn skip_audio(mut self, skip: bool) -> Self {
        self.skip_audio = skip;
        self
    }

    /// Returns the families in scope.
    #[must_use]
    pub fn families(&self) -> Families {
        Families {
            images: !self.skip_images,
            audio: !self.skip_audio,
        }
    }
}

/// Per-family item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyCounts {
    /// Items the plan targeted.
    pub planned: usize,
    /// Items the provider produced.
    pub generated: usize,
    /// Items deliberately not attempted.
    pub skipped: usize,
    /// Items attempted without success.
    pub failed: usize,
}

/// Outcome of a media run that got past the fatal checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Overall outcome.
    pub status: StageStatus,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// The plan the run executed.
    pub plan: GenerationPlan,
    /// Image counts.
    pub images: FamilyCounts,
    /// Audio counts.
    pub audio: FamilyCounts,
    /// Estimated image cost.
    pub estimated_cost: f64,
    /// Non-fatal notices.
    pub warnings: Vec<String>,
    /// Per-item failures.
    pub errors: Vec<String>,
    /// Artifacts still absent after the run.
    pub still_missing: Vec<String>,
}

impl MediaRunReport {
    /// Items generated across both families.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.images.generated + self.audio.generated
    }

    /// Items failed across both families.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.images.failed + self.audio.failed
    }

    /// Whether the invoking process should exit successfully.
    #[must_use]
    pub fn exit_ok(&self) -> bool {
        match self.status {
            StageStatus::Success => true,
            StageStatus::Partial => self.still_missing.is_empty(),
            StageStatus::Failure | StageStatus::Skipped => false,
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let prefix = if self.dry_run { "dry run: " } else { "" };
        format!(
            "{prefix}images {}/{} generated ({} skipped, {} failed), audio {}/{} generated ({} skipped, {} failed), {} still missing",
            self.images.generated,
            self.images.planned,
            self.images.skipped,
            self.images.failed,
            self.audio.generated,
            self.audio.planned,
            self.audio.skipped,
            self.audio.failed,
            self.still_missing.len(),
        )
    }

    /// Converts the report into a stage result carrying it as `media_report`.
    #[must_use]
    pub fn to_stage_result(&self) -> StageResult {
        let report = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        let result = match self.status {
            StageStatus::Success => StageResult::success(self.summary()),
            StageStatus::Partial => StageResult::partial(
                self.summary(),
                self.generated(),
                self.failed(),
                self.errors.clone(),
            ),
            StageStatus::Failure => {
                let mut errors = self.errors.clone();
                errors.extend(
                    self.still_missing
                        .iter()
                        .map(|file| format!("still missing: {file}")),
                );
                StageResult::failure(self.summary(), errors)
            }
            StageStatus::Skipped => StageResult::skipped(self.summary()),
        };
        result.add_data("media_report", report)
    }
}

/// Coordinates one media run against its collaborators.
pub struct MediaOrchestrator {
    options: MediaOptions,
    store: Arc<dyn VocabularyStore>,
    validator: Arc<dyn VocabularyValidator>,
    auditor: Arc<dyn MediaAuditor>,
    image_generator: Option<Arc<dyn ImageGenerator>>,
    audio_downloader: Option<Arc<dyn AudioDownloader>>,
}

impl MediaOrchestrator {
    /// Creates an orchestrator with the structural validator, the local
    /// auditor and no providers.
    #[must_use]
    pub fn new(options: MediaOptions, store: Arc<dyn VocabularyStore>) -> Self {
        let auditor = Arc::new(LocalMediaAuditor::new(
            Arc::clone(&store),
            options.media_dir.clone(),
        ));
        Self {
            options,
            store,
            validator: Arc::new(StructuralValidator),
            auditor,
            image_generator: None,
            audio_downloader: None,
        }
    }

    /// Replaces the vocabulary validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn VocabularyValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Replaces the media auditor.
    #[must_use]
    pub fn with_auditor(mut self, auditor: Arc<dyn MediaAuditor>) -> Self {
        self.auditor = auditor;
        self
    }

    /// Sets the image provider.
    #[must_use]
    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.image_generator = Some(generator);
        self
    }

    /// Sets the audio provider.
    #[must_use]
    pub fn with_audio_downloader(mut self, downloader: Arc<dyn AudioDownloader>) -> Self {
        self.audio_downloader = Some(downloader);
        self
    }

    /// Returns the run options.
    #[must_use]
    pub fn options(&self) -> &MediaOptions {
        &self.options
    }

    /// Runs the orchestrator for `card_ids` under a fresh run id.
    ///
    /// # Errors
    ///
    /// See [`MediaOrchestrator::run_as`].
    pub async fn run(&self, card_ids: &[String]) -> Result<MediaRunReport, MediaError> {
        self.run_as(Uuid::new_v4(), card_ids).await
    }

    /// Runs the orchestrator for `card_ids` under `run_id`.
    ///
    /// # Errors
    ///
    /// Returns a `MediaError` when the vocabulary fails validation, another
    /// run holds the lock, the plan exceeds the cap, or the vocabulary, audit
    /// or provenance index cannot be read.
    pub async fn run_as(
        &self,
        run_id: Uuid,
        card_ids: &[String],
    ) -> Result<MediaRunReport, MediaError> {
        let opts = &self.options;

        let cards = self
            .store
            .load()
            .map_err(|e| MediaError::VocabularyLoad(format!("{e:#}")))?;
        let requested = self.validate(&cards, card_ids)?;

        let lock = if opts.dry_run {
            None
        } else {
            Some(RunLock::acquire(&opts.lock_path, run_id)?)
        };

        let audited = self
            .auditor
            .compute_missing()
            .map_err(|e| MediaError::Audit(format!("{e:#}")))?;
        let index = ProvenanceIndex::load(&opts.provenance_path)?;
        let owners = image_owners(&cards);

        let present = |name: &str| is_present(&opts.media_dir.join(name));
        let plan = GenerationPlan::compute(requested.iter().copied(), &audited, opts.families(), present);
        let (stale, drifted): (BTreeSet<String>, BTreeSet<String>) =
            drifted_images(&plan, &owners, &index)
                .into_iter()
                .partition(|file| present(file.as_str()));
        let plan = plan.with_stale_images(stale).with_drifted_images(drifted);

        let new_items = plan.effective_item_count(opts.force_regenerate);
        info!(
            run_id = %run_id,
            cards = plan.card_ids.len(),
            images = plan.images_to_generate.len(),
            audio = plan.audio_to_generate.len(),
            stale = plan.stale_images.len(),
            drifted = plan.drifted_images.len(),
            dry_run = opts.dry_run,
            "Media plan computed"
        );

        if !opts.dry_run && new_items > opts.max_new_items {
            return Err(MediaError::CapExceeded {
                requested: new_items,
                cap: opts.max_new_items,
            });
        }

        let image_count = plan.effective_image_count(opts.force_regenerate);
        #[allow(clippy::cast_precision_loss)]
        let estimated_cost = opts.per_image_cost * image_count as f64;
        info!(images = image_count, estimated_cost, "Estimated image cost");

        let mut run = RunState::new(run_id, opts.dry_run, plan, estimated_cost);
        let mut index = index;

        self.generate_images(&mut run, &owners, &mut index).await;
        self.generate_audio(&mut run).await;

        let mut provenance_failed = false;
        if !opts.dry_run {
            if let Err(e) = index.save(&opts.provenance_path) {
                warn!(error = %e, "Failed to persist provenance index");
                run.report.errors.push(e.to_string());
                provenance_failed = true;
            }
        }

        run.report.still_missing = self.post_validate(&run.report.plan, present);
        for file in run.report.still_missing.iter().filter(|f| run.reported.contains(*f)) {
            warn!(file = %file, "Provider reported success but the file is missing");
            run.report.warnings.push(format!(
                "'{file}' was reported as generated but is missing after the run"
            ));
        }
        run.report.status = decide_status(&run.report, provenance_failed);

        if let Some(lock) = lock {
            lock.release();
        }

        info!(
            run_id = %run_id,
            status = %run.report.status,
            generated = run.report.generated(),
            failed = run.report.failed(),
            still_missing = run.report.still_missing.len(),
            "Media run finished"
        );
        Ok(run.report)
    }

    fn validate<'a>(
        &self,
        cards: &'a [Card],
        card_ids: &[String],
    ) -> Result<Vec<&'a Card>, MediaError> {
        let mut errors = self.validator.validate(cards);

        if card_ids.is_empty() {
            errors.push("no card ids requested".to_string());
        }

        let by_id: HashMap<&str, &Card> = cards.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut seen = HashSet::new();
        let mut requested = Vec::new();
        for id in card_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match by_id.get(id.as_str()) {
                Some(card) => requested.push(*card),
                None => errors.push(format!("unknown card id '{id}'")),
            }
        }

        if errors.is_empty() {
            Ok(requested)
        } else {
            Err(MediaError::validation(errors))
        }
    }

    async fn generate_images(
        &self,
        run: &mut RunState,
        owners: &HashMap<&str, &Card>,
        index: &mut ProvenanceIndex,
    ) {
        let opts = &self.options;
        let plan = &run.report.plan;

        let mut targets: BTreeSet<String> = plan.images_to_generate.clone();
        for file in &plan.stale_images {
            if opts.force_regenerate {
                targets.insert(file.clone());
            } else {
                run.report.images.skipped += 1;
                run.report.warnings.push(format!(
                    "image '{file}' was generated from a different prompt; kept (force regeneration to replace it)"
                ));
            }
        }
        if !opts.force_regenerate {
            for file in &plan.drifted_images {
                debug!(file = %file, "Provenance drift on missing image");
                targets.remove(file);
                run.report.images.skipped += 1;
                run.report.warnings.push(format!(
                    "image '{file}' is recorded with a different prompt; not regenerated (force regeneration to replace it)"
                ));
            }
        }
        run.report.images.planned = targets.len();

        if targets.is_empty() || opts.dry_run {
            return;
        }
        let Some(generator) = self.image_generator.as_ref() else {
            run.report.images.skipped += targets.len();
            run.report.warnings.push(format!(
                "no image provider configured; {} image(s) skipped",
                targets.len()
            ));
            return;
        };

        for file in targets {
            let Some((card, prompt)) = owners
                .get(file.as_str())
                .and_then(|card| card.prompt.as_deref().map(|p| (*card, p)))
            else {
                run.report.images.failed += 1;
                run.report
                    .errors
                    .push(format!("image '{file}': no card with a prompt references it"));
                continue;
            };

            let hash = prompt_hash(&card.word, prompt);
            let target = opts.media_dir.join(&file);
            debug!(file = %file, word = %card.word, provider = generator.name(), "Generating image");
            match generator.generate(prompt, &target).await {
                Ok(()) => {
                    index.insert(
                        file.clone(),
                        ProvenanceRecord::new(card.word.clone(), hash, generator.name()),
                    );
                    run.report.images.generated += 1;
                    run.reported.insert(file.clone());
                    info!(file = %file, word = %card.word, provider = generator.name(), "Image generated");
                }
                Err(e) => {
                    warn!(file = %file, error = %e, "Image generation failed");
                    run.report.images.failed += 1;
                    run.report.errors.push(format!("image '{file}': {e}"));
                }
            }
        }
    }

    async fn generate_audio(&self, run: &mut RunState) {
        let opts = &self.options;
        let targets = run.report.plan.audio_to_generate.clone();
        run.report.audio.planned = targets.len();

        if targets.is_empty() || opts.dry_run {
            return;
        }
        let Some(downloader) = self.audio_downloader.as_ref() else {
            run.report.audio.skipped += targets.len();
            run.report.warnings.push(format!(
                "no audio provider configured; {} audio file(s) skipped",
                targets.len()
            ));
            return;
        };

        for file in targets {
            let Some(word) = word_from_audio_filename(&file) else {
                run.report.audio.failed += 1;
                run.report
                    .errors
                    .push(format!("audio '{file}': cannot derive a word from the filename"));
                continue;
            };

            let target = opts.media_dir.join(&file);
            debug!(file = %file, word = %word, provider = downloader.name(), "Downloading pronunciation");
            match downloader.download_pronunciation(&word, &target).await {
                Ok(()) => {
                    run.report.audio.generated += 1;
                    run.reported.insert(file.clone());
                    info!(file = %file, word = %word, provider = downloader.name(), "Audio downloaded");
                }
                Err(e) => {
                    warn!(file = %file, word = %word, error = %e, "Audio download failed");
                    run.report.audio.failed += 1;
                    run.report.errors.push(format!("audio '{file}': {e}"));
                }
            }
        }
    }

    fn post_validate(&self, plan: &GenerationPlan, present: impl Fn(&str) -> bool) -> Vec<String> {
        let mut required = plan.required_images();
        required.extend(plan.required_audio());
        let missing: Vec<String> = required.into_iter().filter(|f| !present(f)).collect();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Media still missing after run");
        }
        missing
    }
}

impl std::fmt::Debug for MediaOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaOrchestrator")
            .field("options", &self.options)
            .field(
                "image_generator",
                &self.image_generator.as_ref().map(|g| g.name().to_string()),
            )
            .field(
                "audio_downloader",
                &self.audio_downloader.as_ref().map(|d| d.name().to_string()),
            )
            .finish_non_exhaustive()
    }
}

struct RunState {
    report: MediaRunReport,
    /// Files a provider reported as written.
    reported: BTreeSet<String>,
}

impl RunState {
    fn new(run_id: Uuid, dry_run: bool, plan: GenerationPlan, estimated_cost: f64) -> Self {
        Self {
            report: MediaRunReport {
                run_id,
                status: StageStatus::Success,
                dry_run,
                plan,
                images: FamilyCounts::default(),
                audio: FamilyCounts::default(),
                estimated_cost,
                warnings: Vec::new(),
                errors: Vec::new(),
                still_missing: Vec::new(),
            },
            reported: BTreeSet::new(),
        }
    }
}

/// Maps each image filename to the first card referencing it.
fn image_owners(cards: &[Card]) -> HashMap<&str, &Card> {
    let mut owners = HashMap::new();
    for card in cards {
        if let Some(image) = card.image_file() {
            owners.entry(image).or_insert(card);
        }
    }
    owners
}

/// Required images whose recorded provenance no longer matches their card.
fn drifted_images(
    plan: &GenerationPlan,
    owners: &HashMap<&str, &Card>,
    index: &ProvenanceIndex,
) -> BTreeSet<String> {
    plan.required_images()
        .into_iter()
        .filter(|file| {
            owners
                .get(file.as_str())
                .and_then(|card| card.prompt.as_deref().map(|p| prompt_hash(&card.word, p)))
                .is_some_and(|hash| index.drifted(file, &hash).is_some())
        })
        .collect()
}

fn decide_status(report: &MediaRunReport, provenance_failed: bool) -> StageStatus {
    if report.dry_run {
        return StageStatus::Success;
    }
    if provenance_failed {
        return StageStatus::Failure;
    }
    if report.failed() > 0 {
        return if report.generated() == 0 {
            StageStatus::Failure
        } else {
            StageStatus::Partial
        };
    }
    if report.still_missing.is_empty() {
        StageStatus::Success
    } else {
        StageStatus::Failure
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
