//! Mock stages and collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;
use crate::core::StageResult;
use crate::errors::ProviderError;
use crate::media::{AudioDownloader, Card, CardSyncer, ImageGenerator, SyncSummary, VocabularyStore};
use crate::stages::{missing_keys, Stage};

/// A stage that records calls and returns a configurable result.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    required_keys: Vec<String>,
    dependencies: Vec<String>,
    result: Mutex<StageResult>,
    call_count: Mutex<usize>,
}

impl RecordingStage {
    /// Creates a recording stage that succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_keys: Vec::new(),
            dependencies: Vec::new(),
            result: Mutex::new(StageResult::success("ok")),
            call_count: Mutex::new(0),
        }
    }

    /// Requires a context key.
    #[must_use]
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    /// Declares an advisory dependency.
    #[must_use]
    pub fn with_dependency(mut self, stage: impl Into<String>) -> Self {
        self.dependencies.push(stage.into());
        self
    }

    /// Sets the result to return.
    #[must_use]
    pub fn with_result(self, result: StageResult) -> Self {
        *self.result.lock() = result;
        self
    }

    /// Returns the number of times the stage body ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn validate_context(&self, ctx: &ExecutionContext) -> Vec<String> {
        missing_keys(ctx, &self.required_keys)
    }

    async fn execute(&self, _ctx: &mut ExecutionContext) -> anyhow::Result<StageResult> {
        *self.call_count.lock() += 1;
        Ok(self.result.lock().clone())
    }
}

/// How a mock provider answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Write a small file to the target and report success.
    Write,
    /// Report success without writing anything.
    Silent,
    /// Report a request failure with this reason.
    Fail(String),
}

/// Writes placeholder bytes to `target`.
fn write_placeholder(target: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProviderError::Write {
            path: target.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    std::fs::write(target, bytes).map_err(|e| ProviderError::Write {
        path: target.display().to_string(),
        reason: e.to_string(),
    })
}

/// An image generator that records every call.
#[derive(Debug)]
pub struct MockImageGenerator {
    behavior: MockBehavior,
    fail_files: HashSet<String>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl MockImageGenerator {
    /// Creates a generator that writes every image.
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Write)
    }

    /// Creates a generator with the given behaviour.
    #[must_use]
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            fail_files: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a generator that reports success but writes nothing.
    #[must_use]
    pub fn silent() -> Self {
        Self::with_behavior(MockBehavior::Silent)
    }

    /// Fails the call targeting `filename`.
    #[must_use]
    pub fn fail_on(mut self, filename: impl Into<String>) -> Self {
        self.fail_files.insert(filename.into());
        self
    }

    /// Returns `(prompt, target)` for each call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock-images"
    }

    async fn generate(&self, prompt: &str, target: &Path) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .push((prompt.to_string(), target.to_path_buf()));

        let file = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.fail_files.contains(file) {
            return Err(ProviderError::request_failed(self.name(), "content policy"));
        }

        match &self.behavior {
            MockBehavior::Write => write_placeholder(target, b"\x89PNG mock"),
            MockBehavior::Silent => Ok(()),
            MockBehavior::Fail(reason) => Err(ProviderError::request_failed(self.name(), reason.clone())),
        }
    }
}

/// An audio downloader that records every requested word.
#[derive(Debug)]
pub struct MockAudioDownloader {
    behavior: MockBehavior,
    unknown_words: HashSet<String>,
    words: Mutex<Vec<String>>,
}

impl MockAudioDownloader {
    /// Creates a downloader that writes every file.
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Write)
    }

    /// Creates a downloader with the given behaviour.
    #[must_use]
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            unknown_words: HashSet::new(),
            words: Mutex::new(Vec::new()),
        }
    }

    /// Reports `word` as having no recording.
    #[must_use]
    pub fn unknown(mut self, word: impl Into<String>) -> Self {
        self.unknown_words.insert(word.into());
        self
    }

    /// Returns the requested words in call order.
    #[must_use]
    pub fn words(&self) -> Vec<String> {
        self.words.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.words.lock().len()
    }
}

impl Default for MockAudioDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioDownloader for MockAudioDownloader {
    fn name(&self) -> &str {
        "mock-audio"
    }

    async fn download_pronunciation(&self, word: &str, target: &Path) -> Result<(), ProviderError> {
        self.words.lock().push(word.to_string());

        if self.unknown_words.contains(word) {
            return Err(ProviderError::not_found(self.name(), word));
        }

        match &self.behavior {
            MockBehavior::Write => write_placeholder(target, b"ID3 mock"),
            MockBehavior::Silent => Ok(()),
            MockBehavior::Fail(reason) => Err(ProviderError::request_failed(self.name(), reason.clone())),
        }
    }
}

/// A note-store syncer that records the card ids it receives.
#[derive(Debug, Default)]
pub struct MockCardSyncer {
    rejected: HashSet<String>,
    fail_with: Option<String>,
    synced: Mutex<Vec<String>>,
}

impl MockCardSyncer {
    /// Creates a syncer that creates one note per card.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the card with `id`.
    #[must_use]
    pub fn reject(mut self, id: impl Into<String>) -> Self {
        self.rejected.insert(id.into());
        self
    }

    /// Makes every sync call return an error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Returns the ids of cards received, in order.
    #[must_use]
    pub fn synced(&self) -> Vec<String> {
        self.synced.lock().clone()
    }
}

#[async_trait]
impl CardSyncer for MockCardSyncer {
    fn name(&self) -> &str {
        "mock-notes"
    }

    async fn sync(&self, cards: &[Card], _media_dir: &Path) -> anyhow::Result<SyncSummary> {
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{message}");
        }

        let mut summary = SyncSummary::default();
        for card in cards {
            self.synced.lock().push(card.id.clone());
            if self.rejected.contains(&card.id) {
                summary.errors.push(format!("{}: rejected by note store", card.id));
            } else {
                summary.created += 1;
            }
        }
        Ok(summary)
    }
}

/// A vocabulary store backed by memory.
#[derive(Debug, Default)]
pub struct InMemoryVocabularyStore {
    cards: Mutex<Vec<Card>>,
}

impl InMemoryVocabularyStore {
    /// Creates a store holding `cards`.
    #[must_use]
    pub fn new(cards: Vec<Card>) -> Self {
        Self {
            cards: Mutex::new(cards),
        }
    }

    /// Replaces the stored cards.
    pub fn set_cards(&self, cards: Vec<Card>) {
        *self.cards.lock() = cards;
    }
}

impl VocabularyStore for InMemoryVocabularyStore {
    fn load(&self) -> anyhow::Result<Vec<Card>> {
        Ok(self.cards.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_image_generator_writes_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sol_meaning1.png");
        let generator = MockImageGenerator::new();

        generator.generate("a bright sun", &target).await.unwrap();

        assert!(target.exists());
        assert_eq!(generator.calls(), vec![("a bright sun".to_string(), target)]);
    }

    #[tokio::test]
    async fn test_mock_image_generator_fail_on() {
        let dir = tempfile::tempdir().unwrap();
        let generator = MockImageGenerator::new().fail_on("luna_meaning1.png");

        let err = generator
            .generate("a full moon", &dir.path().join("luna_meaning1.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed { .. }));
    }

    #[tokio::test]
    async fn test_mock_audio_unknown_word() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = MockAudioDownloader::new().unknown("luna");

        let err = downloader
            .download_pronunciation("luna", &dir.path().join("luna.mp3"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::not_found("mock-audio", "luna"));
        assert_eq!(downloader.words(), vec!["luna".to_string()]);
    }

    #[tokio::test]
    async fn test_recording_stage_counts_calls() {
        let stage = RecordingStage::new("validate");
        let mut ctx = ExecutionContext::new("vocabulary", ".");

        stage.execute(&mut ctx).await.unwrap();
        stage.execute(&mut ctx).await.unwrap();

        assert_eq!(stage.call_count(), 2);
    }
}
