//! Test fixtures for media runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::InMemoryVocabularyStore;
use crate::media::{Card, MediaOptions};

/// A small deck covering an image+audio card, an image-only card and a
/// multi-word audio card.
#[must_use]
pub fn sample_cards() -> Vec<Card> {
    vec![
        Card::new("sol_1", "sol")
            .with_image("sol_meaning1.png", "a bright sun over the sea")
            .with_audio("[sound:sol.mp3]"),
        Card::new("luna_1", "luna")
            .with_image("luna_meaning1.png", "a full moon above hills")
            .with_audio("[sound:luna.mp3]"),
        Card::new("buenos_dias_1", "buenos días").with_audio("buenos_dias_1.mp3"),
    ]
}

/// A project layout under a caller-owned root directory.
#[derive(Debug)]
pub struct MediaFixture {
    root: PathBuf,
    /// The vocabulary the orchestrator sees.
    pub store: Arc<InMemoryVocabularyStore>,
}

impl MediaFixture {
    /// Creates the media directory under `root` and loads [`sample_cards`].
    ///
    /// # Panics
    ///
    /// Panics if the media directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(root: &Path) -> Self {
        let fixture = Self {
            root: root.to_path_buf(),
            store: Arc::new(InMemoryVocabularyStore::new(sample_cards())),
        };
        std::fs::create_dir_all(fixture.media_dir()).expect("create media dir");
        fixture
    }

    /// Replaces the deck.
    #[must_use]
    pub fn with_cards(self, cards: Vec<Card>) -> Self {
        self.store.set_cards(cards);
        self
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the media directory.
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.root.join("media")
    }

    /// Returns the lock path.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".cardflow.lock")
    }

    /// Returns the provenance index path.
    #[must_use]
    pub fn provenance_path(&self) -> PathBuf {
        self.media_dir().join(".provenance.json")
    }

    /// Options pointing at this layout with a cap of 50.
    #[must_use]
    pub fn options(&self) -> MediaOptions {
        let mut options = MediaOptions::new(self.media_dir());
        options.lock_path = self.lock_path();
        options.provenance_path = self.provenance_path();
        options
    }

    /// Writes a non-empty media file.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[allow(clippy::expect_used)]
    pub fn write_media(&self, filename: &str) {
        std::fs::write(self.media_dir().join(filename), b"existing").expect("write media file");
    }

    /// Returns true if a non-empty media file exists.
    #[must_use]
    pub fn has_media(&self, filename: &str) -> bool {
        crate::media::is_present(&self.media_dir().join(filename))
    }
}
