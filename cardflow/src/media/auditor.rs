//! Local-vs-reference media audit.

use super::VocabularyStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Artifacts referenced somewhere but absent locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingMedia {
    /// Missing image filenames.
    pub images: BTreeSet<String>,
    /// Missing audio filenames.
    pub audio: BTreeSet<String>,
}

impl MissingMedia {
    /// Returns true if nothing is missing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.audio.is_empty()
    }
}

/// Independent pass over every vocabulary reference.
pub trait MediaAuditor: Send + Sync {
    /// Computes what is referenced but not on disk.
    fn compute_missing(&self) -> anyhow::Result<MissingMedia>;
}

/// Returns true if `path` is a non-empty regular file.
#[must_use]
pub fn is_present(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// Audits every card of a store against a media directory.
pub struct LocalMediaAuditor {
    store: Arc<dyn VocabularyStore>,
    media_dir: PathBuf,
}

impl LocalMediaAuditor {
    /// Creates an auditor over `store` and `media_dir`.
    #[must_use]
    pub fn new(store: Arc<dyn VocabularyStore>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            media_dir: media_dir.into(),
        }
    }
}

impl MediaAuditor for LocalMediaAuditor {
    fn compute_missing(&self) -> anyhow::Result<MissingMedia> {
        let mut missing = MissingMedia::default();

        for card in self.store.load()? {
            if let Some(image) = card.image_file() {
                if !is_present(&self.media_dir.join(image)) {
                    missing.images.insert(image.to_string());
                }
            }
            if let Some(audio) = card.audio_file() {
                if !is_present(&self.media_dir.join(audio)) {
                    missing.audio.insert(audio.to_string());
                }
            }
        }

        Ok(missing)
    }
}

impl std::fmt::Debug for LocalMediaAuditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaAuditor")
            .field("media_dir", &self.media_dir)
            .finish_non_exhaustive()
    }
}
