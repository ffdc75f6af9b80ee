//! Capability traits for the external media and note-store services.
//!
//! Each provider owns its own retry/backoff; the orchestrator treats every
//! call as a single success or failure.

use super::Card;
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Produces an image from a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name recorded in provenance.
    fn name(&self) -> &str;

    /// Generates an image for `prompt` and writes it to `target`.
    async fn generate(&self, prompt: &str, target: &Path) -> Result<(), ProviderError>;
}

/// Fetches a recorded pronunciation.
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Downloads a pronunciation of `word` into `target`.
    async fn download_pronunciation(&self, word: &str, target: &Path) -> Result<(), ProviderError>;
}

/// Outcome of pushing cards to the note store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Notes created.
    pub created: usize,
    /// Notes updated in place.
    pub updated: usize,
    /// One message per card that could not be synced.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SyncSummary {
    /// Cards that reached the note store.
    #[must_use]
    pub fn synced(&self) -> usize {
        self.created + self.updated
    }
}

/// Creates or updates notes in the spaced-repetition application.
#[async_trait]
pub trait CardSyncer: Send + Sync {
    /// Provider name.
    fn name(&self) -> &str;

    /// Pushes `cards`, whose media live in `media_dir`.
    async fn sync(&self, cards: &[Card], media_dir: &Path) -> anyhow::Result<SyncSummary>;
}
