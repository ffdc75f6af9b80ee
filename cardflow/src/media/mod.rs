//! Idempotent media generation for vocabulary cards.
//!
//! The [`MediaOrchestrator`] turns a list of card ids into the images and
//! pronunciations those cards reference, never regenerating what already
//! exists and never exceeding the configured cap.

mod auditor;
#[cfg(feature = "http")]
mod http;
mod lock;
mod orchestrator;
mod plan;
mod provenance;
mod providers;
mod vocabulary;

pub use auditor::{is_present, LocalMediaAuditor, MediaAuditor, MissingMedia};
#[cfg(feature = "http")]
pub use http::HttpAudioDownloader;
pub use lock::RunLock;
pub use orchestrator::{
    FamilyCounts, MediaOptions, MediaOrchestrator, MediaRunReport, DEFAULT_MAX_NEW_ITEMS,
    DEFAULT_PER_IMAGE_COST,
};
pub use plan::{Families, GenerationPlan};
pub use provenance::{prompt_hash, ProvenanceIndex, ProvenanceRecord};
pub use providers::{AudioDownloader, CardSyncer, ImageGenerator, SyncSummary};
pub use vocabulary::{
    audio_filename, word_from_audio_filename, Card, JsonVocabularyStore, StructuralValidator,
    VocabularyStore, VocabularyValidator,
};
