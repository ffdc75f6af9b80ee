//! # Cardflow
//!
//! Stage pipelines and idempotent media generation for language-learning
//! flashcard decks.
//!
//! Cardflow provides:
//!
//! - **Stage-based execution**: named stages over a shared execution context,
//!   dispatched one at a time through a pipeline registry
//! - **Media orchestration**: plan, cap, generate and re-audit the images and
//!   pronunciations a set of cards references
//! - **Provenance**: every generated image is linked to the prompt that made it
//! - **Single-writer locking**: one media run per project at a time
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cardflow::prelude::*;
//!
//! let store = Arc::new(JsonVocabularyStore::new("vocabulary.json"));
//! let orchestrator = MediaOrchestrator::new(MediaOptions::new("media"), store.clone())
//!     .with_image_generator(my_image_provider);
//!
//! let mut registry = PipelineRegistry::new();
//! registry.register(vocabulary_pipeline(store, Arc::new(orchestrator), None)?)?;
//!
//! let mut ctx = ExecutionContext::new("vocabulary", ".");
//! ctx.set("card_ids", serde_json::json!(["sol_1"]));
//! let result = registry.execute("vocabulary", "media", &mut ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod media;
pub mod pipeline;
pub mod stages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CardflowConfig;
    pub use crate::context::{ContextBag, ExecutionContext};
    pub use crate::core::{StageResult, StageStatus, UnitCounts};
    pub use crate::errors::{
        CardflowError, ConfigError, MediaError, PipelineError, ProviderError, RegistryError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::media::{
        AudioDownloader, Card, CardSyncer, ImageGenerator, JsonVocabularyStore, MediaOptions,
        MediaOrchestrator, MediaRunReport, VocabularyStore,
    };
    pub use crate::pipeline::{
        vocabulary_pipeline, Pipeline, PipelineBuilder, PipelineRegistry, VOCABULARY_PIPELINE,
    };
    pub use crate::stages::{FnStage, Stage};
}
