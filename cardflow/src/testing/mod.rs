//! Testing utilities for cardflow pipelines and media runs.
//!
//! This module provides:
//! - A recording stage for pipeline tests
//! - Recording mock providers and an in-memory vocabulary store
//! - A media directory fixture with a small sample deck

mod fixtures;
mod mocks;

pub use fixtures::{sample_cards, MediaFixture};
pub use mocks::{
    InMemoryVocabularyStore, MockAudioDownloader, MockBehavior, MockCardSyncer,
    MockImageGenerator, RecordingStage,
};
