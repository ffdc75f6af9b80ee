//! Generation plan: which artifacts a run must produce.

use super::{Card, MissingMedia};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Media families a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Families {
    /// Whether images are in scope.
    pub images: bool,
    /// Whether audio is in scope.
    pub audio: bool,
}

impl Default for Families {
    fn default() -> Self {
        Self {
            images: true,
            audio: true,
        }
    }
}

/// The artifacts referenced by a request and the subset still to produce.
///
/// Computed fresh at the start of every run and never persisted. All sets
/// are ordered so generation proceeds in a reproducible order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationPlan {
    /// Requested card ids, in request order.
    pub card_ids: Vec<String>,
    /// Words whose pronunciation the requested cards need.
    pub words: BTreeSet<String>,
    /// Image filenames referenced by the requested cards.
    pub referenced_images: BTreeSet<String>,
    /// Audio filenames referenced by the requested cards.
    pub referenced_audio: BTreeSet<String>,
    /// Images the audit found missing.
    pub audited_images: BTreeSet<String>,
    /// Audio files the audit found missing.
    pub audited_audio: BTreeSet<String>,
    /// Images not present locally.
    pub images_to_generate: BTreeSet<String>,
    /// Audio files not present locally.
    pub audio_to_generate: BTreeSet<String>,
    /// Present images whose recorded provenance no longer matches the card.
    pub stale_images: BTreeSet<String>,
    /// Missing images whose recorded provenance no longer matches the card.
    #[serde(default)]
    pub drifted_images: BTreeSet<String>,
}

impl GenerationPlan {
    /// Computes `(referenced ∪ audited) \ present` per family.
    ///
    /// Families switched off in `families` stay empty.
    pub fn compute<'a>(
        cards: impl IntoIterator<Item = &'a Card>,
        audited: &MissingMedia,
        families: Families,
        is_present: impl Fn(&str) -> bool,
    ) -> Self {
        let mut plan = Self::default();

        for card in cards {
            plan.card_ids.push(card.id.clone());
            if families.images {
                if let Some(image) = card.image_file() {
                    plan.referenced_images.insert(image.to_string());
                }
            }
            if families.audio {
                if let Some(audio) = card.audio_file() {
                    plan.referenced_audio.insert(audio.to_string());
                    plan.words.insert(card.word.clone());
                }
            }
        }

        if families.images {
            plan.audited_images.clone_from(&audited.images);
        }
        if families.audio {
            plan.audited_audio.clone_from(&audited.audio);
        }

        plan.images_to_generate = plan
            .required_images()
            .into_iter()
            .filter(|name| !is_present(name))
            .collect();
        plan.audio_to_generate = plan
            .required_audio()
            .into_iter()
            .filter(|name| !is_present(name))
            .collect();

        plan
    }

    /// Records present images whose provenance drifted.
    #[must_use]
    pub fn with_stale_images(mut self, stale: BTreeSet<String>) -> Self {
        self.stale_images = stale;
        self
    }

    /// Records missing images whose provenance drifted.
    ///
    /// Only names already in `images_to_generate` are kept.
    #[must_use]
    pub fn with_drifted_images(mut self, drifted: BTreeSet<String>) -> Self {
        self.drifted_images = drifted
            .into_iter()
            .filter(|name| self.images_to_generate.contains(name))
            .collect();
        self
    }

    /// Number of new artifacts the run would create.
    ///
    /// Without `force`, drifted missing images are held back; with it,
    /// present stale images are regenerated as well.
    #[must_use]
    pub fn effective_item_count(&self, force: bool) -> usize {
        self.effective_image_count(force) + self.audio_to_generate.len()
    }

    /// Number of images the run would generate.
    #[must_use]
    pub fn effective_image_count(&self, force: bool) -> usize {
        if force {
            self.images_to_generate.len() + self.stale_images.len()
        } else {
            self.images_to_generate.len() - self.drifted_images.len()
        }
    }

    /// Referenced plus audited images.
    #[must_use]
    pub fn required_images(&self) -> BTreeSet<String> {
        self.referenced_images
            .union(&self.audited_images)
            .cloned()
            .collect()
    }

    /// Referenced plus audited audio files.
    #[must_use]
    pub fn required_audio(&self) -> BTreeSet<String> {
        self.referenced_audio
            .union(&self.audited_audio)
            .cloned()
            .collect()
    }

    /// Number of new artifacts the plan would create.
    #[must_use]
    pub fn new_item_count(&self) -> usize {
        self.images_to_generate.len() + self.audio_to_generate.len()
    }

    /// Returns true if nothing needs generating.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images_to_generate.is_empty() && self.audio_to_generate.is_empty()
    }
}
