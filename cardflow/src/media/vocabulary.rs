//! Vocabulary cards and the store/validator collaborators.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SOUND_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[sound:([^\]]+)\]$").expect("static pattern compiles")
});

static MEANING_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_\d+$").expect("static pattern compiles")
});

/// One learnable unit with its media references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Stable identifier.
    pub id: String,
    /// The word this card teaches.
    pub word: String,
    /// Image filename, relative to the media directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Audio reference: a bare filename or a `[sound:file]` tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Prompt used to generate the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Card {
    /// Creates a card with no media references.
    #[must_use]
    pub fn new(id: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            image: None,
            audio: None,
            prompt: None,
        }
    }

    /// Sets the image filename and its prompt.
    #[must_use]
    pub fn with_image(mut self, filename: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.image = Some(filename.into());
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the audio reference.
    #[must_use]
    pub fn with_audio(mut self, reference: impl Into<String>) -> Self {
        self.audio = Some(reference.into());
        self
    }

    /// Returns the image filename, if any.
    #[must_use]
    pub fn image_file(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Returns the audio filename, unwrapping a `[sound:...]` tag.
    #[must_use]
    pub fn audio_file(&self) -> Option<&str> {
        self.audio.as_deref().and_then(audio_filename)
    }
}

/// Extracts the filename from an audio reference.
#[must_use]
pub fn audio_filename(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    match SOUND_TAG.captures(reference) {
        Some(caps) => caps.get(1).map(|m| m.as_str()),
        None => Some(reference),
    }
}

/// Derives the pronounced word from an audio filename.
///
/// `buenos_dias_2.mp3` becomes `buenos dias`.
#[must_use]
pub fn word_from_audio_filename(filename: &str) -> Option<String> {
    let stem = Path::new(filename).file_stem()?.to_str()?;
    let word = MEANING_SUFFIX.replace(stem, "").replace('_', " ");
    let word = word.trim();
    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

/// Source of the card collection.
pub trait VocabularyStore: Send + Sync {
    /// Loads every card.
    fn load(&self) -> anyhow::Result<Vec<Card>>;
}

/// Structural checks run before any media work.
pub trait VocabularyValidator: Send + Sync {
    /// Returns one message per problem found.
    fn validate(&self, cards: &[Card]) -> Vec<String>;
}

/// Reads cards from a JSON document.
///
/// Accepts either a top-level array of cards or `{ "cards": [...] }`.
#[derive(Debug, Clone)]
pub struct JsonVocabularyStore {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VocabularyDocument {
    List(Vec<Card>),
    Wrapped { cards: Vec<Card> },
}

impl JsonVocabularyStore {
    /// Creates a store reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VocabularyStore for JsonVocabularyStore {
    fn load(&self) -> anyhow::Result<Vec<Card>> {
        use anyhow::Context;

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let document: VocabularyDocument = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        Ok(match document {
            VocabularyDocument::List(cards) | VocabularyDocument::Wrapped { cards } => cards,
        })
    }
}

/// Default validator checking the fields the orchestrator depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl VocabularyValidator for StructuralValidator {
    fn validate(&self, cards: &[Card]) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, card) in cards.iter().enumerate() {
            if card.id.trim().is_empty() {
                errors.push(format!("card #{index}: empty id"));
                continue;
            }
            if !seen.insert(card.id.as_str()) {
                errors.push(format!("card '{}': duplicate id", card.id));
            }
            if card.word.trim().is_empty() {
                errors.push(format!("card '{}': empty word", card.id));
            }
            if let Some(image) = card.image_file() {
                if !is_bare_filename(image) {
                    errors.push(format!("card '{}': image '{image}' is not a bare filename", card.id));
                }
                if card.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
                    errors.push(format!("card '{}': image '{image}' has no prompt", card.id));
                }
            }
            if let Some(audio) = card.audio_file() {
                if !is_bare_filename(audio) {
                    errors.push(format!("card '{}': audio '{audio}' is not a bare filename", card.id));
                }
            }
        }

        errors
    }
}

fn is_bare_filename(name: &str) -> bool {
    let path = Path::new(name);
    path.file_name().and_then(|n| n.to_str()) == Some(name) && name != "." && name != ".."
}
