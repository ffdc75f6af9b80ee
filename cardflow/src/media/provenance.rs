//! Provenance index linking generated images to the input that produced them.

use crate::errors::MediaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

const INDEX_VERSION: u32 = 1;

/// Hashes the `(word, prompt)` pair an image was generated from.
#[must_use]
pub fn prompt_hash(word: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(word.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

/// How a generated image was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// The card word.
    pub word: String,
    /// Hash of `(word, prompt)`.
    pub prompt_hash: String,
    /// Image provider name.
    pub provider: String,
    /// When the image was created.
    pub created_at: DateTime<Utc>,
}

impl ProvenanceRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(word: impl Into<String>, prompt_hash: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            prompt_hash: prompt_hash.into(),
            provider: provider.into(),
            created_at: Utc::now(),
        }
    }
}

/// Provenance records keyed by image filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceIndex {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, ProvenanceRecord>,
}

fn default_version() -> u32 {
    INDEX_VERSION
}

impl Default for ProvenanceIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl ProvenanceIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index, treating a missing file as empty.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Provenance` if the file exists but is unreadable.
    pub fn load(path: &Path) -> Result<Self, MediaError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(provenance_error(path, e)),
        };

        serde_json::from_str(&raw).map_err(|e| provenance_error(path, e))
    }

    /// Writes the index atomically (temporary file, then rename).
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Provenance` if writing fails.
    pub fn save(&self, path: &Path) -> Result<(), MediaError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| provenance_error(path, e))?;
        }

        let body = serde_json::to_string_pretty(self).map_err(|e| provenance_error(path, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| provenance_error(path, e))?;
        std::fs::rename(&tmp, path).map_err(|e| provenance_error(path, e))
    }

    /// Gets the record for an image.
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&ProvenanceRecord> {
        self.entries.get(filename)
    }

    /// Inserts or replaces the record for an image.
    pub fn insert(&mut self, filename: impl Into<String>, record: ProvenanceRecord) {
        self.entries.insert(filename.into(), record);
    }

    /// Returns the recorded hash when it differs from `current_hash`.
    #[must_use]
    pub fn drifted(&self, filename: &str, current_hash: &str) -> Option<&str> {
        self.entries
            .get(filename)
            .map(|r| r.prompt_hash.as_str())
            .filter(|recorded| *recorded != current_hash)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn provenance_error(path: &Path, err: impl std::fmt::Display) -> MediaError {
    MediaError::Provenance {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
