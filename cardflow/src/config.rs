//! Project configuration.

use crate::errors::ConfigError;
use crate::media::{MediaOptions, DEFAULT_MAX_NEW_ITEMS, DEFAULT_PER_IMAGE_COST};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "cardflow.json";

/// Settings read from `cardflow.json`.
///
/// Relative paths are resolved against the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardflowConfig {
    /// Vocabulary document.
    #[serde(default = "default_vocabulary_path")]
    pub vocabulary_path: PathBuf,
    /// Media directory.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Provenance index.
    #[serde(default = "default_provenance_path")]
    pub provenance_path: PathBuf,
    /// Run lock file.
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
    /// Maximum images plus audio files per run.
    #[serde(default = "default_max_new_items")]
    pub max_new_items: usize,
    /// Estimated cost per generated image.
    #[serde(default = "default_per_image_cost")]
    pub per_image_cost: f64,
    /// Name of the image provider to use, if any.
    #[serde(default)]
    pub image_provider_name: Option<String>,
    /// Pronunciation URL template containing `{word}`.
    #[serde(default)]
    pub audio_url_template: Option<String>,
}

fn default_vocabulary_path() -> PathBuf {
    PathBuf::from("vocabulary.json")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_provenance_path() -> PathBuf {
    PathBuf::from("media/.provenance.json")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from(".cardflow.lock")
}

fn default_max_new_items() -> usize {
    DEFAULT_MAX_NEW_ITEMS
}

fn default_per_image_cost() -> f64 {
    DEFAULT_PER_IMAGE_COST
}

impl Default for CardflowConfig {
    fn default() -> Self {
        Self {
            vocabulary_path: default_vocabulary_path(),
            media_dir: default_media_dir(),
            provenance_path: default_provenance_path(),
            lock_path: default_lock_path(),
            max_new_items: default_max_new_items(),
            per_image_cost: default_per_image_cost(),
            image_provider_name: None,
            audio_url_template: None,
        }
    }
}

impl CardflowConfig {
    /// Loads configuration for `root`.
    ///
    /// Reads `explicit` when given (it must exist), otherwise
    /// `<root>/cardflow.json` when present, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file is unreadable, malformed or
    /// holds out-of-range values.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => resolve(root, path),
            None => {
                let path = root.join(CONFIG_FILE_NAME);
                if !path.exists() {
                    tracing::debug!(root = %root.display(), "No config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.per_image_cost.is_finite() || self.per_image_cost < 0.0 {
            return Err(invalid("per_image_cost", "must be a non-negative number"));
        }
        if let Some(template) = &self.audio_url_template {
            if !template.contains("{word}") {
                return Err(invalid("audio_url_template", "must contain '{word}'"));
            }
        }
        if self.media_dir.as_os_str().is_empty() {
            return Err(invalid("media_dir", "must not be empty"));
        }
        Ok(())
    }

    /// Vocabulary path resolved against `root`.
    #[must_use]
    pub fn vocabulary_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.vocabulary_path)
    }

    /// Media directory resolved against `root`.
    #[must_use]
    pub fn media_dir(&self, root: &Path) -> PathBuf {
        resolve(root, &self.media_dir)
    }

    /// Orchestrator options with every path resolved against `root`.
    #[must_use]
    pub fn media_options(&self, root: &Path) -> MediaOptions {
        let mut options = MediaOptions::new(self.media_dir(root)).max_new_items(self.max_new_items);
        options.provenance_path = resolve(root, &self.provenance_path);
        options.lock_path = resolve(root, &self.lock_path);
        options.per_image_cost = self.per_image_cost;
        options
    }

    /// Lock path resolved against `root`.
    #[must_use]
    pub fn lock_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.lock_path)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}
