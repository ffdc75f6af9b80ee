//! Error types for the cardflow crate.
//!
//! Each concern owns a focused error enum; [`CardflowError`] aggregates them
//! for callers (such as the CLI) that only need to report a failure.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cardflow operations.
#[derive(Debug, Error)]
pub enum CardflowError {
    /// A pipeline-level error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// A registry lookup or registration error.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// A media orchestrator error.
    #[error("{0}")]
    Media(#[from] MediaError),

    /// A configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building or driving a pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The requested stage does not exist in the pipeline.
    #[error("Stage not found: '{stage}' in pipeline '{pipeline}'")]
    StageNotFound {
        /// The pipeline name.
        pipeline: String,
        /// The requested stage name.
        stage: String,
    },

    /// A stage with the same name was already added.
    #[error("Duplicate stage '{stage}' in pipeline '{pipeline}'")]
    DuplicateStage {
        /// The pipeline name.
        pipeline: String,
        /// The duplicated stage name.
        stage: String,
    },

    /// A stage declares a dependency that is not an earlier stage.
    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency {
        /// The stage declaring the dependency.
        stage: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The pipeline has no stages.
    #[error("Pipeline '{0}' has no stages")]
    Empty(String),
}

impl PipelineError {
    /// Creates a stage not found error.
    #[must_use]
    pub fn stage_not_found(pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        Self::StageNotFound {
            pipeline: pipeline.into(),
            stage: stage.into(),
        }
    }
}

/// Errors raised by the pipeline registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A pipeline with this name is already registered.
    #[error("Pipeline already registered: {0}")]
    AlreadyRegistered(String),

    /// No pipeline with this name is registered.
    #[error("Pipeline not found: {name} (registered: {})", available.join(", "))]
    NotFound {
        /// The requested name.
        name: String,
        /// The names that are registered.
        available: Vec<String>,
    },
}

/// Fatal conditions that abort a media run before any provider call.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The vocabulary or the requested card ids failed validation.
    #[error("Vocabulary validation failed: {}", errors.join("; "))]
    ValidationFailed {
        /// Validation messages.
        errors: Vec<String>,
    },

    /// Another run holds the lock.
    #[error("Another media run is in progress (lock: {}{})", path.display(), owner_hint(owner.as_ref()))]
    RunInProgress {
        /// The lock file path.
        path: PathBuf,
        /// The recorded owner, when the lock file could be read.
        owner: Option<LockOwnerInfo>,
    },

    /// The plan would create more items than allowed.
    #[error("Generation plan exceeds cap: {requested} new items requested, maximum is {cap}")]
    CapExceeded {
        /// Images plus audio files that would be generated.
        requested: usize,
        /// The configured maximum.
        cap: usize,
    },

    /// The vocabulary store could not be read.
    #[error("Failed to load vocabulary: {0}")]
    VocabularyLoad(String),

    /// The media auditor failed.
    #[error("Media audit failed: {0}")]
    Audit(String),

    /// The provenance index could not be read or written.
    #[error("Provenance index error at {}: {message}", path.display())]
    Provenance {
        /// The index path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Creates a validation error from a list of messages.
    #[must_use]
    pub fn validation(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Returns a short machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::RunInProgress { .. } => "run_in_progress",
            Self::CapExceeded { .. } => "cap_exceeded",
            Self::VocabularyLoad(_) => "vocabulary_load",
            Self::Audit(_) => "audit_failed",
            Self::Provenance { .. } => "provenance",
            Self::Io(_) => "io",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::ValidationFailed { errors } => {
                map.insert("errors".to_string(), serde_json::json!(errors));
            }
            Self::RunInProgress { path, owner } => {
                map.insert("lock_path".to_string(), serde_json::json!(path.display().to_string()));
                if let Some(owner) = owner {
                    map.insert("owner".to_string(), serde_json::json!(owner));
                }
            }
            Self::CapExceeded { requested, cap } => {
                map.insert("requested".to_string(), serde_json::json!(requested));
                map.insert("cap".to_string(), serde_json::json!(cap));
            }
            _ => {}
        }

        map
    }
}

/// Owner details read back from a held lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockOwnerInfo {
    /// Process id of the owning run.
    pub pid: u32,
    /// Host the owning run started on.
    pub hostname: String,
    /// When the lock was taken (RFC 3339).
    pub acquired_at: String,
    /// Whether the owning process still appears to be running.
    pub alive: Option<bool>,
}

fn owner_hint(owner: Option<&LockOwnerInfo>) -> String {
    match owner {
        Some(info) => match info.alive {
            Some(false) => format!(
                ", held by pid {} on {} since {}; that process is gone, clear the lock with `cardflow unlock`",
                info.pid, info.hostname, info.acquired_at
            ),
            _ => format!(
                ", held by pid {} on {} since {}",
                info.pid, info.hostname, info.acquired_at
            ),
        },
        None => String::new(),
    }
}

/// Errors reported by media providers for a single item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider rejected or failed the request.
    #[error("{provider} request failed: {reason}")]
    RequestFailed {
        /// Provider name.
        provider: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The provider has nothing for this input.
    #[error("{provider} has no result for '{input}'")]
    NotFound {
        /// Provider name.
        provider: String,
        /// The word or prompt requested.
        input: String,
    },

    /// Writing the artifact failed.
    #[error("Failed to write {path}: {reason}")]
    Write {
        /// Target path.
        path: String,
        /// Reason for the failure.
        reason: String,
    },
}

impl ProviderError {
    /// Creates a request failed error.
    #[must_use]
    pub fn request_failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(provider: impl Into<String>, input: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
            input: input.into(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the schema.
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("Invalid config value for '{field}': {message}")]
    Invalid {
        /// The field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}
