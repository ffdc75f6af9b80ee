//! Stage result type with factory methods.

use super::StageStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Succeeded/failed unit counts carried by a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitCounts {
    /// Units that completed.
    pub succeeded: usize,
    /// Units that failed.
    pub failed: usize,
}

/// The result of a stage execution.
///
/// Built through the factory methods, which keep the status and error list
/// consistent: `failure` and `partial` always carry at least one error and
/// `success` never carries any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The outcome.
    pub status: StageStatus,

    /// Human-readable summary.
    pub message: String,

    /// Keyed payload produced by the stage.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Errors collected while running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Unit counts for partial results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<UnitCounts>,
}

impl StageResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Success,
            message: message.into(),
            data: HashMap::new(),
            errors: Vec::new(),
            counts: None,
        }
    }

    /// Creates a successful result with data.
    #[must_use]
    pub fn success_with(message: impl Into<String>, data: HashMap<String, serde_json::Value>) -> Self {
        Self::success(message).with_data(data)
    }

    /// Creates a partial result.
    #[must_use]
    pub fn partial(
        message: impl Into<String>,
        succeeded: usize,
        failed: usize,
        errors: Vec<String>,
    ) -> Self {
        let message = message.into();
        let errors = non_empty_errors(&message, errors);
        Self {
            status: StageStatus::Partial,
            message,
            data: HashMap::new(),
            errors,
            counts: Some(UnitCounts { succeeded, failed }),
        }
    }

    /// Creates a failure result.
    #[must_use]
    pub fn failure(message: impl Into<String>, errors: Vec<String>) -> Self {
        let message = message.into();
        let errors = non_empty_errors(&message, errors);
        Self {
            status: StageStatus::Failure,
            message,
            data: HashMap::new(),
            errors,
            counts: None,
        }
    }

    /// Creates a skipped result with a reason.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            message: reason.into(),
            data: HashMap::new(),
            errors: Vec::new(),
            counts: None,
        }
    }

    /// Merges data into the result.
    #[must_use]
    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data.extend(data);
        self
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true if the stage fully succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Failure
    }

    /// Returns true if the stage was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.status == StageStatus::Skipped
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

fn non_empty_errors(message: &str, errors: Vec<String>) -> Vec<String> {
    if errors.is_empty() {
        vec![message.to_string()]
    } else {
        errors
    }
}
