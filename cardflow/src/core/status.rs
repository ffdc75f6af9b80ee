//! Stage status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Work done, context updated.
    Success,
    /// Some units succeeded and some failed.
    Partial,
    /// No usable output.
    Failure,
    /// Preconditions not met, but not an error.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failure => write!(f, "failure"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates full success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the status carries errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        matches!(self, Self::Partial | Self::Failure)
    }

    /// Event name emitted when a stage finishes with this status.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Success => "stage.completed",
            Self::Partial => "stage.partial",
            Self::Failure => "stage.failed",
            Self::Skipped => "stage.skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Success.to_string(), "success");
        assert_eq!(StageStatus::Partial.to_string(), "partial");
        assert_eq!(StageStatus::Failure.to_string(), "failure");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_has_errors() {
        assert!(StageStatus::Partial.has_errors());
        assert!(StageStatus::Failure.has_errors());
        assert!(!StageStatus::Success.has_errors());
        assert!(!StageStatus::Skipped.has_errors());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(json, r#""skipped""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Skipped);
    }
}
