//! Normalized action status.
//!
//! Back ends report request progress in several vocabularies
//! (`request_successful`, `succeeded`, `QUEUED`, `fetched`, ...). They are
//! folded into one set; unrecognized values are carried through unchanged.

use std::fmt;

use serde::{Serialize, Serializer};

/// Outcome of an action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Successful,
    InProgress,
    Failed,
    Timeout,
    Rejected,
    Error,
    /// Status value not in the known vocabulary, lower-cased.
    Unknown(String),
}

impl ActionStatus {
    /// Fold a raw back end status into the normalized set.
    pub fn normalize(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        let status = lower.strip_prefix("request_").unwrap_or(&lower);
        match status {
            "successful" | "succeeded" => ActionStatus::Successful,
            "in_progress" | "queued" | "fetched" | "started" => ActionStatus::InProgress,
            "not_found" | "fail" | "failed" => ActionStatus::Failed,
            "timeout" => ActionStatus::Timeout,
            "rejected" => ActionStatus::Rejected,
            "error" => ActionStatus::Error,
            _ => ActionStatus::Unknown(lower.clone()),
        }
    }

    /// No further polling needed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionStatus::InProgress | ActionStatus::Unknown(_))
    }

    /// Upper-case name as reported to listeners.
    pub fn as_str(&self) -> &str {
        match self {
            ActionStatus::Successful => "SUCCESSFUL",
            ActionStatus::InProgress => "IN_PROGRESS",
            ActionStatus::Failed => "FAILED",
            ActionStatus::Timeout => "TIMEOUT",
            ActionStatus::Rejected => "REJECTED",
            ActionStatus::Error => "ERROR",
            ActionStatus::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Unknown(raw) => write!(f, "{}", raw.to_ascii_uppercase()),
            other => f.write_str(other.as_str()),
        }
    }
}

impl Serialize for ActionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vocabularies() {
        for raw in ["request_successful", "succeeded", "SUCCEEDED", "successful"] {
            assert_eq!(ActionStatus::normalize(raw), ActionStatus::Successful, "{}", raw);
        }
        for raw in ["request_in_progress", "queued", "QUEUED", "fetched", "started"] {
            assert_eq!(ActionStatus::normalize(raw), ActionStatus::InProgress, "{}", raw);
        }
        for raw in ["request_not_found", "request_fail", "failed", "FAIL"] {
            assert_eq!(ActionStatus::normalize(raw), ActionStatus::Failed, "{}", raw);
        }
    }

    #[test]
    fn test_unknown_is_kept() {
        let s = ActionStatus::normalize("request_delayed");
        assert_eq!(s, ActionStatus::Unknown("request_delayed".to_string()));
        assert!(!s.is_terminal());
        assert_eq!(s.to_string(), "REQUEST_DELAYED");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ActionStatus::Successful.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(ActionStatus::Timeout.is_terminal());
        assert!(!ActionStatus::InProgress.is_terminal());
        assert_eq!(ActionStatus::InProgress.to_string(), "IN_PROGRESS");
    }
}
