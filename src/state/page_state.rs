/// Page status definitions for tracking mirror progress
///
/// This module defines every status a page can be in during a mirror run and
/// the transitions allowed between them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a page in the mirror pipeline
///
/// ```text
/// pending -> fetching -> {fetch_failed | fetched} -> extracting -> rewriting -> {persisted | persist_failed}
/// pending -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    // ===== Active States =====
    /// Page is planned but no worker has picked it up yet
    Pending,

    /// Page is being fetched from the origin
    Fetching,

    /// Page content was fetched successfully
    Fetched,

    /// References are being extracted and assets resolved
    Extracting,

    /// References are being rewritten to local paths
    Rewriting,

    // ===== Terminal States =====
    /// The origin could not deliver the page
    FetchFailed,

    /// The rewritten page was written to the mirror
    Persisted,

    /// The page could not be written (or its worker was lost)
    PersistFailed,

    /// The run was cancelled before the page was dispatched
    Cancelled,
}

impl PageStatus {
    /// Returns true if this is a terminal status (no further processing happens)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::Persisted | Self::PersistFailed | Self::Cancelled
        )
    }

    /// Returns true if the page ended up in the mirror
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Persisted)
    }

    /// Returns true if this represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::PersistFailed)
    }

    /// Returns true if moving from this status to `next` is allowed
    ///
    /// Any active status may fall to `persist_failed`, which is how a page
    /// whose worker disappeared is closed out.
    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        use PageStatus::*;

        match (self, next) {
            (Pending, Fetching) | (Pending, Cancelled) => true,
            (Fetching, Fetched) | (Fetching, FetchFailed) => true,
            (Fetched, Extracting) => true,
            (Extracting, Rewriting) => true,
            (Rewriting, Persisted) => true,
            (from, PersistFailed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Converts the status to its string representation
    ///
    /// This is the form used in the manifest and in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Extracting => "extracting",
            Self::Rewriting => "rewriting",
            Self::FetchFailed => "fetch_failed",
            Self::Persisted => "persisted",
            Self::PersistFailed => "persist_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all_states().into_iter().find(|state| state.as_str() == s)
    }

    /// Returns all possible page statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Fetching,
            Self::Fetched,
            Self::Extracting,
            Self::Rewriting,
            Self::FetchFailed,
            Self::Persisted,
            Self::PersistFailed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!PageStatus::Pending.is_terminal());
        assert!(!PageStatus::Fetching.is_terminal());
        assert!(!PageStatus::Fetched.is_terminal());
        assert!(!PageStatus::Extracting.is_terminal());
        assert!(!PageStatus::Rewriting.is_terminal());

        assert!(PageStatus::FetchFailed.is_terminal());
        assert!(PageStatus::Persisted.is_terminal());
        assert!(PageStatus::PersistFailed.is_terminal());
        assert!(PageStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PageStatus::Pending,
            PageStatus::Fetching,
            PageStatus::Fetched,
            PageStatus::Extracting,
            PageStatus::Rewriting,
            PageStatus::Persisted,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!PageStatus::Pending.can_transition_to(PageStatus::Persisted));
        assert!(!PageStatus::Fetching.can_transition_to(PageStatus::Cancelled));
        assert!(!PageStatus::FetchFailed.can_transition_to(PageStatus::Fetching));
        assert!(!PageStatus::Persisted.can_transition_to(PageStatus::PersistFailed));
        assert!(!PageStatus::Cancelled.can_transition_to(PageStatus::Fetching));
    }

    #[test]
    fn test_active_states_can_fail_persistently() {
        for state in PageStatus::all_states() {
            assert_eq!(
                state.can_transition_to(PageStatus::PersistFailed),
                !state.is_terminal(),
                "{}",
                state
            );
        }
    }

    #[test]
    fn test_string_roundtrip() {
        for state in PageStatus::all_states() {
            assert_eq!(PageStatus::parse(state.as_str()), Some(state));
        }
        assert_eq!(PageStatus::parse("rewritten"), None);
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&PageStatus::FetchFailed).unwrap();
        assert_eq!(json, "\"fetch_failed\"");
    }

    #[test]
    fn test_success_and_error() {
        assert!(PageStatus::Persisted.is_success());
        assert!(!PageStatus::Cancelled.is_success());
        assert!(PageStatus::FetchFailed.is_error());
        assert!(PageStatus::PersistFailed.is_error());
        assert!(!PageStatus::Cancelled.is_error());
    }
}
