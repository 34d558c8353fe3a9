//! Tracker record types for the beads workflow coordinator.
//!
//! These are the typed shapes produced by [`crate::parser`] from tracker CLI
//! output. They are ephemeral: every query rebuilds them, and nothing in this
//! crate mutates a record after parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority assigned when the tracker omits one.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Issue type assigned when the tracker omits one.
pub const DEFAULT_ISSUE_TYPE: &str = "task";

/// Lifecycle status of an issue as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Closed,
    /// Any status string this crate does not model explicitly.
    #[serde(untagged)]
    Other(String),
}

impl IssueStatus {
    /// Maps a raw tracker status string onto a variant.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "open" => Self::Open,
            "in_progress" => Self::InProgress,
            "closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the tracker's spelling of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `ready` / `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub priority: u8,
    pub status: IssueStatus,
}

impl IssueSummary {
    /// Creates a summary with default type, priority and status.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            priority: DEFAULT_PRIORITY,
            status: IssueStatus::Open,
        }
    }
}

/// A tracker comment. Append-only from the tracker's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: String,
    pub author: String,
    pub text: String,
    /// Raw timestamp as reported; may not parse.
    pub created_at: String,
}

/// Output of `show <id> --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub summary: IssueSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` when the tracker omitted the field entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

impl IssueDetail {
    /// Comments in tracker order, or an empty slice.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        self.comments.as_deref().unwrap_or(&[])
    }
}

/// One edge of `dep list` output, oriented by the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub issue_id: String,
    /// Raw `depends_on_id`; `None` for rows that only carry a plain `id`.
    pub depends_on_id: Option<String>,
    pub related_id: String,
    pub relation: String,
    /// Summary of the issue on the other side of the edge.
    pub related: IssueSummary,
}

/// Output of `info --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerInfo {
    pub mode: String,
    pub issue_count: u64,
}

/// Whether the tracker's data directory is committed to version control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingMode {
    /// Data directory is ignored by git.
    Stealth,
    /// Data directory is committed.
    GitTracked,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stealth => f.write_str("stealth"),
            Self::GitTracked => f.write_str("git-tracked"),
        }
    }
}

/// Result of the session-start probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMode {
    pub is_tracker_project: bool,
    pub workflow_enabled: bool,
}

/// A commit parsed from `git commit` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
}

/// The action tool's verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ready,
    Show,
    Claim,
    Close,
    Comment,
    Create,
    Status,
}

impl Action {
    /// All actions in tool-schema order.
    pub const ALL: [Action; 7] = [
        Action::Ready,
        Action::Show,
        Action::Claim,
        Action::Close,
        Action::Comment,
        Action::Create,
        Action::Status,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Show => "show",
            Self::Claim => "claim",
            Self::Close => "close",
            Self::Comment => "comment",
            Self::Create => "create",
            Self::Status => "status",
        }
    }

    /// Actions that change tracker state and so refresh the status line.
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Create | Self::Claim | Self::Close)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_known_values() {
        for raw in ["open", "in_progress", "closed"] {
            assert_eq!(IssueStatus::from_raw(raw).as_str(), raw);
        }
    }

    #[test]
    fn status_keeps_unknown_values() {
        let status = IssueStatus::from_raw("tombstone");
        assert_eq!(status, IssueStatus::Other("tombstone".to_string()));
        assert_eq!(status.to_string(), "tombstone");
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let other: IssueStatus = serde_json::from_str("\"deferred\"").unwrap();
        assert_eq!(other, IssueStatus::Other("deferred".to_string()));
    }

    #[test]
    fn summary_serializes_type_field() {
        let issue = IssueSummary::new("bd-1", "Do thing");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "task");
        assert_eq!(json["priority"], 2);
        assert_eq!(json["status"], "open");
    }

    #[test]
    fn detail_flattens_summary() {
        let detail = IssueDetail {
            summary: IssueSummary::new("bd-1", "Do thing"),
            description: None,
            comments: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "bd-1");
        assert!(json.get("comments").is_none());
        assert!(detail.comments().is_empty());
    }

    #[test]
    fn tracking_mode_display() {
        assert_eq!(TrackingMode::Stealth.to_string(), "stealth");
        assert_eq!(TrackingMode::GitTracked.to_string(), "git-tracked");
    }

    #[test]
    fn action_parse_and_display() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert!("delete".parse::<Action>().is_err());
    }

    #[test]
    fn mutating_actions() {
        let mutating: Vec<_> = Action::ALL.into_iter().filter(|a| a.is_mutating()).collect();
        assert_eq!(mutating, vec![Action::Claim, Action::Close, Action::Create]);
    }
}
