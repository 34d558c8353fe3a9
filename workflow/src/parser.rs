//! Parsers for tracker and version-control CLI output.
//!
//! Every function here is pure and total. Given arbitrary input it returns
//! either a typed value or an "absent" value (`None` / empty `Vec`); nothing
//! panics and nothing returns an error. Malformed records inside otherwise
//! valid output are dropped individually rather than failing the batch.
//!
//! # Tracker Output Contracts
//!
//! | Invocation | Shape | Parser |
//! |------------|-------|--------|
//! | `ready --json`, `list --json` | array of issue objects | [`parse_issue_list`] |
//! | `show <id> --json` | array, first element used | [`parse_show`] |
//! | `dep list <id> --direction up\|down --json` | array of edge objects | [`parse_dep_list`] |
//! | `info --json` | `{mode, issue_count}` | [`parse_info`] |
//! | `create ...` | free text containing `Created <id>` | [`parse_created_id`] |
//!
//! # Example Usage
//!
//! ```
//! use beads_workflow::parser::parse_issue_list;
//!
//! let json = r#"[{"id":"bd-1","title":"Do thing","issue_type":"feature","priority":1}]"#;
//! let issues = parse_issue_list(json);
//! assert_eq!(issues[0].issue_type, "feature");
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::ExecResult;
use crate::types::{
    Comment, CommitInfo, DependencyEdge, IssueDetail, IssueStatus, IssueSummary, SessionMode,
    TrackerInfo, TrackingMode, DEFAULT_ISSUE_TYPE, DEFAULT_PRIORITY,
};
use crate::utils::tokenize::starts_with_words;

/// The word agents type to invoke the tracker.
pub const TRACKER_COMMAND: &str = "br";

/// Fallback id when `create` output does not name the new issue.
pub const UNKNOWN_CREATED_ID: &str = "???";

/// Relation assigned to dependency edges that do not name one.
const DEFAULT_RELATION: &str = "blocks";

/// Fields naming an issue's type in list and show output.
const ISSUE_TYPE_KEYS: &[&str] = &["type", "issue_type"];

/// On dependency edges `type` is the relation, so only `issue_type` counts.
const EDGE_TYPE_KEYS: &[&str] = &["issue_type"];

/// Which field of a dependency edge names the related issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedField {
    /// `issue_id`: the dependent side of the edge.
    IssueId,
    /// `depends_on_id`: the dependency side of the edge.
    DependsOnId,
    /// Plain `id`, for outputs that list issues rather than edges.
    Id,
}

impl RelatedField {
    fn key(self) -> &'static str {
        match self {
            Self::IssueId => "issue_id",
            Self::DependsOnId => "depends_on_id",
            Self::Id => "id",
        }
    }
}

// ============================================================================
// Tracker JSON
// ============================================================================

/// Parses `ready` / `list` JSON output.
///
/// Objects without a string `id` or `title` are dropped. The type may be
/// given as `type` or `issue_type`; priority defaults to 2 and status to
/// `open`.
#[must_use]
pub fn parse_issue_list(output: &str) -> Vec<IssueSummary> {
    let Some(items) = parse_array(output) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| issue_from_object(obj, "id", ISSUE_TYPE_KEYS))
        .collect()
}

/// Parses `show <id> --json` output.
///
/// Only the first element is used. Comments missing any of `id`,
/// `issue_id` (or `issueId`), `author`, `text` or `created_at` are dropped.
#[must_use]
pub fn parse_show(output: &str) -> Option<IssueDetail> {
    let items = parse_array(output)?;
    let obj = items.first()?.as_object()?;
    let summary = issue_from_object(obj, "id", ISSUE_TYPE_KEYS)?;

    let description = str_field(obj, "description").map(str::to_string);

    let comments = obj.get("comments").and_then(Value::as_array).map(|raw| {
        let parsed: Vec<Comment> = raw
            .iter()
            .filter_map(Value::as_object)
            .filter_map(comment_from_object)
            .collect();
        if parsed.len() < raw.len() {
            debug!(
                issue_id = %summary.id,
                dropped = raw.len() - parsed.len(),
                "Dropped malformed comments"
            );
        }
        parsed
    });

    Some(IssueDetail {
        summary,
        description,
        comments,
    })
}

/// Parses `dep list` JSON output.
///
/// `related` selects the field naming the issue on the other side of each
/// edge. When that field is missing the edge's plain `id` is used instead.
#[must_use]
pub fn parse_dep_list(output: &str, related: RelatedField) -> Vec<DependencyEdge> {
    let Some(items) = parse_array(output) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let related_key = if str_field(obj, related.key()).is_some() {
                related.key()
            } else {
                "id"
            };
            let summary = issue_from_object(obj, related_key, EDGE_TYPE_KEYS)?;
            let issue_id = str_field(obj, "issue_id")
                .unwrap_or(&summary.id)
                .to_string();
            let relation = str_field(obj, "type")
                .or_else(|| str_field(obj, "dep_type"))
                .unwrap_or(DEFAULT_RELATION)
                .to_string();

            Some(DependencyEdge {
                issue_id,
                depends_on_id: str_field(obj, "depends_on_id").map(str::to_string),
                related_id: summary.id.clone(),
                relation,
                related: summary,
            })
        })
        .collect()
}

/// Parses `info --json` output.
#[must_use]
pub fn parse_info(output: &str) -> Option<TrackerInfo> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let obj = value.as_object()?;

    Some(TrackerInfo {
        mode: str_field(obj, "mode")?.to_string(),
        issue_count: obj.get("issue_count").and_then(Value::as_u64).unwrap_or(0),
    })
}

/// Recovers the new issue id from `create` output, or `"???"`.
///
/// Looks for the first `Created <token>`; a trailing `:` is stripped.
#[must_use]
pub fn parse_created_id(stdout: &str) -> String {
    let mut rest = stdout;
    while let Some(pos) = rest.find("Created") {
        let after = &rest[pos + "Created".len()..];
        if after.starts_with(char::is_whitespace) {
            let token = after
                .trim_start()
                .split_whitespace()
                .next()
                .map(|t| t.trim_end_matches(':'))
                .unwrap_or("");
            if !token.is_empty() {
                return token.to_string();
            }
        }
        rest = after;
    }
    UNKNOWN_CREATED_ID.to_string()
}

// ============================================================================
// Probes
// ============================================================================

/// Maps the `info --json` probe exit code to the session's initial mode.
#[must_use]
pub fn parse_session_mode(info_exit_code: i32) -> SessionMode {
    let ok = info_exit_code == 0;
    SessionMode {
        is_tracker_project: ok,
        workflow_enabled: ok,
    }
}

/// Maps the `git check-ignore .beads/` exit code to a tracking mode.
///
/// Exit 0 means the data directory is ignored.
#[must_use]
pub fn detect_tracking_mode(check_ignore_exit_code: i32) -> TrackingMode {
    if check_ignore_exit_code == 0 {
        TrackingMode::Stealth
    } else {
        TrackingMode::GitTracked
    }
}

// ============================================================================
// Version Control
// ============================================================================

/// Parses line-based `git status --porcelain` output into `"<path> (<tag>)"`.
///
/// Renames and copies (`old -> new`) keep the destination path.
#[must_use]
pub fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (tag, rest) = split_status_entry(line)?;
            let path = rest.rsplit_once(" -> ").map_or(rest, |(_, to)| to);
            Some(format!("{path} ({tag})"))
        })
        .collect()
}

/// Parses NUL-separated `git status --porcelain -z` output.
///
/// In this mode a rename or copy entry is followed by a separate entry with
/// the source path, which is skipped.
#[must_use]
pub fn parse_porcelain_z(output: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut entries = output.split('\0').filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        let Some((tag, path)) = split_status_entry(entry) else {
            continue;
        };
        if tag == 'R' || tag == 'C' {
            entries.next();
        }
        files.push(format!("{path} ({tag})"));
    }

    files
}

/// Splits `"XY path"` into the single-letter tag and the path.
fn split_status_entry(entry: &str) -> Option<(char, &str)> {
    let code = entry.get(..2)?;
    let path = entry.get(3..)?.trim();
    if path.is_empty() {
        return None;
    }
    let tag = code.trim().chars().next()?;
    Some((tag, path))
}

/// Extracts the hash and subject from `git commit` output.
///
/// Matches the first line shaped `[<branch...> <hash>] <message>`, where the
/// hash is 7 to 40 hex digits.
#[must_use]
pub fn parse_git_commit_output(output: &str) -> Option<CommitInfo> {
    output.lines().find_map(|line| {
        let line = line.trim();
        let inner = line.strip_prefix('[')?;
        let (header, message) = inner.split_once(']')?;

        let mut words = header.split_whitespace();
        let hash = words.next_back()?;
        words.next()?;
        let is_hash =
            (7..=40).contains(&hash.len()) && hash.chars().all(|c| c.is_ascii_hexdigit());
        let message = message.trim();
        if !is_hash || message.is_empty() {
            return None;
        }

        Some(CommitInfo {
            hash: hash.to_string(),
            message: message.to_string(),
        })
    })
}

// ============================================================================
// Command Detection
// ============================================================================

/// Any command whose leading word is the tracker.
#[must_use]
pub fn is_tracker_command(command: &str) -> bool {
    starts_with_words(command, &[TRACKER_COMMAND])
}

/// Exactly a leading `br close` invocation.
///
/// ```
/// use beads_workflow::parser::is_tracker_close_command;
///
/// assert!(is_tracker_close_command("br close abc"));
/// assert!(!is_tracker_close_command("echo br close"));
/// assert!(!is_tracker_close_command("bash -lc 'br close abc'"));
/// ```
#[must_use]
pub fn is_tracker_close_command(command: &str) -> bool {
    starts_with_words(command, &[TRACKER_COMMAND, "close"])
}

/// A leading `br comments add` invocation.
#[must_use]
pub fn is_tracker_comment_add_command(command: &str) -> bool {
    starts_with_words(command, &[TRACKER_COMMAND, "comments", "add"])
}

/// A leading `git commit` invocation.
#[must_use]
pub fn is_git_commit_command(command: &str) -> bool {
    starts_with_words(command, &["git", "commit"])
}

/// Returns the edited path for `write` and `edit` tool calls.
#[must_use]
pub fn extract_edited_file_path(tool_name: &str, input: &Value) -> Option<String> {
    if tool_name != "write" && tool_name != "edit" {
        return None;
    }
    input
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
}

// ============================================================================
// Error Summaries
// ============================================================================

/// Produces a one-line summary of raw process output.
///
/// A JSON body of the form `{"error": {"message", "hint"}}` yields
/// `"message (hint)"`, `"message"` or `"hint"`. Anything else yields the
/// first non-blank line. Blank or missing input yields `None`.
#[must_use]
pub fn extract_error_summary(output: Option<&str>) -> Option<String> {
    let trimmed = output?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(error) = obj.get("error").and_then(Value::as_object) {
            let message = str_field(error, "message").map(str::trim).unwrap_or("");
            let hint = str_field(error, "hint").map(str::trim).unwrap_or("");
            match (message.is_empty(), hint.is_empty()) {
                (false, false) => return Some(format!("{message} ({hint})")),
                (false, true) => return Some(message.to_string()),
                (true, false) => return Some(hint.to_string()),
                (true, true) => {}
            }
        }
    }

    trimmed
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Summarizes a failed call from stderr, then stdout, then the exit code.
#[must_use]
pub fn summarize_exec_failure(result: &ExecResult) -> String {
    extract_error_summary(Some(&result.stderr))
        .or_else(|| extract_error_summary(Some(&result.stdout)))
        .unwrap_or_else(|| format!("Command failed with exit code {}", result.exit_code))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_array(output: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(output.trim()) {
        Ok(Value::Array(items)) => Some(items),
        Ok(_) => {
            debug!("Expected JSON array from tracker");
            None
        }
        Err(e) => {
            debug!(error = %e, "Tracker output is not JSON");
            None
        }
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn issue_from_object(
    obj: &Map<String, Value>,
    id_key: &str,
    type_keys: &[&str],
) -> Option<IssueSummary> {
    let id = str_field(obj, id_key)?;
    let title = str_field(obj, "title")?;

    let issue_type = type_keys
        .iter()
        .find_map(|key| str_field(obj, key))
        .unwrap_or(DEFAULT_ISSUE_TYPE);
    let priority = obj
        .get("priority")
        .and_then(Value::as_u64)
        .and_then(|p| u8::try_from(p).ok())
        .unwrap_or(DEFAULT_PRIORITY);
    let status = str_field(obj, "status")
        .map(IssueStatus::from_raw)
        .unwrap_or_default();

    Some(IssueSummary {
        id: id.to_string(),
        title: title.to_string(),
        issue_type: issue_type.to_string(),
        priority,
        status,
    })
}

fn comment_from_object(obj: &Map<String, Value>) -> Option<Comment> {
    Some(Comment {
        id: obj.get("id").and_then(Value::as_i64)?,
        issue_id: str_field(obj, "issue_id")
            .or_else(|| str_field(obj, "issueId"))?
            .to_string(),
        author: str_field(obj, "author")?.to_string(),
        text: str_field(obj, "text")?.to_string(),
        created_at: str_field(obj, "created_at")?.to_string(),
    })
}
