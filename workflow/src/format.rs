//! Text rendering for notifications, tool output and prompt injection.
//!
//! Everything here is a pure function of its arguments. Callers that need a
//! clock pass `now` explicitly so output is reproducible in tests.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::parser::{parse_created_id, UNKNOWN_CREATED_ID};
use crate::recovery::RecoveryContext;
use crate::types::{Action, Comment, IssueDetail, IssueSummary, TrackingMode};

/// Returned by the action tool whenever the workflow is disabled.
pub const MODE_OFF_MESSAGE: &str = "Beads mode is off. Enable with /beads-mode on (or Ctrl+B).";

/// Shown (and, for the close command, queued for the model) when the tree is
/// dirty after an issue is closed.
pub const DIRTY_TREE_CLOSE_WARNING: &str = "Working tree has uncommitted changes after closing the issue. \
Commit them now with a semantic-commit message (for example `feat: ...` or `fix: ...`) \
that references the closed issue.";

/// Reason given when a bare `br close` is attempted on a dirty tree.
pub const CLOSE_BLOCK_REASON: &str =
    "Cannot run `br close` with uncommitted changes. Commit/stash first, then close the issue.";

/// User-facing half of the checkpoint nudge.
pub const CHECKPOINT_NUDGE_NOTICE: &str = "Consider checkpointing your progress to the beads issue.";

const GUARDRAIL: &str = "Use beads for ALL task tracking. \
Do NOT use TodoWrite or any separate in-chat todo list.";

const WORKFLOW_LOOP: &str = "## Workflow
- Find unblocked work: `br ready` (or the beads tool, action `ready`)
- Claim before starting: `br update <id> --status in_progress`
- Checkpoint progress: `br comments add <id> \"<what changed, what is next>\"`
- Commit with a semantic message, then close: `br close <id> --reason \"<how it was verified>\"`
- Record discovered work: `br create \"<title>\" --type task --priority 2`";

const DESCRIPTION_LIMIT: usize = 120;
const TRAIL_COMMENT_LIMIT: usize = 200;
const TRAIL_LENGTH: usize = 5;
const RECOVERY_FILE_LIMIT: usize = 15;
const FILE_LIST_LIMIT: usize = 30;
const CHECKPOINT_FILE_LIMIT: usize = 20;

// ============================================================================
// Issues
// ============================================================================

/// `"<id> P<priority> <title>"`.
#[must_use]
pub fn format_issue_label(issue: &IssueSummary) -> String {
    format!("{} P{} {}", issue.id, issue.priority, issue.title)
}

/// `"none"`, `"<id> — <title>"`, or `"<id> — <title> +<n-1>"`.
#[must_use]
pub fn summarize_in_progress(issues: &[IssueSummary]) -> String {
    match issues {
        [] => "none".to_string(),
        [only] => format!("{} — {}", only.id, only.title),
        [first, rest @ ..] => format!("{} — {} +{}", first.id, first.title, rest.len()),
    }
}

/// Renders an issue as up to three lines: header, description, last comment.
#[must_use]
pub fn format_issue_card(issue: &IssueDetail) -> Vec<String> {
    let summary = &issue.summary;
    let mut lines = vec![format!(
        "{} — {} · {} · {} · P{}",
        summary.id, summary.title, summary.status, summary.issue_type, summary.priority
    )];

    if let Some(description) = issue.description.as_deref().map(collapse_whitespace) {
        if !description.is_empty() {
            lines.push(truncate(&description, DESCRIPTION_LIMIT));
        }
    }

    if let Some(last) = issue.comments().last() {
        lines.push(collapse_whitespace(&last.text));
    }

    lines
}

// ============================================================================
// Status Line
// ============================================================================

/// Inputs to the status-bar label.
#[derive(Debug, Clone, Default)]
pub struct StatusLine<'a> {
    pub workflow_enabled: bool,
    pub is_tracker_project: bool,
    pub mode_text: &'a str,
    pub issue_count: usize,
    pub in_progress: &'a [IssueSummary],
}

/// Renders the status-bar label.
///
/// ```
/// use beads_workflow::format::{format_mode_status, StatusLine};
///
/// let off = StatusLine::default();
/// assert_eq!(format_mode_status(&off), "beads: off");
/// ```
#[must_use]
pub fn format_mode_status(line: &StatusLine<'_>) -> String {
    if !line.workflow_enabled {
        return "beads: off".to_string();
    }
    if !line.is_tracker_project {
        return "beads: on (no project)".to_string();
    }
    format!(
        "beads: {} · {} issue(s) · in-progress: {}",
        line.mode_text,
        line.issue_count,
        summarize_in_progress(line.in_progress)
    )
}

/// `"stealth (sqlite)"` / `"git-tracked (jsonl)"`.
#[must_use]
pub fn format_mode_text(mode: TrackingMode, backend: &str) -> String {
    format!("{mode} ({backend})")
}

// ============================================================================
// Checkpoints and Recovery
// ============================================================================

/// Renders the last five comments as `"- [<age> ago] <text>"` lines.
#[must_use]
pub fn format_checkpoint_trail(comments: &[Comment], now: DateTime<Utc>) -> Vec<String> {
    let start = comments.len().saturating_sub(TRAIL_LENGTH);
    comments[start..]
        .iter()
        .map(|comment| {
            let text = truncate(&collapse_whitespace(&comment.text), TRAIL_COMMENT_LIMIT);
            match relative_age(&comment.created_at, now) {
                Some(age) => format!("- [{age} ago] {text}"),
                None => format!("- [unknown] {text}"),
            }
        })
        .collect()
}

/// Buckets the distance from `created_at` to `now` into minutes, hours or days.
fn relative_age(created_at: &str, now: DateTime<Utc>) -> Option<String> {
    let created = DateTime::parse_from_rfc3339(created_at.trim()).ok()?;
    let minutes = (now - created.with_timezone(&Utc)).num_minutes().max(0);
    Some(if minutes < 60 {
        format!("{minutes}m")
    } else if minutes < 60 * 24 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / (60 * 24))
    })
}

/// Builds the prompt block injected when an in-progress issue is resumed.
///
/// Section order is fixed: guardrail, resuming header, parent, unblocks,
/// checkpoint trail, uncommitted files. Empty sections are omitted.
#[must_use]
pub fn format_recovery_message(ctx: &RecoveryContext) -> String {
    let issue = &ctx.issue;
    let mut out = format!("# Beads Workflow Context\n\n{GUARDRAIL}\n\n");

    out.push_str(&format!(
        "## Resuming: {} — {} ({}, {}, P{})\n",
        issue.id, issue.title, issue.status, issue.issue_type, issue.priority
    ));

    if let Some(parent) = &ctx.parent {
        out.push_str(&format!("Parent: {} — {}\n", parent.id, parent.title));
    }

    if !ctx.unblocks.is_empty() {
        let list: Vec<String> = ctx
            .unblocks
            .iter()
            .map(|i| format!("{} — {}", i.id, i.title))
            .collect();
        out.push_str(&format!("Unblocks: {}\n", list.join(", ")));
    }

    if !ctx.checkpoint_trail.is_empty() {
        out.push_str("\n### Checkpoint Trail\n");
        for line in &ctx.checkpoint_trail {
            out.push_str(line);
            out.push('\n');
        }
    }

    if !ctx.uncommitted_files.is_empty() {
        out.push_str("\n### Uncommitted changes:\n");
        push_capped_list(&mut out, ctx.uncommitted_files.as_slice(), RECOVERY_FILE_LIMIT);
    }

    out.push_str(
        "\nContinue this issue. Checkpoint with `br comments add` as you go and close it before claiming new work.",
    );
    out
}

/// The priming message for a turn with no issue to resume.
///
/// Empty when the workflow is disabled. `resume_context` is appended verbatim.
#[must_use]
pub fn build_prime_message(workflow_enabled: bool, resume_context: Option<&str>) -> String {
    if !workflow_enabled {
        return String::new();
    }
    let mut out = format!("# Beads Workflow Context\n\n{GUARDRAIL}\n\n{WORKFLOW_LOOP}");
    if let Some(resume) = resume_context.map(str::trim).filter(|r| !r.is_empty()) {
        out.push_str("\n\n");
        out.push_str(resume);
    }
    out
}

/// Comment body listing files touched while an issue was active.
///
/// `None` when nothing was touched.
#[must_use]
pub fn format_file_list_comment(files: &BTreeSet<String>) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    let list: Vec<&String> = files.iter().collect();
    let mut out = String::from("Files modified:\n");
    push_capped_list(&mut out, list.as_slice(), FILE_LIST_LIMIT);
    Some(out.trim_end().to_string())
}

/// Comment body recorded automatically before context compaction.
#[must_use]
pub fn build_checkpoint_summary(files: &BTreeSet<String>, turns_since_checkpoint: u64) -> String {
    let mut out = format!(
        "Auto-checkpoint before context compaction: {} since the last checkpoint.",
        plural_turns(turns_since_checkpoint)
    );
    if !files.is_empty() {
        let list: Vec<&String> = files.iter().collect();
        out.push_str("\nFiles touched:\n");
        push_capped_list(&mut out, list.as_slice(), CHECKPOINT_FILE_LIMIT);
    }
    out.trim_end().to_string()
}

/// Model-visible reminder that a checkpoint is overdue.
#[must_use]
pub fn build_checkpoint_nudge(issue_id: &str, turns_since_checkpoint: u64) -> String {
    format!(
        "It has been {} since the last checkpoint on {issue_id}. \
Record progress now with `br comments add {issue_id} \"<what changed, what is next>\"` \
(or the beads tool, action `comment`) so the work survives compaction.",
        plural_turns(turns_since_checkpoint)
    )
}

/// Follow-up sent after a tool-driven close so the agent keeps going.
#[must_use]
pub fn build_continue_message(closed_id: &str) -> String {
    format!(
        "{closed_id} is closed. Run `br ready` (or the beads tool, action `ready`) to pick the next issue, \
claim it, and keep working. If there are no ready issues, summarize what was completed and stop."
    )
}

/// One-shot warning that the context window is nearly full.
#[must_use]
pub fn build_context_reminder(usage_percent: f64) -> String {
    format!(
        "Context is at {}%. Checkpoint your current progress to the beads issue now, then run /compact.",
        usage_percent.round()
    )
}

// ============================================================================
// Ready List
// ============================================================================

/// A ready issue with its dependency neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedIssue {
    pub issue: IssueSummary,
    pub parent: Option<IssueSummary>,
    pub unblocks: Vec<IssueSummary>,
}

impl EnrichedIssue {
    /// An issue shown without dependency lookups.
    pub fn bare(issue: IssueSummary) -> Self {
        Self {
            issue,
            parent: None,
            unblocks: Vec::new(),
        }
    }
}

/// Renders the ready list with `↳ parent:` and `↳ unblocks:` annotations.
#[must_use]
pub fn format_enriched_ready(issues: &[EnrichedIssue]) -> String {
    if issues.is_empty() {
        return "No ready issues.".to_string();
    }

    let mut lines = Vec::with_capacity(issues.len());
    for entry in issues {
        lines.push(format!(
            "{} [{}]",
            format_issue_label(&entry.issue),
            entry.issue.issue_type
        ));
        if let Some(parent) = &entry.parent {
            lines.push(format!("  ↳ parent: {} — {}", parent.id, parent.title));
        }
        if !entry.unblocks.is_empty() {
            let list: Vec<String> = entry
                .unblocks
                .iter()
                .map(|i| format!("{} — {}", i.id, i.title))
                .collect();
            lines.push(format!("  ↳ unblocks: {}", list.join(", ")));
        }
    }
    lines.join("\n")
}

// ============================================================================
// Action Results
// ============================================================================

/// One-line digest of an action's stdout.
#[must_use]
pub fn summarize_action_result(action: Action, stdout: &str) -> String {
    match action {
        Action::Create => summarize_create(stdout),
        Action::Status => summarize_stats(stdout),
        Action::Ready => {
            let trimmed = stdout.trim();
            if trimmed.is_empty() {
                return "No ready issues".to_string();
            }
            let count = match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(serde_json::Value::Array(items)) => items.len(),
                _ => trimmed.lines().filter(|l| !l.trim().is_empty()).count(),
            };
            if count == 0 {
                "No ready issues".to_string()
            } else {
                format!("{count} ready issue(s)")
            }
        }
        Action::Claim => first_line_or(stdout, "Issue claimed"),
        Action::Close => first_line_or(stdout, "Issue closed"),
        Action::Show => first_line_or(stdout, "Issue details"),
        Action::Comment => "Comment added".to_string(),
    }
}

fn summarize_create(stdout: &str) -> String {
    let id = parse_created_id(stdout);
    if id == UNKNOWN_CREATED_ID {
        return first_line_or(stdout, "Issue created");
    }
    let title = stdout
        .lines()
        .find(|line| line.contains("Created"))
        .and_then(|line| line.split_once(&format!("{id}:")))
        .map(|(_, rest)| rest.trim())
        .filter(|t| !t.is_empty());
    match title {
        Some(title) => format!("Created {id} — {title}"),
        None => format!("Created {id}"),
    }
}

fn summarize_stats(stdout: &str) -> String {
    let field = |prefix: &str| -> u64 {
        stdout
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(prefix))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    };
    format!(
        "{} total, {} open, {} in-progress, {} closed",
        field("Total Issues:"),
        field("Open:"),
        field("In Progress:"),
        field("Closed:")
    )
}

// ============================================================================
// Observability
// ============================================================================

/// Lifecycle events that can produce a diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent<'a> {
    MessageStart,
    ToolExecutionUpdate,
    ToolExecutionEnd { tool_name: &'a str, is_error: bool },
}

/// Diagnostic line for a lifecycle event, or `None` when diagnostics are off
/// or the event is too noisy to report.
#[must_use]
pub fn build_observability_summary(enabled: bool, event: &ObservedEvent<'_>) -> Option<String> {
    if !enabled {
        return None;
    }
    match event {
        ObservedEvent::MessageStart => Some("beads observe: message_start".to_string()),
        ObservedEvent::ToolExecutionUpdate => None,
        ObservedEvent::ToolExecutionEnd {
            tool_name,
            is_error,
        } => Some(format!(
            "beads observe: tool_execution_end {tool_name} ({})",
            if *is_error { "error" } else { "ok" }
        )),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Truncates to at most `limit` characters, ending in `...` when cut.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_line_or(stdout: &str, fallback: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn plural_turns(n: u64) -> String {
    if n == 1 {
        "1 turn".to_string()
    } else {
        format!("{n} turns")
    }
}

fn push_capped_list<S: AsRef<str>>(out: &mut String, items: &[S], limit: usize) {
    for item in items.iter().take(limit) {
        out.push_str("- ");
        out.push_str(item.as_ref());
        out.push('\n');
    }
    if items.len() > limit {
        out.push_str(&format!("- and {} more\n", items.len() - limit));
    }
}
