//! The `beads` action tool exposed to the agent.
//!
//! One tool, seven actions. Every call yields a [`ToolOutput`]; failures are
//! reported through `is_error` and typed [`ToolDetails`], never as Rust
//! errors. Rendering works from the typed details alone.

use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::ExecResult;
use crate::coordinator::Coordinator;
use crate::error::StateError;
use crate::format::{
    collapse_whitespace, format_enriched_ready, format_issue_card, summarize_action_result, truncate,
    EnrichedIssue, MODE_OFF_MESSAGE,
};
use crate::parser::{extract_error_summary, parse_created_id, parse_issue_list, parse_show};
use crate::recovery::dependency_neighbourhood;
use crate::types::{
    Action, IssueDetail, IssueStatus, IssueSummary, DEFAULT_ISSUE_TYPE, DEFAULT_PRIORITY,
};

/// Reason recorded when a close does not give one.
pub const DEFAULT_CLOSE_REASON: &str = "Verified: completed";

/// Per-call timeout for ready-list dependency lookups.
const ENRICH_TIMEOUT: Duration = Duration::from_millis(5_000);

const PREVIEW_LIMIT: usize = 60;

// ============================================================================
// Types
// ============================================================================

/// Arguments of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolInput {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            id: None,
            title: None,
            description: None,
            issue_type: None,
            priority: None,
            comment: None,
            reason: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A tracker invocation and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRun {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandRun {
    fn new(command: String, result: ExecResult) -> Self {
        Self {
            command,
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_code,
        }
    }

    fn text_or_ok(&self) -> String {
        let trimmed = self.stdout.trim();
        if trimmed.is_empty() {
            "OK".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Structured outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolDetails {
    /// The workflow is off; nothing ran.
    Disabled { action: Action },
    /// A required argument was absent or blank; nothing ran.
    Missing { action: Action, missing: &'static str },
    /// The call would break the one-active-issue rule; nothing ran.
    Rejected { action: Action, reason: String },
    /// The tracker call failed.
    Failed {
        action: Action,
        #[serde(flatten)]
        run: CommandRun,
    },
    Ready {
        #[serde(flatten)]
        run: CommandRun,
        issues: Vec<IssueSummary>,
    },
    Show {
        #[serde(flatten)]
        run: CommandRun,
        issue_card: Option<IssueDetail>,
    },
    Claim {
        #[serde(flatten)]
        run: CommandRun,
    },
    Close {
        #[serde(flatten)]
        run: CommandRun,
        close_warning: Option<String>,
    },
    Comment {
        #[serde(flatten)]
        run: CommandRun,
        comment_text: String,
    },
    Create {
        #[serde(flatten)]
        run: CommandRun,
        issue_card: IssueDetail,
    },
    Status {
        #[serde(flatten)]
        run: CommandRun,
    },
}

impl ToolDetails {
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Disabled { action }
            | Self::Missing { action, .. }
            | Self::Rejected { action, .. }
            | Self::Failed { action, .. } => *action,
            Self::Ready { .. } => Action::Ready,
            Self::Show { .. } => Action::Show,
            Self::Claim { .. } => Action::Claim,
            Self::Close { .. } => Action::Close,
            Self::Comment { .. } => Action::Comment,
            Self::Create { .. } => Action::Create,
            Self::Status { .. } => Action::Status,
        }
    }
}

/// Result handed back to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
    pub details: ToolDetails,
}

impl ToolOutput {
    fn success(text: String, details: ToolDetails) -> Self {
        Self {
            text,
            is_error: false,
            details,
        }
    }

    fn error(text: String, details: ToolDetails) -> Self {
        Self {
            text,
            is_error: true,
            details,
        }
    }
}

/// Early exit from an action; both sides are reported to the agent.
type ActionResult = Result<ToolOutput, ToolOutput>;

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, action: Action, what: &'static str) -> Result<&'a str, ToolOutput> {
    non_blank(value).ok_or_else(|| {
        ToolOutput::error(
            format!("beads {action} requires {what}"),
            ToolDetails::Missing {
                action,
                missing: what,
            },
        )
    })
}

fn failure_summary(stderr: &str, stdout: &str) -> Option<String> {
    extract_error_summary(Some(stderr)).or_else(|| extract_error_summary(Some(stdout)))
}

// ============================================================================
// Execution
// ============================================================================

impl Coordinator {
    /// Runs one tool call.
    pub async fn execute_tool(&mut self, input: ToolInput) -> ToolOutput {
        let action = input.action;
        if !self.state.workflow_enabled() {
            return ToolOutput::success(MODE_OFF_MESSAGE.to_string(), ToolDetails::Disabled { action });
        }

        let result = match action {
            Action::Ready => self.tool_ready().await,
            Action::Show => self.tool_show(&input).await,
            Action::Claim => self.tool_claim(&input).await,
            Action::Close => self.tool_close(&input).await,
            Action::Comment => self.tool_comment(&input).await,
            Action::Create => self.tool_create(&input).await,
            Action::Status => self.tool_status().await,
        };
        let output = result.unwrap_or_else(|failed| failed);

        if output.is_error {
            warn!(action = %action, text = %output.text, "beads tool action failed");
        } else {
            info!(action = %action, "beads tool action completed");
        }
        output
    }

    /// Runs a tracker call, mapping failure to an error output.
    async fn run_action(&self, action: Action, args: &[&str]) -> Result<CommandRun, ToolOutput> {
        let result = self.client.br(args).await;
        let ok = result.success();
        let run = CommandRun::new(self.client.command_line(args), result);
        if ok {
            return Ok(run);
        }

        let text = match failure_summary(&run.stderr, &run.stdout) {
            Some(summary) => format!("beads {action} failed: {summary}"),
            None => format!("beads {action} failed"),
        };
        Err(ToolOutput::error(text, ToolDetails::Failed { action, run }))
    }

    async fn tool_ready(&mut self) -> ActionResult {
        let run = self
            .run_action(Action::Ready, &["ready", "--sort", "priority", "--json"])
            .await?;
        let issues = parse_issue_list(&run.stdout);
        let enriched = self.enrich_ready(&issues).await;
        Ok(ToolOutput::success(
            format_enriched_ready(&enriched),
            ToolDetails::Ready { run, issues },
        ))
    }

    /// Looks up parents and dependents for the first `enrich_limit` issues
    /// concurrently; the rest are shown bare.
    async fn enrich_ready(&self, issues: &[IssueSummary]) -> Vec<EnrichedIssue> {
        let limit = self.settings.enrich_limit.min(issues.len());
        let (head, tail) = issues.split_at(limit);
        let client = &self.client;

        let mut enriched = join_all(head.iter().map(|issue| async move {
            let (parent, unblocks) = dependency_neighbourhood(client, &issue.id, Some(ENRICH_TIMEOUT)).await;
            EnrichedIssue {
                issue: issue.clone(),
                parent,
                unblocks,
            }
        }))
        .await;
        enriched.extend(tail.iter().cloned().map(EnrichedIssue::bare));
        enriched
    }

    async fn tool_show(&mut self, input: &ToolInput) -> ActionResult {
        let id = required(input.id.as_deref(), Action::Show, "id")?;
        let run = self.run_action(Action::Show, &["show", id, "--json"]).await?;
        let issue_card = parse_show(&run.stdout);
        Ok(ToolOutput::success(
            run.text_or_ok(),
            ToolDetails::Show { run, issue_card },
        ))
    }

    async fn tool_claim(&mut self, input: &ToolInput) -> ActionResult {
        let id = required(input.id.as_deref(), Action::Claim, "id")?;
        if let Err(err) = self.state.check_claim(id) {
            return Err(rejected(Action::Claim, &err));
        }

        let run = self
            .run_action(Action::Claim, &["update", id, "--status", "in_progress"])
            .await?;
        if let Err(err) = self.state.claim(id) {
            return Err(rejected(Action::Claim, &err));
        }
        self.refresh_status().await;
        Ok(ToolOutput::success(run.text_or_ok(), ToolDetails::Claim { run }))
    }

    async fn tool_close(&mut self, input: &ToolInput) -> ActionResult {
        let id = required(input.id.as_deref(), Action::Close, "id")?;
        let reason = non_blank(input.reason.as_deref()).unwrap_or(DEFAULT_CLOSE_REASON);

        self.flush_file_list(id).await;
        let run = self
            .run_action(Action::Close, &["close", id, "--reason", reason])
            .await?;
        self.state.close(id);
        self.send_continue_message(id);
        self.refresh_status().await;

        let close_warning = self.nudge_commit_after_close(false).await;
        let mut text = run.text_or_ok();
        if let Some(warning) = close_warning {
            text.push_str("\n\n");
            text.push_str(warning);
        }
        Ok(ToolOutput::success(
            text,
            ToolDetails::Close {
                run,
                close_warning: close_warning.map(str::to_string),
            },
        ))
    }

    async fn tool_comment(&mut self, input: &ToolInput) -> ActionResult {
        let id = required(input.id.as_deref(), Action::Comment, "id")?;
        let comment = required(input.comment.as_deref(), Action::Comment, "comment text")?;

        let run = self
            .run_action(Action::Comment, &["comments", "add", id, comment])
            .await?;
        self.state.checkpoint_now();
        Ok(ToolOutput::success(
            run.text_or_ok(),
            ToolDetails::Comment {
                run,
                comment_text: comment.to_string(),
            },
        ))
    }

    async fn tool_create(&mut self, input: &ToolInput) -> ActionResult {
        let title = required(input.title.as_deref(), Action::Create, "title")?;
        let issue_type = non_blank(input.issue_type.as_deref()).unwrap_or(DEFAULT_ISSUE_TYPE);
        let priority = input.priority.unwrap_or(DEFAULT_PRIORITY);
        let priority_arg = priority.to_string();
        let description = non_blank(input.description.as_deref());

        let mut args = vec!["create", title, "--type", issue_type, "--priority", priority_arg.as_str()];
        if let Some(description) = description {
            args.extend(["--description", description]);
        }

        let run = self.run_action(Action::Create, &args).await?;
        self.refresh_status().await;

        let issue_card = IssueDetail {
            summary: IssueSummary {
                id: parse_created_id(&run.stdout),
                title: title.to_string(),
                issue_type: issue_type.to_string(),
                priority,
                status: IssueStatus::Open,
            },
            description: description.map(str::to_string),
            comments: None,
        };
        Ok(ToolOutput::success(
            run.text_or_ok(),
            ToolDetails::Create { run, issue_card },
        ))
    }

    async fn tool_status(&mut self) -> ActionResult {
        let run = self.run_action(Action::Status, &["stats"]).await?;
        Ok(ToolOutput::success(run.text_or_ok(), ToolDetails::Status { run }))
    }
}

fn rejected(action: Action, err: &StateError) -> ToolOutput {
    ToolOutput::error(
        format!("beads {action} failed: {err}"),
        ToolDetails::Rejected {
            action,
            reason: err.to_string(),
        },
    )
}

// ============================================================================
// Rendering
// ============================================================================

/// One-line rendering of a pending call.
#[must_use]
pub fn render_call(input: &ToolInput) -> String {
    let mut line = format!("beads {}", input.action);
    if let Some(id) = non_blank(input.id.as_deref()) {
        line.push(' ');
        line.push_str(id);
    }

    let preview = match input.action {
        Action::Create => input.title.as_deref(),
        Action::Comment => input.comment.as_deref(),
        Action::Close => input.reason.as_deref(),
        _ => None,
    };
    if let Some(preview) = non_blank(preview) {
        line.push_str(" — ");
        line.push_str(&truncate(&collapse_whitespace(preview), PREVIEW_LIMIT));
    }
    line
}

/// Renders a finished call; `expanded` appends the full output.
#[must_use]
pub fn render_result(output: &ToolOutput, expanded: bool) -> String {
    let action = output.details.action();
    let mut out = match &output.details {
        ToolDetails::Disabled { .. } => return output.text.clone(),
        ToolDetails::Missing { .. } | ToolDetails::Rejected { .. } => format!("✖ {}", output.text),
        ToolDetails::Failed { run, .. } => {
            let mut line = format!("✖ beads {action} failed");
            if let Some(summary) = failure_summary(&run.stderr, &run.stdout) {
                line.push_str(" — ");
                line.push_str(&summary);
            }
            if expanded {
                line.push_str(&format!("\n  $ {} (exit {})", run.command, run.exit_code));
                for stream in [&run.stderr, &run.stdout] {
                    let trimmed = stream.trim();
                    if !trimmed.is_empty() {
                        line.push_str("\n\n");
                        line.push_str(trimmed);
                    }
                }
            }
            return line;
        }
        ToolDetails::Show {
            issue_card: Some(card),
            ..
        }
        | ToolDetails::Create {
            issue_card: card, ..
        } => {
            let prefix = if action == Action::Create { "Created " } else { "" };
            render_card(&format_issue_card(card), prefix)
        }
        ToolDetails::Comment { comment_text, .. } => {
            let collapsed = collapse_whitespace(comment_text);
            format!("✓ Comment added\n  \"{}\"", truncate(&collapsed, PREVIEW_LIMIT))
        }
        ToolDetails::Close { run, close_warning } => {
            let mut line = format!("✓ {}", summarize_action_result(Action::Close, &run.stdout));
            if close_warning.is_some() {
                line.push_str("\n  ⚠ uncommitted changes remain");
            }
            line
        }
        ToolDetails::Ready { run, .. }
        | ToolDetails::Show { run, .. }
        | ToolDetails::Claim { run }
        | ToolDetails::Status { run } => {
            format!("✓ {}", summarize_action_result(action, &run.stdout))
        }
    };

    if expanded {
        out.push_str("\n\n");
        out.push_str(&output.text);
    }
    out
}

fn render_card(lines: &[String], prefix: &str) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            out.push_str(&format!("✓ {prefix}{line}"));
        } else {
            out.push_str(&format!("\n  {line}"));
        }
    }
    out
}
