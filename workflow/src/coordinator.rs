//! Workflow coordinator.
//!
//! The [`Coordinator`] reacts to host lifecycle events: it primes the agent
//! at the start of a turn, vetoes unsafe closes, keeps the status bar fresh,
//! records edits and commits against the active issue, and nudges the agent
//! to checkpoint.
//!
//! Hooks take `&mut self` and the host delivers events one at a time, so
//! state mutations never interleave. Subprocess failures never surface as
//! errors; they degrade to a cleared status, an omitted section, or a
//! message.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::TrackerClient;
use crate::config::WorkflowSettings;
use crate::format::{
    build_checkpoint_nudge, build_checkpoint_summary, build_context_reminder, build_continue_message,
    build_observability_summary, build_prime_message, format_file_list_comment, format_mode_status,
    format_mode_text, format_recovery_message, ObservedEvent, StatusLine, CHECKPOINT_NUDGE_NOTICE,
    CLOSE_BLOCK_REASON, DIRTY_TREE_CLOSE_WARNING,
};
use crate::host::{
    command_out, message_type, BlockDecision, Delivery, Host, InjectedMessage, NotifyLevel,
    OutgoingMessage, OBSERVE_FLAG, STATUS_KEY,
};
use crate::parser::{
    detect_tracking_mode, extract_edited_file_path, is_git_commit_command,
    is_tracker_close_command, is_tracker_command, is_tracker_comment_add_command, parse_git_commit_output,
    parse_info, parse_issue_list, parse_session_mode,
};
use crate::recovery::build_recovery_context;
use crate::state::WorkflowState;

/// Timeout for the automatic pre-compaction checkpoint comment.
const COMPACTION_COMMENT_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Timeout for commit comments and the file-list comment flushed on close.
pub(crate) const COMMENT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// A finished tool call as reported by the host.
#[derive(Debug, Clone, Copy)]
pub struct ToolResultEvent<'a> {
    pub tool_name: &'a str,
    pub input: &'a Value,
    pub is_error: bool,
    /// Text content of the result.
    pub output: &'a str,
}

/// Session-scoped workflow coordinator.
pub struct Coordinator {
    pub(crate) state: WorkflowState,
    pub(crate) client: TrackerClient,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) settings: WorkflowSettings,
    observe: bool,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state)
            .field("client", &self.client)
            .field("settings", &self.settings)
            .field("observe", &self.observe)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(client: TrackerClient, host: Arc<dyn Host>, settings: WorkflowSettings) -> Self {
        Self {
            state: WorkflowState::new(),
            client,
            host,
            settings,
            observe: false,
        }
    }

    /// Forces lifecycle diagnostics on regardless of the host flag.
    #[must_use]
    pub fn with_observability(mut self, enabled: bool) -> Self {
        self.observe = enabled;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn client(&self) -> &TrackerClient {
        &self.client
    }

    pub(crate) fn say(&self, message: &str, level: NotifyLevel) {
        command_out(self.host.as_ref(), message, level);
    }

    fn observing(&self) -> bool {
        self.observe || self.host.flag(OBSERVE_FLAG)
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Probes the tracker and publishes the initial status.
    pub async fn session_start(&mut self) {
        let probe = self.client.br(&["info", "--json"]).await;
        self.state.apply_session_probe(parse_session_mode(probe.exit_code));

        if !self.state.workflow_enabled() {
            self.publish_mode_status();
            return;
        }
        self.refresh_status().await;
    }

    /// Re-primes the next turn and records a checkpoint before compaction.
    ///
    /// The checkpoint comment is best-effort and not awaited.
    pub fn session_before_compact(&mut self) {
        if !self.state.workflow_enabled() {
            return;
        }
        self.state.request_prime();

        let Some(issue_id) = self.state.current_issue_id().map(str::to_string) else {
            return;
        };
        let turns = self.state.checkpoint().turns_since_checkpoint();
        let files = self.state.edited_files(&issue_id).cloned().unwrap_or_default();
        if turns == 0 && files.is_empty() {
            return;
        }

        let summary = build_checkpoint_summary(&files, turns);
        self.client.spawn_br_best_effort(
            vec!["comments".into(), "add".into(), issue_id.clone(), summary],
            COMPACTION_COMMENT_TIMEOUT,
        );
        self.state.checkpoint_now();
        info!(issue_id = %issue_id, turns, files = files.len(), "Checkpointed before compaction");
    }

    /// Clears the per-turn continue slot and, if priming is due, returns the
    /// message to inject.
    pub async fn before_agent_start(&mut self) -> Option<InjectedMessage> {
        self.state.begin_agent_turn();
        if !self.state.take_prime() {
            return None;
        }

        let content = match build_recovery_context(&self.client).await {
            Some(ctx) => {
                self.state.resume(&ctx.issue.id);
                format_recovery_message(&ctx)
            }
            None => build_prime_message(true, None),
        };
        Some(InjectedMessage {
            custom_type: message_type::PRIME.to_string(),
            content,
            display: false,
        })
    }

    /// Vetoes a bare `br close` while the working tree is dirty.
    ///
    /// Only a leading `br close` is inspected. If the status check itself
    /// fails the call is allowed.
    pub async fn tool_call(&mut self, tool_name: &str, input: &Value) -> Option<BlockDecision> {
        if !self.state.workflow_enabled() || tool_name != "bash" {
            return None;
        }
        let command = input.get("command").and_then(Value::as_str)?;
        if !is_tracker_close_command(command) {
            return None;
        }

        let status = self.client.git(&["status", "--porcelain"]).await;
        if !status.success() {
            debug!("git status failed; allowing close");
            return None;
        }
        if status.stdout.trim().is_empty() {
            return None;
        }
        warn!(command, "Blocked close with uncommitted changes");
        Some(BlockDecision::new(CLOSE_BLOCK_REASON))
    }

    /// Bookkeeping after a tool finished.
    pub async fn tool_result(&mut self, event: ToolResultEvent<'_>) {
        if !self.state.workflow_enabled() {
            return;
        }

        if event.tool_name == "bash" && !event.is_error {
            let command = event.input.get("command").and_then(Value::as_str).unwrap_or("");
            if is_tracker_command(command) {
                self.refresh_status().await;
            }

            let Some(issue_id) = self.state.current_issue_id().map(str::to_string) else {
                return;
            };
            if is_git_commit_command(command) {
                if let Some(commit) = parse_git_commit_output(event.output) {
                    self.client.spawn_br_best_effort(
                        vec![
                            "comments".into(),
                            "add".into(),
                            issue_id.clone(),
                            format!("commit: {} {}", commit.hash, commit.message),
                        ],
                        COMMENT_TIMEOUT,
                    );
                    self.state.checkpoint_now();
                    debug!(issue_id = %issue_id, hash = %commit.hash, "Recorded commit");
                }
            }
            if is_tracker_comment_add_command(command) {
                self.state.checkpoint_now();
            }
            return;
        }

        if self.state.current_issue_id().is_none() {
            return;
        }
        if let Some(path) = extract_edited_file_path(event.tool_name, event.input) {
            self.state.record_edit(&path);
        }
    }

    pub fn message_start(&self) {
        self.observe_event(&ObservedEvent::MessageStart, false);
    }

    pub fn tool_execution_end(&self, tool_name: &str, is_error: bool) {
        self.observe_event(&ObservedEvent::ToolExecutionEnd { tool_name, is_error }, is_error);
    }

    fn observe_event(&self, event: &ObservedEvent<'_>, is_error: bool) {
        if !self.state.workflow_enabled() {
            return;
        }
        if let Some(summary) = build_observability_summary(self.observing(), event) {
            let level = if is_error {
                NotifyLevel::Warning
            } else {
                NotifyLevel::Info
            };
            self.say(&summary, level);
        }
    }

    /// Advances the turn counter and fires the checkpoint nudge and the
    /// context reminder when due.
    pub fn turn_end(&mut self) {
        if !self.state.workflow_enabled() {
            return;
        }

        if let Some(turns) = self.state.tick(self.settings.checkpoint_turns) {
            if let Some(issue_id) = self.state.current_issue_id() {
                self.say(CHECKPOINT_NUDGE_NOTICE, NotifyLevel::Info);
                self.host.send_message(OutgoingMessage::hidden(
                    message_type::CHECKPOINT_NUDGE,
                    build_checkpoint_nudge(issue_id, turns),
                    Delivery::NextTurn,
                ));
                info!(issue_id, turns, "Checkpoint nudge sent");
            }
        }

        let usage = self.host.context_usage_percent();
        if self
            .state
            .try_mark_context_reminder(usage, self.settings.context_threshold_percent)
        {
            let reminder = build_context_reminder(usage.unwrap_or_default());
            self.host.notify(&reminder, NotifyLevel::Warning);
            self.host.send_message(OutgoingMessage::hidden(
                message_type::CONTEXT_WARNING,
                reminder,
                Delivery::FollowUp { trigger_turn: true },
            ));
            info!(usage_percent = usage.unwrap_or_default(), "Context reminder sent");
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Publishes the status label from the mode flags alone.
    pub(crate) fn publish_mode_status(&self) {
        let line = StatusLine {
            workflow_enabled: self.state.workflow_enabled(),
            is_tracker_project: self.state.is_tracker_project(),
            mode_text: self.state.cached_mode_text(),
            ..StatusLine::default()
        };
        self.host.set_status(STATUS_KEY, Some(&format_mode_status(&line)));
    }

    /// Rebuilds the status label from three concurrent tracker lookups.
    ///
    /// The tracking-mode label is computed once per session and cached. A
    /// failed `info` lookup clears the status entry.
    pub async fn refresh_status(&mut self) {
        if !self.state.workflow_enabled() || !self.state.is_tracker_project() {
            self.publish_mode_status();
            return;
        }

        let (info, listed, in_progress) = tokio::join!(
            self.client.br(&["info", "--json"]),
            self.client.br(&["list", "--json"]),
            self.client
                .br(&["list", "--status", "in_progress", "--sort", "updated_at", "--json"]),
        );

        if !info.success() {
            debug!("Tracker info failed; clearing status");
            self.host.set_status(STATUS_KEY, None);
            return;
        }

        let issue_count = if listed.success() {
            parse_issue_list(&listed.stdout).len()
        } else {
            0
        };
        let in_progress = if in_progress.success() {
            parse_issue_list(&in_progress.stdout)
        } else {
            Vec::new()
        };

        if self.state.cached_mode_text().is_empty() {
            let ignored = self.client.git(&["check-ignore", ".beads/"]).await;
            let backend = parse_info(&info.stdout)
                .map(|i| i.mode)
                .unwrap_or_else(|| "unknown".to_string());
            self.state
                .set_cached_mode_text(format_mode_text(detect_tracking_mode(ignored.exit_code), &backend));
        }

        let line = StatusLine {
            workflow_enabled: true,
            is_tracker_project: true,
            mode_text: self.state.cached_mode_text(),
            issue_count,
            in_progress: &in_progress,
        };
        self.host.set_status(STATUS_KEY, Some(&format_mode_status(&line)));
    }

    // ========================================================================
    // Close Helpers
    // ========================================================================

    /// Warns when the tree is dirty after a close.
    ///
    /// With `queue`, the warning is also sent to the agent for its next turn.
    /// Returns the warning text when one was issued.
    pub async fn nudge_commit_after_close(&self, queue: bool) -> Option<&'static str> {
        let status = self.client.git(&["status", "--porcelain"]).await;
        if !status.success() || status.stdout.trim().is_empty() {
            return None;
        }

        self.say(DIRTY_TREE_CLOSE_WARNING, NotifyLevel::Warning);
        if queue {
            self.host.send_message(OutgoingMessage::hidden(
                message_type::DIRTY_TREE_WARNING,
                DIRTY_TREE_CLOSE_WARNING,
                Delivery::NextTurn,
            ));
        }
        Some(DIRTY_TREE_CLOSE_WARNING)
    }

    /// Records the files touched under `issue_id` as a comment.
    ///
    /// Awaited so the comment lands before the close; failures are logged.
    pub(crate) async fn flush_file_list(&self, issue_id: &str) {
        let Some(comment) = self.state.edited_files(issue_id).and_then(format_file_list_comment) else {
            return;
        };
        let result = self
            .client
            .br_with_timeout(&["comments", "add", issue_id, &comment], COMMENT_TIMEOUT)
            .await;
        if !result.success() {
            warn!(issue_id, "Failed to record edited files; closing anyway");
        }
    }

    /// Queues the follow-up that keeps the agent working after a close.
    ///
    /// At most one is queued per agent turn.
    pub(crate) fn send_continue_message(&mut self, closed_id: &str) {
        if !self.state.try_mark_auto_continue() {
            debug!(closed_id, "Continue message already queued this turn");
            return;
        }
        self.host.send_message(OutgoingMessage::hidden(
            message_type::AUTO_CONTINUE,
            build_continue_message(closed_id),
            Delivery::FollowUp { trigger_turn: true },
        ));
    }

    /// Turns the workflow on or off and republishes the status.
    pub(crate) async fn set_mode(&mut self, enabled: bool) {
        self.state.set_mode(enabled);
        self.refresh_status().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHost, ScriptedRunner};
    use serde_json::json;

    const INFO: &str = r#"{"mode": "sqlite", "issue_count": 2}"#;

    fn coordinator(runner: &ScriptedRunner) -> (Coordinator, RecordingHost) {
        let host = RecordingHost::with_ui();
        let coordinator = Coordinator::new(
            runner.client(),
            Arc::new(host.clone()),
            WorkflowSettings::default(),
        );
        (coordinator, host)
    }

    async fn started(runner: &ScriptedRunner) -> (Coordinator, RecordingHost) {
        let (mut coordinator, host) = coordinator(runner);
        coordinator.session_start().await;
        (coordinator, host)
    }

    fn project() -> ScriptedRunner {
        ScriptedRunner::new()
            .ok("info --json", INFO)
            .ok("list --status in_progress", "[]")
            .ok("list --json", r#"[{"id":"bd-1","title":"A"},{"id":"bd-2","title":"B"}]"#)
            .ok("check-ignore", "")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn session_start_outside_project_turns_off() {
        let runner = ScriptedRunner::new().fail("info --json", "not a beads project");
        let (coordinator, host) = started(&runner).await;

        assert!(!coordinator.state().workflow_enabled());
        assert_eq!(host.last_status(STATUS_KEY), Some(Some("beads: off".to_string())));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn session_start_publishes_live_status() {
        let runner = project();
        let (coordinator, host) = started(&runner).await;

        assert!(coordinator.state().workflow_enabled());
        assert_eq!(
            host.last_status(STATUS_KEY),
            Some(Some("beads: stealth (sqlite) · 2 issue(s) · in-progress: none".to_string()))
        );
    }

    #[tokio::test]
    async fn mode_label_is_cached() {
        let runner = project();
        let (mut coordinator, _host) = started(&runner).await;
        coordinator.refresh_status().await;
        coordinator.refresh_status().await;
        assert_eq!(runner.count("check-ignore"), 1);
    }

    #[tokio::test]
    async fn refresh_clears_status_when_info_fails() {
        let runner = project();
        let (mut coordinator, host) = started(&runner).await;

        runner.set("info --json", crate::client::ExecResult::failure("db locked"));
        coordinator.refresh_status().await;
        assert_eq!(host.last_status(STATUS_KEY), Some(None));
    }

    #[tokio::test]
    async fn close_is_blocked_on_dirty_tree() {
        let runner = project().ok("status --porcelain", " M src/lib.rs\n");
        let (mut coordinator, _host) = started(&runner).await;

        let block = coordinator
            .tool_call("bash", &json!({"command": "br close bd-1"}))
            .await;
        assert_eq!(block, Some(BlockDecision::new(CLOSE_BLOCK_REASON)));

        for command in ["echo br close", "bash -lc 'br close bd-1'", "br show bd-1"] {
            let block = coordinator.tool_call("bash", &json!({ "command": command })).await;
            assert!(block.is_none(), "{command} should not be blocked");
        }
    }

    #[tokio::test]
    async fn close_allowed_on_clean_tree_or_failed_status() {
        let runner = project().ok("status --porcelain", "");
        let (mut coordinator, _host) = started(&runner).await;
        let input = json!({"command": "br close bd-1"});
        assert!(coordinator.tool_call("bash", &input).await.is_none());

        runner.set("status --porcelain", crate::client::ExecResult::failure("not a repo"));
        assert!(coordinator.tool_call("bash", &input).await.is_none());
    }

    #[tokio::test]
    async fn tool_call_ignored_when_disabled() {
        let runner = ScriptedRunner::new().fail("info --json", "");
        let (mut coordinator, _host) = started(&runner).await;
        let block = coordinator
            .tool_call("bash", &json!({"command": "br close bd-1"}))
            .await;
        assert!(block.is_none());
        assert_eq!(runner.count("status --porcelain"), 0);
    }

    #[tokio::test]
    async fn commit_is_recorded_against_active_issue() {
        let runner = project().ok("comments add", "");
        let (mut coordinator, _host) = started(&runner).await;
        coordinator.state.claim("bd-1").unwrap();
        coordinator.turn_end();
        coordinator.turn_end();

        let input = json!({"command": "git commit -m 'fix: parser'"});
        coordinator
            .tool_result(ToolResultEvent {
                tool_name: "bash",
                input: &input,
                is_error: false,
                output: "[main abc1234] fix: parser\n 1 file changed",
            })
            .await;
        settle().await;

        let comment = runner
            .calls()
            .into_iter()
            .find(|c| c.joined().starts_with("comments add bd-1"))
            .unwrap();
        assert_eq!(comment.args[3], "commit: abc1234 fix: parser");
        assert_eq!(comment.timeout, COMMENT_TIMEOUT);
        assert_eq!(coordinator.state().checkpoint().turns_since_checkpoint(), 0);
    }

    #[tokio::test]
    async fn tracker_command_refreshes_status() {
        let runner = project();
        let (mut coordinator, _host) = started(&runner).await;
        let before = runner.count("info --json");

        let input = json!({"command": "br update bd-2 --priority 1"});
        coordinator
            .tool_result(ToolResultEvent {
                tool_name: "bash",
                input: &input,
                is_error: false,
                output: "",
            })
            .await;
        assert_eq!(runner.count("info --json"), before + 1);
    }

    #[tokio::test]
    async fn edits_recorded_only_with_active_issue() {
        let runner = project();
        let (mut coordinator, _host) = started(&runner).await;
        let input = json!({"path": "src/a.rs"});
        let event = ToolResultEvent {
            tool_name: "edit",
            input: &input,
            is_error: false,
            output: "",
        };

        coordinator.tool_result(event).await;
        assert!(coordinator.state().edited_files("bd-1").is_none());

        coordinator.state.claim("bd-1").unwrap();
        coordinator.tool_result(event).await;
        coordinator.tool_result(event).await;
        assert_eq!(coordinator.state().edited_files("bd-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn primes_once_without_in_progress_issue() {
        let runner = project();
        let (mut coordinator, _host) = started(&runner).await;

        let message = coordinator.before_agent_start().await.unwrap();
        assert_eq!(message.custom_type, message_type::PRIME);
        assert!(!message.display);
        assert!(message.content.contains("Do NOT use TodoWrite"));

        assert!(coordinator.before_agent_start().await.is_none());
    }

    #[tokio::test]
    async fn primes_with_recovery_and_adopts_issue() {
        let issue = json!({"id": "bd-7", "title": "Resume me", "status": "in_progress"});
        let runner = ScriptedRunner::new()
            .ok("info --json", INFO)
            .ok("list --status in_progress", json!([issue]).to_string())
            .ok("list --json", json!([issue]).to_string())
            .ok("check-ignore", "")
            .ok("show bd-7", json!([issue]).to_string())
            .ok("dep list", "[]")
            .ok("status --porcelain", "");
        let (mut coordinator, _host) = started(&runner).await;

        let message = coordinator.before_agent_start().await.unwrap();
        assert!(message.content.contains("## Resuming: bd-7 — Resume me"));
        assert_eq!(coordinator.state().current_issue_id(), Some("bd-7"));
    }

    #[tokio::test]
    async fn compaction_checkpoints_and_reprimes() {
        let runner = project().ok("comments add", "");
        let (mut coordinator, _host) = started(&runner).await;
        coordinator.before_agent_start().await;
        coordinator.state.claim("bd-1").unwrap();
        coordinator.state.record_edit("src/a.rs");

        coordinator.session_before_compact();
        settle().await;

        assert!(coordinator.state().should_prime_next_turn());
        let comment = runner
            .calls()
            .into_iter()
            .find(|c| c.joined().starts_with("comments add bd-1"))
            .unwrap();
        assert!(comment.args[3].starts_with("Auto-checkpoint before context compaction"));
        assert_eq!(comment.timeout, COMPACTION_COMMENT_TIMEOUT);
    }

    #[tokio::test]
    async fn compaction_skips_comment_without_progress() {
        let runner = project();
        let (mut coordinator, _host) = started(&runner).await;
        coordinator.state.claim("bd-1").unwrap();

        coordinator.session_before_compact();
        settle().await;
        assert_eq!(runner.count("comments add"), 0);
    }

    #[tokio::test]
    async fn nudge_fires_once_per_window() {
        let runner = project();
        let (mut coordinator, host) = started(&runner).await;
        coordinator.state.claim("bd-1").unwrap();

        for _ in 0..7 {
            coordinator.turn_end();
        }
        assert!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).is_empty());

        coordinator.turn_end();
        let nudges = host.messages_of_type(message_type::CHECKPOINT_NUDGE);
        assert_eq!(nudges.len(), 1);
        assert_eq!(nudges[0].delivery, Delivery::NextTurn);
        assert!(host.notified().contains(&CHECKPOINT_NUDGE_NOTICE.to_string()));

        for _ in 0..7 {
            coordinator.turn_end();
        }
        assert_eq!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).len(), 1);
        coordinator.turn_end();
        assert_eq!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).len(), 2);
    }

    #[tokio::test]
    async fn context_reminder_fires_once() {
        let runner = project();
        let (mut coordinator, host) = started(&runner).await;

        host.set_usage(Some(80.0));
        coordinator.turn_end();
        assert!(host.messages_of_type(message_type::CONTEXT_WARNING).is_empty());

        host.set_usage(Some(91.4));
        coordinator.turn_end();
        coordinator.turn_end();
        let warnings = host.messages_of_type(message_type::CONTEXT_WARNING);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].delivery, Delivery::FollowUp { trigger_turn: true });
        assert!(warnings[0].content.contains("91%"));
    }

    #[tokio::test]
    async fn dirty_nudge_queues_only_when_asked() {
        let runner = project().ok("status --porcelain", "?? notes.md\n");
        let (coordinator, host) = started(&runner).await;

        assert_eq!(
            coordinator.nudge_commit_after_close(false).await,
            Some(DIRTY_TREE_CLOSE_WARNING)
        );
        assert!(host.messages_of_type(message_type::DIRTY_TREE_WARNING).is_empty());

        coordinator.nudge_commit_after_close(true).await;
        assert_eq!(host.messages_of_type(message_type::DIRTY_TREE_WARNING).len(), 1);
    }

    #[tokio::test]
    async fn observability_follows_flag() {
        let runner = project();
        let (coordinator, host) = started(&runner).await;

        coordinator.message_start();
        assert!(host.notifications().is_empty());

        host.set_flag(OBSERVE_FLAG);
        coordinator.message_start();
        coordinator.tool_execution_end("bash", true);
        assert_eq!(
            host.notifications(),
            vec![
                ("beads observe: message_start".to_string(), NotifyLevel::Info),
                (
                    "beads observe: tool_execution_end bash (error)".to_string(),
                    NotifyLevel::Warning
                ),
            ]
        );
    }
}
