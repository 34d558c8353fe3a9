//! Human-invoked slash commands and the mode shortcut.
//!
//! Commands report through [`command_out`](crate::host::command_out): a
//! notification when the host has a UI, plain output otherwise. Failures are
//! reported the same way at error level and never abort the session.

use tracing::{debug, info};

use crate::coordinator::Coordinator;
use crate::format::format_issue_label;
use crate::host::NotifyLevel;
use crate::parser::{parse_issue_list, summarize_exec_failure};
use crate::tool::DEFAULT_CLOSE_REASON;
use crate::types::IssueSummary;

/// Registered command names with their descriptions.
pub const COMMANDS: [(&str, &str); 7] = [
    ("beads", "Interactive beads picker with quick issue actions"),
    ("beads-ready", "Run br ready --sort priority"),
    ("beads-status", "Show beads stats, blocked issues, and in-progress issues"),
    ("beads-claim", "Mark issue in_progress: /beads-claim <id>"),
    ("beads-close", "Close issue: /beads-close <id>"),
    ("beads-reset-reminder", "Reset one-time beads context reminder"),
    ("beads-mode", "Set/query beads mode: /beads-mode [on|off|status]"),
];

/// Key that toggles the workflow on and off.
pub const TOGGLE_SHORTCUT: &str = "ctrl+b";

const PICK_WORK: &str = "Work on this issue";
const PICK_SHOW: &str = "Show details";
const PICK_COMMENT: &str = "Add checkpoint comment";
const PICK_CLOSE: &str = "Close issue";
const PICK_BACK: &str = "Back";

const CHECKPOINT_TEMPLATE: &str = "Progress update:\n-\n\nNext:\n-";
const PICKER_CLOSE_REASON: &str = "Verified: completed and tested";
const DETAIL_LINES: usize = 10;

impl Coordinator {
    /// Runs the named command. Returns `false` for names this module does
    /// not own.
    pub async fn run_command(&mut self, name: &str, args: &str) -> bool {
        debug!(command = name, "Running command");
        match name {
            "beads" => self.cmd_pick(args).await,
            "beads-ready" => self.cmd_ready().await,
            "beads-status" => self.cmd_status().await,
            "beads-claim" => self.cmd_claim(args.trim()).await,
            "beads-close" => self.cmd_close(args.trim()).await,
            "beads-reset-reminder" => {
                self.state.reset_context_reminder();
                self.say("Beads context reminder reset.", NotifyLevel::Info);
            }
            "beads-mode" => self.cmd_mode(args).await,
            _ => return false,
        }
        true
    }

    /// Handles a key shortcut. Returns `false` for keys this module does not
    /// own.
    pub async fn run_shortcut(&mut self, key: &str) -> bool {
        if key != TOGGLE_SHORTCUT {
            return false;
        }
        let enabled = !self.state.workflow_enabled();
        self.set_mode(enabled).await;
        self.host.notify(self.mode_change_message(), NotifyLevel::Info);
        true
    }

    fn mode_change_message(&self) -> &'static str {
        match (self.state.workflow_enabled(), self.state.is_tracker_project()) {
            (true, true) => "Beads mode enabled.",
            (true, false) => "Beads mode enabled (no project detected).",
            (false, _) => "Beads mode disabled.",
        }
    }

    async fn cmd_mode(&mut self, args: &str) {
        let value = args.trim().to_lowercase();
        match value.as_str() {
            "" | "status" => {
                let text = if self.state.workflow_enabled() {
                    "Beads mode is ON."
                } else {
                    "Beads mode is OFF."
                };
                self.say(text, NotifyLevel::Info);
            }
            "on" | "off" => {
                self.set_mode(value == "on").await;
                self.say(self.mode_change_message(), NotifyLevel::Info);
            }
            _ => self.say("Usage: /beads-mode [on|off|status]", NotifyLevel::Warning),
        }
    }

    async fn cmd_ready(&self) {
        let result = self.client.br(&["ready", "--sort", "priority"]).await;
        if !result.success() {
            self.say(
                &format!("beads-ready failed: {}", summarize_exec_failure(&result)),
                NotifyLevel::Error,
            );
            return;
        }
        let text = result.stdout.trim();
        self.say(if text.is_empty() { "No ready issues." } else { text }, NotifyLevel::Info);
    }

    async fn cmd_status(&self) {
        let (stats, blocked, in_progress) = tokio::join!(
            self.client.br(&["stats"]),
            self.client.br(&["blocked"]),
            self.client.br(&["list", "--status", "in_progress"]),
        );

        let sections = [
            ("br stats", &stats, "(empty)"),
            ("br blocked", &blocked, "(none)"),
            ("br list --status in_progress", &in_progress, "(none)"),
        ];
        let mut blocks = Vec::with_capacity(sections.len());
        for (title, result, empty) in sections {
            if result.success() {
                let body = result.stdout.trim();
                blocks.push(format!("=== {title} ===\n{}", if body.is_empty() { empty } else { body }));
            } else {
                blocks.push(format!("=== {title} (failed) ===\n{}", summarize_exec_failure(result)));
            }
        }

        let level = if stats.success() && blocked.success() && in_progress.success() {
            NotifyLevel::Info
        } else {
            NotifyLevel::Warning
        };
        self.say(&blocks.join("\n\n"), level);
    }

    async fn cmd_claim(&mut self, id: &str) {
        if id.is_empty() {
            self.say("Usage: /beads-claim <id>", NotifyLevel::Warning);
            return;
        }
        match self.claim_issue(id).await {
            Ok(()) => self.say(&format!("Claimed {id} (in_progress)."), NotifyLevel::Info),
            Err(message) => self.say(&message, NotifyLevel::Error),
        }
    }

    async fn cmd_close(&mut self, id: &str) {
        if id.is_empty() {
            self.say("Usage: /beads-close <id>", NotifyLevel::Warning);
            return;
        }

        let mut reason = DEFAULT_CLOSE_REASON.to_string();
        if self.host.has_ui() {
            let input = self
                .host
                .input(&format!("Close reason for {id}"), DEFAULT_CLOSE_REASON)
                .await;
            match input.filter(|r| !r.trim().is_empty()) {
                Some(r) => reason = r,
                None => {
                    self.host
                        .notify("Close cancelled: reason is required.", NotifyLevel::Warning);
                    return;
                }
            }
        }

        match self.close_issue(id, &reason).await {
            Ok(()) => self.say(&format!("Closed {id}."), NotifyLevel::Info),
            Err(message) => self.say(&message, NotifyLevel::Error),
        }
    }

    // ========================================================================
    // Picker
    // ========================================================================

    async fn cmd_pick(&mut self, args: &str) {
        let result = self.client.br(&["ready", "--sort", "priority", "--json"]).await;
        if !result.success() {
            self.say(
                &format!("beads ready failed: {}", summarize_exec_failure(&result)),
                NotifyLevel::Error,
            );
            return;
        }

        let filter = args.trim().to_lowercase();
        let issues: Vec<IssueSummary> = parse_issue_list(&result.stdout)
            .into_iter()
            .filter(|issue| {
                filter.is_empty() || format!("{} {}", issue.id, issue.title).to_lowercase().contains(&filter)
            })
            .collect();

        if !self.host.has_ui() {
            if issues.is_empty() {
                self.host.print("No ready issues.");
            } else {
                let lines: Vec<String> = issues.iter().map(|i| format!("{} {}", i.id, i.title)).collect();
                self.host.print(&lines.join("\n"));
            }
            return;
        }

        if issues.is_empty() {
            let text = if filter.is_empty() {
                "No ready issues.".to_string()
            } else {
                format!("No ready issues match \"{filter}\".")
            };
            self.host.notify(&text, NotifyLevel::Info);
            return;
        }

        let labels: Vec<String> = issues.iter().map(format_issue_label).collect();
        let Some(picked) = self.host.select("Choose beads issue", &labels).await else {
            return;
        };
        let Some(issue) = labels
            .iter()
            .position(|label| *label == picked)
            .and_then(|index| issues.get(index))
        else {
            self.host.notify("Issue selection failed.", NotifyLevel::Error);
            return;
        };

        self.issue_menu(issue).await;
    }

    /// Action loop for one picked issue; returns on claim, close, back or
    /// cancel.
    async fn issue_menu(&mut self, issue: &IssueSummary) {
        let id = issue.id.as_str();
        let options: Vec<String> = [PICK_WORK, PICK_SHOW, PICK_COMMENT, PICK_CLOSE, PICK_BACK]
            .iter()
            .map(|o| (*o).to_string())
            .collect();
        let title = format!("Issue {id}: {}", issue.title);

        loop {
            let choice = self.host.select(&title, &options).await;
            match choice.as_deref() {
                None | Some(PICK_BACK) => return,
                Some(PICK_WORK) => {
                    if let Err(message) = self.claim_issue(id).await {
                        self.host.notify(&message, NotifyLevel::Error);
                        continue;
                    }
                    self.host.set_editor_text(&format!(
                        "Work on beads issue {id}: {}\n- Follow @test-driven-development\n- Verify with @verification-before-completion",
                        issue.title
                    ));
                    self.host
                        .notify(&format!("Claimed {id}; prompt prefilled in editor."), NotifyLevel::Info);
                    return;
                }
                Some(PICK_SHOW) => {
                    let details = self.client.br(&["show", id]).await;
                    if !details.success() {
                        self.host.notify(
                            &format!("Failed to show {id}: {}", summarize_exec_failure(&details)),
                            NotifyLevel::Error,
                        );
                        continue;
                    }
                    let key_lines: Vec<&str> = details
                        .stdout
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .take(DETAIL_LINES)
                        .collect();
                    let text = if key_lines.is_empty() {
                        format!("No details available for {id}.")
                    } else {
                        key_lines.join("\n")
                    };
                    self.host.notify(&text, NotifyLevel::Info);
                }
                Some(PICK_COMMENT) => {
                    let comment = self
                        .host
                        .editor(&format!("Checkpoint comment for {id}"), CHECKPOINT_TEMPLATE)
                        .await
                        .filter(|c| !c.trim().is_empty());
                    let Some(comment) = comment else {
                        self.host.notify("No comment added.", NotifyLevel::Warning);
                        continue;
                    };
                    let added = self.client.br(&["comments", "add", id, &comment]).await;
                    if !added.success() {
                        self.host.notify(
                            &format!("Failed to add comment: {}", summarize_exec_failure(&added)),
                            NotifyLevel::Error,
                        );
                        continue;
                    }
                    if self.state.current_issue_id() == Some(id) {
                        self.state.checkpoint_now();
                    }
                    self.host
                        .notify(&format!("Added checkpoint comment to {id}."), NotifyLevel::Info);
                }
                Some(PICK_CLOSE) => {
                    let reason = self
                        .host
                        .input(&format!("Close reason for {id}"), PICKER_CLOSE_REASON)
                        .await
                        .filter(|r| !r.trim().is_empty());
                    let Some(reason) = reason else {
                        self.host
                            .notify("Close cancelled: reason is required.", NotifyLevel::Warning);
                        continue;
                    };
                    if let Err(message) = self.close_issue(id, &reason).await {
                        self.host.notify(&message, NotifyLevel::Error);
                        continue;
                    }
                    self.host.notify(&format!("Closed {id}."), NotifyLevel::Info);
                    return;
                }
                Some(other) => debug!(choice = other, "Ignoring unknown picker choice"),
            }
        }
    }

    // ========================================================================
    // Shared Transitions
    // ========================================================================

    /// Claims `id` in the tracker and in session state, then refreshes.
    async fn claim_issue(&mut self, id: &str) -> Result<(), String> {
        self.state
            .check_claim(id)
            .map_err(|err| format!("Failed to claim {id}: {err}"))?;

        let result = self.client.br(&["update", id, "--status", "in_progress"]).await;
        if !result.success() {
            return Err(format!("Failed to claim {id}: {}", summarize_exec_failure(&result)));
        }
        self.state
            .claim(id)
            .map_err(|err| format!("Failed to claim {id}: {err}"))?;
        self.refresh_status().await;
        info!(issue_id = id, "Claimed from command");
        Ok(())
    }

    /// Closes `id`, then refreshes and queues the dirty-tree warning.
    async fn close_issue(&mut self, id: &str, reason: &str) -> Result<(), String> {
        self.flush_file_list(id).await;
        let result = self.client.br(&["close", id, "--reason", reason]).await;
        if !result.success() {
            return Err(format!("Failed to close {id}: {}", summarize_exec_failure(&result)));
        }
        self.state.close(id);
        self.refresh_status().await;
        self.nudge_commit_after_close(true).await;
        info!(issue_id = id, "Closed from command");
        Ok(())
    }
}
