//! End-to-end scenarios for the workflow coordinator.
//!
//! Each test drives a [`Coordinator`] through host hooks, tool actions and
//! commands against a scripted tracker, then inspects what reached the host.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use beads_workflow::client::ExecResult;
use beads_workflow::config::WorkflowSettings;
use beads_workflow::coordinator::{Coordinator, ToolResultEvent};
use beads_workflow::format::{DIRTY_TREE_CLOSE_WARNING, MODE_OFF_MESSAGE};
use beads_workflow::host::{message_type, Delivery, STATUS_KEY};
use beads_workflow::testing::{RecordingHost, ScriptedRunner};
use beads_workflow::tool::{ToolDetails, ToolInput};
use beads_workflow::types::Action;

// =============================================================================
// Test Helpers
// =============================================================================

/// A tracker project with `bd-aaa` and `bd-bbb` claimable and closable.
fn project(porcelain: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .ok("info --json", r#"{"mode": "sqlite"}"#)
        .ok("list --status in_progress", "[]")
        .ok("list --json", r#"[{"id":"bd-aaa","title":"A"},{"id":"bd-bbb","title":"B"}]"#)
        .ok("check-ignore", "")
        .ok("update", "")
        .ok("close", "")
        .ok("comments add", "")
        .ok("status --porcelain", porcelain)
}

async fn started(runner: &ScriptedRunner, host: &RecordingHost) -> Coordinator {
    let mut coordinator = Coordinator::new(
        runner.client(),
        Arc::new(host.clone()),
        WorkflowSettings::default(),
    );
    coordinator.session_start().await;
    coordinator
}

async fn claim(coordinator: &mut Coordinator, id: &str) {
    let output = coordinator
        .execute_tool(ToolInput::new(Action::Claim).with_id(id))
        .await;
    assert!(!output.is_error, "claim {id} failed: {}", output.text);
}

async fn close(coordinator: &mut Coordinator, id: &str) -> String {
    let output = coordinator
        .execute_tool(ToolInput::new(Action::Close).with_id(id))
        .await;
    assert!(!output.is_error, "close {id} failed: {}", output.text);
    output.text
}

async fn edit(coordinator: &mut Coordinator, path: &str) {
    let input = json!({ "path": path, "oldText": "a", "newText": "b" });
    coordinator
        .tool_result(ToolResultEvent {
            tool_name: "edit",
            input: &input,
            is_error: false,
            output: "",
        })
        .await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn uninitialized_tracker_turns_workflow_off() {
    let runner = ScriptedRunner::new().respond(
        "info --json",
        ExecResult {
            stderr: "no beads database found".to_string(),
            exit_code: 2,
            ..ExecResult::default()
        },
    );
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    assert!(!coordinator.state().workflow_enabled());
    assert_eq!(host.last_status(STATUS_KEY), Some(Some("beads: off".to_string())));

    for action in Action::ALL {
        let output = coordinator
            .execute_tool(ToolInput::new(action).with_id("bd-aaa"))
            .await;
        assert_eq!(output.text, MODE_OFF_MESSAGE);
        assert!(matches!(output.details, ToolDetails::Disabled { .. }));
    }
    assert_eq!(runner.calls().len(), 1, "only the session probe may run");
}

#[tokio::test]
async fn claim_then_close_returns_to_idle() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    claim(&mut coordinator, "bd-aaa").await;
    assert_eq!(coordinator.state().current_issue_id(), Some("bd-aaa"));
    edit(&mut coordinator, "src/parser.rs").await;
    edit(&mut coordinator, "src/parser.rs").await;
    assert_eq!(coordinator.state().edited_files("bd-aaa").map(|f| f.len()), Some(1));

    let text = close(&mut coordinator, "bd-aaa").await;
    assert!(!text.contains(DIRTY_TREE_CLOSE_WARNING));

    assert_eq!(coordinator.state().current_issue_id(), None);
    assert!(coordinator.state().edited_files("bd-aaa").is_none());
    assert_eq!(coordinator.state().checkpoint().turns_since_checkpoint(), 0);

    // The edited-file list lands as a comment before the close call.
    let calls: Vec<String> = runner.calls().iter().map(|c| c.joined()).collect();
    let comment_at = calls
        .iter()
        .position(|c| c.starts_with("comments add bd-aaa"))
        .expect("file list comment");
    let close_at = calls
        .iter()
        .position(|c| c.starts_with("close bd-aaa"))
        .expect("close call");
    assert!(comment_at < close_at);
    assert!(calls[comment_at].contains("src/parser.rs"));

    let continues = host.messages_of_type(message_type::AUTO_CONTINUE);
    assert_eq!(continues.len(), 1);
    assert!(continues[0].content.contains("bd-aaa"));
    assert_eq!(continues[0].delivery, Delivery::FollowUp { trigger_turn: true });
}

#[tokio::test]
async fn checkpoint_nudge_fires_once_per_window() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;
    claim(&mut coordinator, "bd-aaa").await;

    for _ in 0..7 {
        coordinator.turn_end();
    }
    assert!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).is_empty());

    coordinator.turn_end();
    let nudges = host.messages_of_type(message_type::CHECKPOINT_NUDGE);
    assert_eq!(nudges.len(), 1);
    assert!(nudges[0].content.contains("bd-aaa"));
    assert_eq!(coordinator.state().checkpoint().last_checkpoint_turn, 8);

    coordinator.turn_end();
    assert_eq!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).len(), 1);

    for _ in 0..7 {
        coordinator.turn_end();
    }
    assert_eq!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).len(), 2);
    assert_eq!(coordinator.state().checkpoint().last_checkpoint_turn, 16);
}

#[tokio::test]
async fn commit_resets_the_nudge_window() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;
    claim(&mut coordinator, "bd-aaa").await;

    for _ in 0..5 {
        coordinator.turn_end();
    }
    let input = json!({ "command": "git commit -m 'fix: parser'" });
    coordinator
        .tool_result(ToolResultEvent {
            tool_name: "bash",
            input: &input,
            is_error: false,
            output: "[main 1a2b3c4] fix: parser\n 1 file changed, 2 insertions(+)",
        })
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..7 {
        coordinator.turn_end();
    }
    assert!(host.messages_of_type(message_type::CHECKPOINT_NUDGE).is_empty());
    assert_eq!(runner.count("comments add bd-aaa commit: 1a2b3c4 fix: parser"), 1);
}

#[tokio::test]
async fn tool_close_on_dirty_tree_does_not_queue_a_warning() {
    let runner = project(" M src/lib.rs\n");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    claim(&mut coordinator, "bd-aaa").await;
    let text = close(&mut coordinator, "bd-aaa").await;

    assert!(text.contains(DIRTY_TREE_CLOSE_WARNING));
    assert!(host.messages_of_type(message_type::DIRTY_TREE_WARNING).is_empty());
}

#[tokio::test]
async fn command_close_on_dirty_tree_queues_one_warning() {
    let runner = project(" M src/lib.rs\n");
    let host = RecordingHost::new();
    let mut coordinator = started(&runner, &host).await;

    assert!(coordinator.run_command("beads-claim", "bd-aaa").await);
    assert!(coordinator.run_command("beads-close", "bd-aaa").await);

    let warnings = host.messages_of_type(message_type::DIRTY_TREE_WARNING);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].content, DIRTY_TREE_CLOSE_WARNING);
    assert_eq!(warnings[0].delivery, Delivery::NextTurn);
    assert!(host.printed().iter().any(|p| p == DIRTY_TREE_CLOSE_WARNING));
    assert!(host.printed().iter().any(|p| p == "Closed bd-aaa."));
    assert!(host.messages_of_type(message_type::AUTO_CONTINUE).is_empty());
}

#[tokio::test]
async fn auto_continue_is_sent_once_per_turn() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    claim(&mut coordinator, "bd-aaa").await;
    close(&mut coordinator, "bd-aaa").await;
    claim(&mut coordinator, "bd-bbb").await;
    close(&mut coordinator, "bd-bbb").await;
    assert_eq!(host.messages_of_type(message_type::AUTO_CONTINUE).len(), 1);

    coordinator.before_agent_start().await;
    claim(&mut coordinator, "bd-aaa").await;
    close(&mut coordinator, "bd-aaa").await;
    assert_eq!(host.messages_of_type(message_type::AUTO_CONTINUE).len(), 2);
}

#[tokio::test]
async fn second_claim_is_rejected_without_tracker_call() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    claim(&mut coordinator, "bd-aaa").await;
    let output = coordinator
        .execute_tool(ToolInput::new(Action::Claim).with_id("bd-bbb"))
        .await;

    assert!(output.is_error);
    assert!(matches!(output.details, ToolDetails::Rejected { .. }));
    assert_eq!(runner.count("update bd-bbb"), 0);
    assert_eq!(coordinator.state().current_issue_id(), Some("bd-aaa"));
}

#[tokio::test]
async fn context_reminder_fires_once() {
    let runner = project("");
    let host = RecordingHost::with_ui();
    let mut coordinator = started(&runner, &host).await;

    host.set_usage(Some(84.9));
    coordinator.turn_end();
    assert!(host.messages_of_type(message_type::CONTEXT_WARNING).is_empty());

    host.set_usage(Some(91.0));
    coordinator.turn_end();
    coordinator.turn_end();
    let reminders = host.messages_of_type(message_type::CONTEXT_WARNING);
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].delivery, Delivery::FollowUp { trigger_turn: true });

    assert!(coordinator.run_command("beads-reset-reminder", "").await);
    coordinator.turn_end();
    assert_eq!(host.messages_of_type(message_type::CONTEXT_WARNING).len(), 2);
}
