//! The surface the coordinator drives.
//!
//! A [`Host`] is whatever embeds the coordinator: a coding-agent process
//! talking over the bridge, or a recording double in tests. The coordinator
//! never renders anything itself; it hands text and levels to the host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status-bar key for the workflow summary.
pub const STATUS_KEY: &str = "beads-mode";

/// Host flag that turns on lifecycle diagnostics.
pub const OBSERVE_FLAG: &str = "beads-observe";

/// Custom message types sent to the agent.
pub mod message_type {
    pub const PRIME: &str = "beads-prime";
    pub const DIRTY_TREE_WARNING: &str = "beads-dirty-tree-warning";
    pub const AUTO_CONTINUE: &str = "beads-auto-continue";
    pub const CHECKPOINT_NUDGE: &str = "beads-checkpoint-nudge";
    pub const CONTEXT_WARNING: &str = "beads-context-warning";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// When a queued message reaches the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Delivery {
    /// Attached to the next turn the user starts.
    NextTurn,
    /// Delivered after the current turn; `trigger_turn` starts a new one.
    FollowUp { trigger_turn: bool },
}

/// A message queued for the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub custom_type: String,
    pub content: String,
    pub display: bool,
    pub delivery: Delivery,
}

impl OutgoingMessage {
    /// A hidden message of the given type.
    pub fn hidden(custom_type: &str, content: impl Into<String>, delivery: Delivery) -> Self {
        Self {
            custom_type: custom_type.to_string(),
            content: content.into(),
            display: false,
            delivery,
        }
    }
}

/// A message injected at the start of an agent turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedMessage {
    pub custom_type: String,
    pub content: String,
    pub display: bool,
}

/// Veto of a pending tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDecision {
    pub reason: String,
}

impl BlockDecision {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Services the embedding host provides.
///
/// Synchronous methods must not block; the interactive ones resolve to
/// `None` when the host has no UI or the user cancels.
#[async_trait]
pub trait Host: Send + Sync {
    fn has_ui(&self) -> bool;

    fn notify(&self, message: &str, level: NotifyLevel);

    /// Sets or clears (`None`) a status-bar entry.
    fn set_status(&self, key: &str, text: Option<&str>);

    fn send_message(&self, message: OutgoingMessage);

    /// Context-window usage of the current session, if known.
    fn context_usage_percent(&self) -> Option<f64>;

    fn flag(&self, name: &str) -> bool;

    fn set_editor_text(&self, text: &str);

    /// Writes plain output for hosts without a UI.
    fn print(&self, text: &str);

    async fn select(&self, title: &str, options: &[String]) -> Option<String>;

    async fn input(&self, title: &str, placeholder: &str) -> Option<String>;

    async fn editor(&self, title: &str, prefill: &str) -> Option<String>;
}

/// Shows command output as a notification when there is a UI, otherwise
/// prints it.
pub fn command_out(host: &dyn Host, message: &str, level: NotifyLevel) {
    if host.has_ui() {
        host.notify(message, level);
    } else {
        host.print(message);
    }
}
