//! Newline-delimited JSON bridge between a host process and the coordinator.
//!
//! The host writes one [`HostEvent`] per line. For every event the bridge
//! writes zero or more [`HostEffect`] lines (notifications, status updates,
//! queued messages) followed by exactly one [`Reply`] line. Blank lines are
//! skipped; an undecodable line still gets a `Reply` carrying the error.
//!
//! ```text
//! > {"event":"session_start"}
//! < {"type":"effect","effect":"set_status","key":"beads-mode","text":"beads: stealth (sqlite) · 2 issue(s) · in-progress: none"}
//! < {"type":"reply","event":"session_start"}
//! ```
//!
//! The bridge host has no UI, so picker dialogs resolve to `None` and
//! command output is written as `print` effects.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::TrackerClient;
use crate::config::Config;
use crate::coordinator::{Coordinator, ToolResultEvent};
use crate::host::{BlockDecision, Host, InjectedMessage, NotifyLevel, OutgoingMessage, OBSERVE_FLAG};
use crate::memory::MemoryExtension;
use crate::tool::{ToolInput, ToolOutput};

/// Command handled by the memory extension rather than the coordinator.
pub const MEMORY_COMMAND: &str = "memory";

/// Errors raised by the bridge transport.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A line could not be decoded as a [`HostEvent`].
    #[error("line {line}: invalid event: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An outgoing line could not be encoded.
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// Reading events or writing output failed.
    #[error("bridge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Protocol
// ============================================================================

/// An event sent by the host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    SessionStart {
        /// Host flags in effect for the session.
        #[serde(default)]
        flags: Vec<String>,
    },
    SessionBeforeCompact,
    SessionShutdown,
    BeforeAgentStart {
        #[serde(default)]
        context_usage: Option<f64>,
    },
    ToolCall {
        tool_name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        output: String,
    },
    MessageStart,
    ToolExecutionEnd {
        tool_name: String,
        #[serde(default)]
        is_error: bool,
    },
    TurnEnd {
        #[serde(default)]
        context_usage: Option<f64>,
    },
    /// Invocation of the `beads` tool.
    Tool { input: ToolInput },
    Command {
        name: String,
        #[serde(default)]
        args: String,
    },
    Shortcut { key: String },
}

impl HostEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::SessionBeforeCompact => "session_before_compact",
            Self::SessionShutdown => "session_shutdown",
            Self::BeforeAgentStart { .. } => "before_agent_start",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::MessageStart => "message_start",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
            Self::TurnEnd { .. } => "turn_end",
            Self::Tool { .. } => "tool",
            Self::Command { .. } => "command",
            Self::Shortcut { .. } => "shortcut",
        }
    }
}

/// A side effect requested by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum HostEffect {
    Notify {
        message: String,
        level: NotifyLevel,
    },
    SetStatus {
        key: String,
        text: Option<String>,
    },
    SendMessage {
        #[serde(flatten)]
        message: OutgoingMessage,
    },
    SetEditorText {
        text: String,
    },
    Print {
        text: String,
    },
}

/// The single answer to one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reply {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<InjectedMessage>,
    /// Text to append to the system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolOutput>,
    /// Whether a command or shortcut was recognised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    fn to(event: &str) -> Self {
        Self {
            event: event.to_string(),
            ..Self::default()
        }
    }
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputLine {
    Effect(HostEffect),
    Reply(Reply),
}

// ============================================================================
// Host
// ============================================================================

/// [`Host`] that turns every call into a [`HostEffect`] on a channel.
#[derive(Debug)]
pub struct StdioHost {
    effects: mpsc::UnboundedSender<HostEffect>,
    usage: Mutex<Option<f64>>,
    flags: Mutex<HashSet<String>>,
}

impl StdioHost {
    /// Creates the host and the receiver its effects arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEffect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            effects: tx,
            usage: Mutex::new(None),
            flags: Mutex::new(HashSet::new()),
        };
        (host, rx)
    }

    pub fn set_usage(&self, percent: Option<f64>) {
        if let Ok(mut usage) = self.usage.lock() {
            *usage = percent;
        }
    }

    /// Adds flags; existing ones stay set.
    pub fn set_flags<I: IntoIterator<Item = String>>(&self, flags: I) {
        if let Ok(mut set) = self.flags.lock() {
            set.extend(flags);
        }
    }

    fn emit(&self, effect: HostEffect) {
        // The receiver lives as long as the bridge; a closed channel only
        // happens during teardown.
        if self.effects.send(effect).is_err() {
            debug!("Dropped host effect after bridge shutdown");
        }
    }
}

#[async_trait]
impl Host for StdioHost {
    fn has_ui(&self) -> bool {
        false
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        self.emit(HostEffect::Notify {
            message: message.to_string(),
            level,
        });
    }

    fn set_status(&self, key: &str, text: Option<&str>) {
        self.emit(HostEffect::SetStatus {
            key: key.to_string(),
            text: text.map(str::to_string),
        });
    }

    fn send_message(&self, message: OutgoingMessage) {
        self.emit(HostEffect::SendMessage { message });
    }

    fn context_usage_percent(&self) -> Option<f64> {
        self.usage.lock().ok().and_then(|usage| *usage)
    }

    fn flag(&self, name: &str) -> bool {
        self.flags
            .lock()
            .map(|flags| flags.contains(name))
            .unwrap_or(false)
    }

    fn set_editor_text(&self, text: &str) {
        self.emit(HostEffect::SetEditorText {
            text: text.to_string(),
        });
    }

    fn print(&self, text: &str) {
        self.emit(HostEffect::Print {
            text: text.to_string(),
        });
    }

    async fn select(&self, _title: &str, _options: &[String]) -> Option<String> {
        None
    }

    async fn input(&self, _title: &str, _placeholder: &str) -> Option<String> {
        None
    }

    async fn editor(&self, _title: &str, _prefill: &str) -> Option<String> {
        None
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Counters reported when the event stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub events: usize,
    pub invalid: usize,
}

/// Owns the coordinator and memory extension for one session.
pub struct Bridge {
    coordinator: Coordinator,
    memory: MemoryExtension,
    host: Arc<StdioHost>,
    effects: mpsc::UnboundedReceiver<HostEffect>,
}

impl Bridge {
    /// Builds a bridge for a session whose project lives at `cwd`.
    pub fn new(config: &Config, client: TrackerClient, cwd: &Path) -> Self {
        let (host, effects) = StdioHost::new();
        if config.observe {
            host.set_flags([OBSERVE_FLAG.to_string()]);
        }
        let host = Arc::new(host);
        let coordinator = Coordinator::new(client, host.clone(), config.workflow.clone());
        let memory = MemoryExtension::new(&config.memory, cwd, host.clone());
        Self {
            coordinator,
            memory,
            host,
            effects,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Dispatches one event and returns its reply.
    ///
    /// Effects produced while handling stay queued until the next
    /// [`drain_effects`](Self::drain_effects).
    pub async fn handle(&mut self, event: HostEvent) -> Reply {
        let mut reply = Reply::to(event.name());
        match event {
            HostEvent::SessionStart { flags } => {
                self.host.set_flags(flags);
                self.coordinator.session_start().await;
                self.memory.session_start().await;
            }
            HostEvent::SessionBeforeCompact => self.coordinator.session_before_compact(),
            HostEvent::SessionShutdown => self.memory.session_shutdown(),
            HostEvent::BeforeAgentStart { context_usage } => {
                if context_usage.is_some() {
                    self.host.set_usage(context_usage);
                }
                reply.message = self.coordinator.before_agent_start().await;
                reply.system_prompt = self.memory.system_prompt_addition().await;
            }
            HostEvent::ToolCall { tool_name, input } => {
                reply.block = match self.coordinator.tool_call(&tool_name, &input).await {
                    Some(block) => Some(block),
                    None => self.memory.tool_call(&tool_name, &input).await,
                };
            }
            HostEvent::ToolResult {
                tool_name,
                input,
                is_error,
                output,
            } => {
                self.coordinator
                    .tool_result(ToolResultEvent {
                        tool_name: &tool_name,
                        input: &input,
                        is_error,
                        output: &output,
                    })
                    .await;
            }
            HostEvent::MessageStart => self.coordinator.message_start(),
            HostEvent::ToolExecutionEnd { tool_name, is_error } => {
                self.coordinator.tool_execution_end(&tool_name, is_error);
            }
            HostEvent::TurnEnd { context_usage } => {
                if context_usage.is_some() {
                    self.host.set_usage(context_usage);
                }
                self.coordinator.turn_end();
            }
            HostEvent::Tool { input } => {
                reply.tool = Some(self.coordinator.execute_tool(input).await);
            }
            HostEvent::Command { name, args } if name == MEMORY_COMMAND => {
                reply.handled = Some(true);
                if let Err(e) = self.memory.run_command(&args).await {
                    warn!(error = %e, "Memory command failed");
                    reply.error = Some(e.to_string());
                }
            }
            HostEvent::Command { name, args } => {
                reply.handled = Some(self.coordinator.run_command(&name, &args).await);
            }
            HostEvent::Shortcut { key } => {
                reply.handled = Some(self.coordinator.run_shortcut(&key).await);
            }
        }
        reply
    }

    /// Effects queued so far, oldest first.
    pub fn drain_effects(&mut self) -> Vec<HostEffect> {
        let mut drained = Vec::new();
        while let Ok(effect) = self.effects.try_recv() {
            drained.push(effect);
        }
        drained
    }

    /// Reads events until EOF, writing effects and replies to `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] if reading or writing fails, or
    /// [`BridgeError::Encode`] if an output line cannot be serialized.
    /// Undecodable input lines are answered, not returned as errors.
    pub async fn serve<R, W>(&mut self, reader: R, writer: &mut W) -> Result<ServeSummary, BridgeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut summary = ServeSummary::default();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            summary.events += 1;

            let reply = match serde_json::from_str::<HostEvent>(&line) {
                Ok(event) => {
                    debug!(event = event.name(), "Bridge event");
                    self.handle(event).await
                }
                Err(source) => {
                    summary.invalid += 1;
                    let err = BridgeError::Decode {
                        line: line_no,
                        source,
                    };
                    warn!(error = %err, "Rejected bridge input");
                    Reply {
                        error: Some(err.to_string()),
                        ..Reply::to("invalid")
                    }
                }
            };

            for effect in self.drain_effects() {
                write_line(writer, &OutputLine::Effect(effect)).await?;
            }
            write_line(writer, &OutputLine::Reply(reply)).await?;
            writer.flush().await?;
        }

        self.memory.session_shutdown();
        for effect in self.drain_effects() {
            write_line(writer, &OutputLine::Effect(effect)).await?;
        }
        writer.flush().await?;

        info!(events = summary.events, invalid = summary.invalid, "Bridge input closed");
        Ok(summary)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("coordinator", &self.coordinator)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &OutputLine) -> Result<(), BridgeError> {
    let mut encoded = serde_json::to_vec(line)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    Ok(())
}
