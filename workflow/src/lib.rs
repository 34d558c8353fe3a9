//! Beads workflow coordinator - issue-tracker glue for coding-agent sessions.
//!
//! This crate keeps a coding agent working through a `br` issue tracker: it
//! primes each session with the ready queue or a resume context, guards
//! against closing issues over uncommitted work, records edits and commits
//! on the active issue, and nudges the agent to checkpoint its progress.
//!
//! # Overview
//!
//! The [`Coordinator`] is driven by host lifecycle events. It talks to the
//! tracker and to git through a [`TrackerClient`], which never fails: every
//! subprocess outcome, including spawn errors and timeouts, is an
//! [`ExecResult`] value. Output is parsed leniently, so malformed records
//! degrade to defaults instead of errors.
//!
//! A separate [`MemoryExtension`] loads persistent agent memory from
//! markdown files and appends it to the system prompt.
//!
//! # Modules
//!
//! - [`types`]: Issue, comment and dependency records
//! - [`client`]: Subprocess shim for the tracker and git
//! - [`parser`]: Lenient parsers and command matchers
//! - [`format`]: Prompt, status and comment text
//! - [`state`]: Per-session workflow state
//! - [`recovery`]: Resume context for in-progress issues
//! - [`coordinator`]: Lifecycle hooks
//! - [`tool`]: The `beads` tool actions
//! - [`commands`]: User commands and the issue picker
//! - [`memory`]: Agent memory extension
//! - [`host`]: The host surface the coordinator drives
//! - [`bridge`]: Newline-delimited JSON transport for hosts
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`testing`]: Scripted runner and recording host for tests
//! - [`utils`]: Shell tokenizing

pub mod bridge;
pub mod client;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod format;
pub mod host;
pub mod memory;
pub mod parser;
pub mod recovery;
pub mod state;
pub mod testing;
pub mod tool;
pub mod types;
pub mod utils;

pub use bridge::{Bridge, BridgeError, HostEffect, HostEvent, Reply, StdioHost};
pub use client::{CommandRunner, ExecResult, ProcessRunner, TrackerClient};
pub use config::{Config, ConfigError, WorkflowSettings};
pub use coordinator::{Coordinator, ToolResultEvent};
pub use error::{Result, StateError, WorkflowError};
pub use host::{Delivery, Host, NotifyLevel, OutgoingMessage};
pub use memory::{MemoryExtension, MemoryScope};
pub use state::WorkflowState;
pub use tool::{ToolDetails, ToolInput, ToolOutput};
pub use types::{Action, IssueStatus, IssueSummary};
