//! Session-scoped workflow state.
//!
//! One [`WorkflowState`] lives for the duration of a host session and is
//! owned by the coordinator. Hooks run one at a time, and every mutation
//! here is synchronous, so no locking is needed.
//!
//! # Active-issue Lifecycle
//!
//! ```text
//!   Idle --claim(id)--> Claimed(id) --close(id)--> Idle
//!                         |   ^
//!                         +---+ record_edit / checkpoint / tick
//! ```
//!
//! # Invariants
//!
//! - At most one issue is active.
//! - Only the active issue has an edited-files entry.
//! - `last_checkpoint_turn <= turn_index`.
//! - The prime flag is cleared by the same call that reads it.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::error::StateError;
use crate::types::SessionMode;

/// Turn counter and the turn at which progress was last recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckpointCounter {
    pub last_checkpoint_turn: u64,
    pub turn_index: u64,
}

impl CheckpointCounter {
    #[must_use]
    pub fn turns_since_checkpoint(&self) -> u64 {
        self.turn_index - self.last_checkpoint_turn
    }

    fn mark(&mut self) {
        self.last_checkpoint_turn = self.turn_index;
    }
}

/// Whether a checkpoint nudge is due.
#[must_use]
pub fn should_nudge_checkpoint(counter: CheckpointCounter, threshold: u64, has_active_issue: bool) -> bool {
    has_active_issue && counter.turns_since_checkpoint() >= threshold
}

/// Whether the one-shot context reminder should fire.
///
/// Unknown or non-finite usage never fires.
#[must_use]
pub fn should_show_context_reminder(
    usage_percent: Option<f64>,
    threshold_percent: f64,
    already_shown: bool,
    workflow_enabled: bool,
) -> bool {
    match usage_percent {
        Some(usage) if usage.is_finite() && threshold_percent > 0.0 => {
            workflow_enabled && !already_shown && usage >= threshold_percent
        }
        _ => false,
    }
}

/// Mutable bookkeeping for one host session.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    is_tracker_project: bool,
    workflow_enabled: bool,
    should_prime_next_turn: bool,
    context_reminder_shown: bool,
    cached_mode_text: String,
    current_issue_id: Option<String>,
    edited_files_by_issue: HashMap<String, BTreeSet<String>>,
    checkpoint: CheckpointCounter,
    auto_continue_pending: bool,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn is_tracker_project(&self) -> bool {
        self.is_tracker_project
    }

    pub fn workflow_enabled(&self) -> bool {
        self.workflow_enabled
    }

    pub fn should_prime_next_turn(&self) -> bool {
        self.should_prime_next_turn
    }

    pub fn context_reminder_shown(&self) -> bool {
        self.context_reminder_shown
    }

    pub fn auto_continue_pending(&self) -> bool {
        self.auto_continue_pending
    }

    pub fn current_issue_id(&self) -> Option<&str> {
        self.current_issue_id.as_deref()
    }

    pub fn checkpoint(&self) -> CheckpointCounter {
        self.checkpoint
    }

    /// Files recorded against `issue_id`, if it has an entry.
    pub fn edited_files(&self, issue_id: &str) -> Option<&BTreeSet<String>> {
        self.edited_files_by_issue.get(issue_id)
    }

    /// Memoized tracking-mode label; empty when not yet computed.
    pub fn cached_mode_text(&self) -> &str {
        &self.cached_mode_text
    }

    pub fn set_cached_mode_text(&mut self, text: String) {
        self.cached_mode_text = text;
    }

    // ------------------------------------------------------------------------
    // Mode
    // ------------------------------------------------------------------------

    /// Applies the session-start tracker probe.
    pub fn apply_session_probe(&mut self, mode: SessionMode) {
        self.is_tracker_project = mode.is_tracker_project;
        self.workflow_enabled = mode.workflow_enabled;
        self.should_prime_next_turn = mode.workflow_enabled;
        self.cached_mode_text.clear();
        info!(
            is_tracker_project = mode.is_tracker_project,
            workflow_enabled = mode.workflow_enabled,
            "Session probe applied"
        );
    }

    /// Turns the workflow on or off at the user's request.
    ///
    /// Re-arms priming and the context reminder.
    pub fn set_mode(&mut self, enabled: bool) {
        self.workflow_enabled = enabled;
        self.should_prime_next_turn = enabled;
        self.context_reminder_shown = false;
        if enabled && self.is_tracker_project {
            self.cached_mode_text.clear();
        }
        info!(workflow_enabled = enabled, "Workflow mode changed");
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Makes `issue_id` the active issue.
    ///
    /// Claiming the already-active issue restarts its bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AlreadyClaimed`] if a different issue is active.
    pub fn claim(&mut self, issue_id: &str) -> Result<(), StateError> {
        self.check_claim(issue_id)?;

        self.current_issue_id = Some(issue_id.to_string());
        self.edited_files_by_issue.clear();
        self.edited_files_by_issue
            .insert(issue_id.to_string(), BTreeSet::new());
        self.checkpoint = CheckpointCounter::default();
        info!(issue_id, "Issue claimed");
        Ok(())
    }

    /// Checks whether `issue_id` may be claimed without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AlreadyClaimed`] if a different issue is active.
    pub fn check_claim(&self, issue_id: &str) -> Result<(), StateError> {
        match self.current_issue_id.as_deref() {
            Some(current) if current != issue_id => Err(StateError::AlreadyClaimed {
                current: current.to_string(),
                requested: issue_id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Adopts an in-progress issue found by recovery.
    ///
    /// Unlike [`claim`](Self::claim) this keeps the turn counters, since the
    /// issue was already being worked on.
    pub fn resume(&mut self, issue_id: &str) {
        if self.current_issue_id.as_deref() == Some(issue_id) {
            return;
        }
        self.edited_files_by_issue.retain(|id, _| id == issue_id);
        self.current_issue_id = Some(issue_id.to_string());
        info!(issue_id, "Resumed in-progress issue");
    }

    /// Records an edited path against the active issue.
    ///
    /// Returns `false` when no issue is active.
    pub fn record_edit(&mut self, path: &str) -> bool {
        let Some(current) = self.current_issue_id.as_deref() else {
            return false;
        };
        let inserted = self
            .edited_files_by_issue
            .entry(current.to_string())
            .or_default()
            .insert(path.to_string());
        if inserted {
            debug!(issue_id = current, path, "Recorded edited file");
        }
        true
    }

    /// Records that progress was checkpointed this turn.
    pub fn checkpoint_now(&mut self) {
        self.checkpoint.mark();
    }

    /// Ends the lifecycle of `issue_id` if it is the active issue.
    ///
    /// Returns `true` when the active issue was closed.
    pub fn close(&mut self, issue_id: &str) -> bool {
        if self.current_issue_id.as_deref() != Some(issue_id) {
            debug!(issue_id, "Closed issue was not the active issue");
            return false;
        }
        self.current_issue_id = None;
        self.edited_files_by_issue.remove(issue_id);
        self.checkpoint = CheckpointCounter::default();
        info!(issue_id, "Issue closed");
        true
    }

    /// Advances the turn counter at turn end.
    ///
    /// Returns the number of turns since the last checkpoint when a nudge is
    /// due; the checkpoint is then advanced so the next nudge needs another
    /// full window. Does nothing while the workflow is disabled.
    pub fn tick(&mut self, threshold: u64) -> Option<u64> {
        if !self.workflow_enabled {
            return None;
        }
        self.checkpoint.turn_index += 1;

        if !should_nudge_checkpoint(self.checkpoint, threshold, self.current_issue_id.is_some()) {
            return None;
        }
        let turns = self.checkpoint.turns_since_checkpoint();
        self.checkpoint.mark();
        Some(turns)
    }

    // ------------------------------------------------------------------------
    // Turn Flags
    // ------------------------------------------------------------------------

    /// Asks for the next turn to be primed.
    pub fn request_prime(&mut self) {
        self.should_prime_next_turn = true;
    }

    /// Consumes the prime flag. Returns `true` at most once per request.
    pub fn take_prime(&mut self) -> bool {
        if !self.workflow_enabled || !self.should_prime_next_turn {
            return false;
        }
        self.should_prime_next_turn = false;
        true
    }

    /// Called as each agent turn begins.
    pub fn begin_agent_turn(&mut self) {
        self.auto_continue_pending = false;
    }

    /// Claims the single auto-continue slot for this turn.
    pub fn try_mark_auto_continue(&mut self) -> bool {
        if self.auto_continue_pending {
            return false;
        }
        self.auto_continue_pending = true;
        true
    }

    /// Claims the one-shot context reminder if `usage_percent` warrants it.
    pub fn try_mark_context_reminder(&mut self, usage_percent: Option<f64>, threshold_percent: f64) -> bool {
        if !should_show_context_reminder(
            usage_percent,
            threshold_percent,
            self.context_reminder_shown,
            self.workflow_enabled,
        ) {
            return false;
        }
        self.context_reminder_shown = true;
        true
    }

    pub fn reset_context_reminder(&mut self) {
        self.context_reminder_shown = false;
    }
}
