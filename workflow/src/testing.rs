//! Test doubles for the subprocess and host seams.
//!
//! [`ScriptedRunner`] answers subprocess calls from a pattern table and
//! tracks how many calls overlap. [`RecordingHost`] captures everything the
//! coordinator shows or sends and replays scripted dialog answers.
//!
//! Both are shared handles: clones observe the same recordings.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{CommandRunner, ExecResult, TrackerClient};
use crate::config::ClientConfig;
use crate::host::{Host, NotifyLevel, OutgoingMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Scripted Runner
// ============================================================================

/// One subprocess call seen by a [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl RecordedCall {
    /// Arguments joined by single spaces.
    pub fn joined(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Default)]
struct Script {
    rules: Mutex<Vec<(String, ExecResult)>>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// [`CommandRunner`] answering from a pattern table.
///
/// A call matches the first rule whose pattern is a substring of its
/// space-joined arguments. Unmatched calls fail with `"not found"`.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Script>,
    delay: Option<Duration>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers calls matching `pattern` with a successful `stdout`.
    #[must_use]
    pub fn ok(self, pattern: &str, stdout: impl Into<String>) -> Self {
        self.respond(pattern, ExecResult::ok(stdout))
    }

    /// Answers calls matching `pattern` with a failure carrying `stderr`.
    #[must_use]
    pub fn fail(self, pattern: &str, stderr: impl Into<String>) -> Self {
        self.respond(pattern, ExecResult::failure(stderr))
    }

    #[must_use]
    pub fn respond(self, pattern: &str, result: ExecResult) -> Self {
        lock(&self.script.rules).push((pattern.to_string(), result));
        self
    }

    /// Makes every call take `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the answer for `pattern`, or adds it when missing.
    ///
    /// Usable after the runner has been handed to a client.
    pub fn set(&self, pattern: &str, result: ExecResult) {
        let mut rules = lock(&self.script.rules);
        match rules.iter_mut().find(|(p, _)| p == pattern) {
            Some(rule) => rule.1 = result,
            None => rules.push((pattern.to_string(), result)),
        }
    }

    /// A client with default binaries and timeouts backed by this runner.
    pub fn client(&self) -> TrackerClient {
        TrackerClient::new(Arc::new(self.clone()), &ClientConfig::default())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.script.calls).clone()
    }

    /// Number of recorded calls whose joined arguments contain `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        lock(&self.script.calls)
            .iter()
            .filter(|call| call.joined().contains(pattern))
            .count()
    }

    /// Number of recorded calls whose joined arguments start with `prefix`.
    ///
    /// Use this for subcommand names that also occur as flag values, such as
    /// `update` inside `--sort updated_at`.
    pub fn count_leading(&self, prefix: &str) -> usize {
        lock(&self.script.calls)
            .iter()
            .filter(|call| call.joined().starts_with(prefix))
            .count()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.script.peak.load(Ordering::SeqCst)
    }

    /// Forgets the peak seen so far, e.g. after session setup.
    pub fn reset_peak(&self) {
        self.script.peak.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> ExecResult {
        let call = RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        };
        let joined = call.joined();
        lock(&self.script.calls).push(call);

        let now = self.script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = lock(&self.script.rules)
            .iter()
            .find(|(pattern, _)| joined.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| ExecResult::failure("not found"));

        self.script.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Recording Host
// ============================================================================

#[derive(Default)]
struct Recording {
    has_ui: bool,
    usage: Mutex<Option<f64>>,
    flags: Mutex<HashSet<String>>,
    notifications: Mutex<Vec<(String, NotifyLevel)>>,
    statuses: Mutex<Vec<(String, Option<String>)>>,
    messages: Mutex<Vec<OutgoingMessage>>,
    editor_text: Mutex<Option<String>>,
    printed: Mutex<Vec<String>>,
    selections: Mutex<VecDeque<Option<String>>>,
    inputs: Mutex<VecDeque<Option<String>>>,
    editors: Mutex<VecDeque<Option<String>>>,
}

/// [`Host`] that records everything and answers dialogs from queues.
///
/// An empty dialog queue answers `None`, as a cancelled dialog would.
#[derive(Clone, Default)]
pub struct RecordingHost {
    inner: Arc<Recording>,
}

impl RecordingHost {
    /// A host without a UI.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ui() -> Self {
        Self {
            inner: Arc::new(Recording {
                has_ui: true,
                ..Recording::default()
            }),
        }
    }

    pub fn set_usage(&self, percent: Option<f64>) {
        *lock(&self.inner.usage) = percent;
    }

    pub fn set_flag(&self, name: &str) {
        lock(&self.inner.flags).insert(name.to_string());
    }

    pub fn queue_select(&self, answer: Option<&str>) {
        lock(&self.inner.selections).push_back(answer.map(str::to_string));
    }

    pub fn queue_input(&self, answer: Option<&str>) {
        lock(&self.inner.inputs).push_back(answer.map(str::to_string));
    }

    pub fn queue_editor(&self, answer: Option<&str>) {
        lock(&self.inner.editors).push_back(answer.map(str::to_string));
    }

    pub fn notifications(&self) -> Vec<(String, NotifyLevel)> {
        lock(&self.inner.notifications).clone()
    }

    /// Notification texts only, in order.
    pub fn notified(&self) -> Vec<String> {
        lock(&self.inner.notifications)
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn statuses(&self) -> Vec<(String, Option<String>)> {
        lock(&self.inner.statuses).clone()
    }

    /// Latest value set for `key`; `Some(None)` means it was cleared.
    pub fn last_status(&self, key: &str) -> Option<Option<String>> {
        lock(&self.inner.statuses)
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, text)| text.clone())
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        lock(&self.inner.messages).clone()
    }

    pub fn messages_of_type(&self, custom_type: &str) -> Vec<OutgoingMessage> {
        lock(&self.inner.messages)
            .iter()
            .filter(|m| m.custom_type == custom_type)
            .cloned()
            .collect()
    }

    pub fn editor_text(&self) -> Option<String> {
        lock(&self.inner.editor_text).clone()
    }

    pub fn printed(&self) -> Vec<String> {
        lock(&self.inner.printed).clone()
    }

    /// Everything shown to the user, notified or printed, in order per channel.
    pub fn output(&self) -> Vec<String> {
        let mut all = self.notified();
        all.extend(self.printed());
        all
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn has_ui(&self) -> bool {
        self.inner.has_ui
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        lock(&self.inner.notifications).push((message.to_string(), level));
    }

    fn set_status(&self, key: &str, text: Option<&str>) {
        lock(&self.inner.statuses).push((key.to_string(), text.map(str::to_string)));
    }

    fn send_message(&self, message: OutgoingMessage) {
        lock(&self.inner.messages).push(message);
    }

    fn context_usage_percent(&self) -> Option<f64> {
        *lock(&self.inner.usage)
    }

    fn flag(&self, name: &str) -> bool {
        lock(&self.inner.flags).contains(name)
    }

    fn set_editor_text(&self, text: &str) {
        *lock(&self.inner.editor_text) = Some(text.to_string());
    }

    fn print(&self, text: &str) {
        lock(&self.inner.printed).push(text.to_string());
    }

    async fn select(&self, _title: &str, _options: &[String]) -> Option<String> {
        lock(&self.inner.selections).pop_front().flatten()
    }

    async fn input(&self, _title: &str, _placeholder: &str) -> Option<String> {
        lock(&self.inner.inputs).pop_front().flatten()
    }

    async fn editor(&self, _title: &str, _prefill: &str) -> Option<String> {
        lock(&self.inner.editors).pop_front().flatten()
    }
}
