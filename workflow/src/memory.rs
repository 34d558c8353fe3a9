//! Agent memory extension.
//!
//! Two memory scopes live on disk as markdown: a global one (shared by every
//! project) and a per-project one under `<cwd>/.pi/memories`. Each scope has
//! a `MEMORY.md` index plus any number of topic files. The index contents are
//! appended to the agent's system prompt; topic files are only listed.
//!
//! The loaded scopes are kept in memory and refreshed by a [`MemoryPoller`]
//! whenever the modification-time fingerprint of either directory changes.
//!
//! # Limits
//!
//! | File       | Max lines |
//! |------------|-----------|
//! | `MEMORY.md`| 200       |
//! | topic file | 500       |
//!
//! A `write` that would exceed the limit is blocked before it happens.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::host::{BlockDecision, Host, NotifyLevel};

/// Index file name inside each memory directory.
pub const MEMORY_INDEX_FILE: &str = "MEMORY.md";

/// Line limit for `MEMORY.md`.
pub const MEMORY_INDEX_LIMIT: usize = 200;

/// Line limit for topic files.
pub const MEMORY_TOPIC_LIMIT: usize = 500;

/// Status-bar key for the memory summary.
pub const MEMORY_STATUS_KEY: &str = "memory";

const EMPTY_NUDGE: &str = "Your MEMORY.md is currently empty. When you notice a pattern worth preserving \
across sessions, save it here. Anything in MEMORY.md will be included in your system prompt next time.";

const DISPLAY_PREVIEW_LINES: usize = 5;

// ============================================================================
// Scopes
// ============================================================================

/// A topic file and its line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFile {
    pub name: String,
    pub lines: usize,
}

/// What was loaded from one memory directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryScope {
    /// Trimmed index contents; `None` when missing or blank.
    pub content: Option<String>,
    pub topic_files: Vec<TopicFile>,
}

/// Reads `MEMORY.md` from `dir`. Missing or blank files yield `None`.
pub fn read_memory_index(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join(MEMORY_INDEX_FILE)).ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Lists `*.md` files other than the index, sorted by name.
pub fn list_topic_files(dir: &Path) -> Vec<TopicFile> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md") && name != MEMORY_INDEX_FILE)
        .collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| {
            let content = fs::read_to_string(dir.join(&name)).ok()?;
            Some(TopicFile {
                lines: count_lines(&content),
                name,
            })
        })
        .collect()
}

/// Loads a scope; `None` when it has neither an index nor topic files.
pub fn load_scope(dir: &Path) -> Option<MemoryScope> {
    let content = read_memory_index(dir);
    let topic_files = list_topic_files(dir);
    if content.is_none() && topic_files.is_empty() {
        return None;
    }
    Some(MemoryScope {
        content,
        topic_files,
    })
}

/// Lines as an editor counts them: `"a\n"` is two lines.
fn count_lines(content: &str) -> usize {
    content.split('\n').count()
}

// ============================================================================
// Prompt
// ============================================================================

/// Renders one scope as a `### <Label> Memory` section.
///
/// An index over the limit is cut to the limit and followed by a warning.
pub fn build_memory_section(label: &str, scope: &MemoryScope) -> String {
    let body = match scope.content.as_deref() {
        None => EMPTY_NUDGE.to_string(),
        Some(content) => {
            let lines: Vec<&str> = content.split('\n').collect();
            if lines.len() > MEMORY_INDEX_LIMIT {
                format!(
                    "{}\n\nWARNING: MEMORY.md is {} lines (limit: {MEMORY_INDEX_LIMIT}). Only the first \
{MEMORY_INDEX_LIMIT} lines were loaded. Move detailed content into separate topic files and keep \
MEMORY.md as a concise index.",
                    lines[..MEMORY_INDEX_LIMIT].join("\n"),
                    lines.len()
                )
            } else {
                content.to_string()
            }
        }
    };

    let mut section = format!("### {label} Memory\n\n{body}");
    if !scope.topic_files.is_empty() {
        section.push_str("\n\nTopic files (use read tool to load):");
        for topic in &scope.topic_files {
            section.push_str(&format!("\n- {} ({} lines)", topic.name, topic.lines));
        }
    }
    section
}

/// The `## Agent Memory` block, or an empty string when no scope is loaded.
pub fn build_memory_prompt(global: Option<&MemoryScope>, project: Option<&MemoryScope>) -> String {
    let sections: Vec<String> = [("Global", global), ("Project", project)]
        .into_iter()
        .filter_map(|(label, scope)| scope.map(|s| build_memory_section(label, s)))
        .collect();
    if sections.is_empty() {
        return String::new();
    }
    format!("\n\n## Agent Memory\n\n{}", sections.join("\n\n"))
}

/// Standing instructions on how and when to update memory.
pub fn build_write_instructions(global_dir: &Path, project_dir: &Path) -> String {
    format!(
        "### Updating Memories

As you work, consult your memory files to build on previous experience.

**Memory locations:**
- Global: {global}/MEMORY.md (applies to all projects)
- Project: {project}/MEMORY.md (specific to this project)

**How to save memories:**
- Organize memory semantically by topic, not chronologically
- Use the write and edit tools to update your memory files
- MEMORY.md is always loaded into your context, so keep it under {MEMORY_INDEX_LIMIT} lines as a concise index
- Create separate topic files (e.g., debugging.md, api-design.md) for detailed notes and link to them from MEMORY.md
- Update or remove memories that turn out to be wrong or outdated
- Do not write duplicate memories; check existing memory before writing new entries
- Prefer project memory for project-specific things, global for universal preferences

**When to save:**
- After completing a feature, fixing a tricky bug, or resolving a debugging session
- When you discover a pattern, convention, or gotcha that would generalize beyond the current task
- When the user corrects you or expresses a preference

**What to save:**
- Stable patterns and conventions confirmed across multiple interactions
- Key architectural decisions, important file paths, and project structure
- User preferences for workflow, tools, and communication style
- Solutions to recurring problems and debugging insights
- Only things that generalize; a lesson that applies to one file or one narrow situation is not worth recording

**Quality gate:** Before saving any memory, check each entry against the criteria below. If it doesn't clearly generalize beyond the current session, don't save it.

**What NOT to save:**
- Session-specific context (current task details, in-progress work, temporary state)
- Information that might be incomplete; verify before writing
- Anything that duplicates or contradicts existing project instructions
- Speculative or unverified conclusions from reading a single file

**Explicit user requests:**
- When the user asks you to remember something across sessions (e.g., \"always use bun\", \"never auto-commit\"), save it immediately without waiting for multiple interactions
- When the user asks to forget or stop remembering something, find and remove the relevant entries from your memory files",
        global = global_dir.display(),
        project = project_dir.display(),
    )
}

// ============================================================================
// Write Guard
// ============================================================================

/// Which kind of memory file a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFile {
    Index,
    Topic,
}

impl MemoryFile {
    #[must_use]
    pub fn line_limit(self) -> usize {
        match self {
            Self::Index => MEMORY_INDEX_LIMIT,
            Self::Topic => MEMORY_TOPIC_LIMIT,
        }
    }
}

/// Classifies `path` as a file strictly inside either memory directory.
///
/// Paths are normalized lexically; nothing is read from disk.
pub fn is_memory_path(path: &Path, global_dir: &Path, project_dir: &Path) -> Option<MemoryFile> {
    let resolved = normalize(path);
    let inside = |dir: &Path| {
        let dir = normalize(dir);
        resolved != dir && resolved.starts_with(&dir)
    };
    if !inside(global_dir) && !inside(project_dir) {
        return None;
    }

    match resolved.file_name().and_then(|n| n.to_str()) {
        Some(MEMORY_INDEX_FILE) => Some(MemoryFile::Index),
        _ => Some(MemoryFile::Topic),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Outcome of a line-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCheck {
    pub lines: usize,
    pub limit: usize,
    pub exceeds: bool,
}

/// Counts lines in `content`; exactly `limit` lines is allowed.
pub fn check_line_limit(content: &str, limit: usize) -> LineCheck {
    let lines = count_lines(content);
    LineCheck {
        lines,
        limit,
        exceeds: lines > limit,
    }
}

// ============================================================================
// Display
// ============================================================================

/// `"memory: off"`, `"memory: on · empty"`, or
/// `"memory: on · N scope(s) · N topic(s)"`.
pub fn format_memory_status(enabled: bool, scope_count: usize, topic_count: usize) -> String {
    if !enabled {
        return "memory: off".to_string();
    }
    let mut parts = vec!["memory: on".to_string()];
    if scope_count == 0 {
        parts.push("empty".to_string());
    } else {
        parts.push(format!(
            "{scope_count} {}",
            if scope_count == 1 { "scope" } else { "scopes" }
        ));
        if topic_count > 0 {
            parts.push(format!(
                "{topic_count} {}",
                if topic_count == 1 { "topic" } else { "topics" }
            ));
        }
    }
    parts.join(" · ")
}

/// Multi-line overview of both scopes for the `memory` command.
pub fn format_memory_display(
    global: (&Path, Option<&MemoryScope>),
    project: (&Path, Option<&MemoryScope>),
    enabled: bool,
) -> String {
    let mut lines = vec![
        format!("Memory: {}", if enabled { "enabled" } else { "disabled" }),
        String::new(),
    ];

    for (label, (dir, scope)) in [("Global", global), ("Project", project)] {
        lines.push(format!("{label} ({}):", dir.display()));
        match scope.and_then(|s| s.content.as_deref()) {
            Some(content) => {
                let content_lines: Vec<&str> = content.split('\n').collect();
                lines.push(format!("  MEMORY.md: {} lines", content_lines.len()));
                let preview: Vec<&str> = content_lines
                    .iter()
                    .take(DISPLAY_PREVIEW_LINES)
                    .copied()
                    .collect();
                lines.push(format!("  {}", preview.join("\n  ")));
                if content_lines.len() > DISPLAY_PREVIEW_LINES {
                    lines.push(format!(
                        "  ... ({} more lines)",
                        content_lines.len() - DISPLAY_PREVIEW_LINES
                    ));
                }
            }
            None => lines.push("  MEMORY.md: empty".to_string()),
        }
        let topics = scope.map(|s| s.topic_files.as_slice()).unwrap_or_default();
        if !topics.is_empty() {
            lines.push("  Topic files:".to_string());
            for topic in topics {
                lines.push(format!("    {} ({} lines)", topic.name, topic.lines));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Cheap change detector: `*.md` names with their modification times.
///
/// An unreadable directory yields an empty fingerprint.
pub fn mtime_fingerprint(dir: &Path) -> String {
    let Ok(entries) = fs::read_dir(dir) else {
        return String::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let stamp = fs::metadata(dir.join(&name))
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos().to_string())
                .unwrap_or_else(|| "missing".to_string());
            format!("{name}:{stamp}")
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Extension
// ============================================================================

#[derive(Debug, Default)]
struct Loaded {
    global: Option<MemoryScope>,
    project: Option<MemoryScope>,
    fingerprint: String,
    enabled: bool,
}

/// Directories and shared scopes, cloned into the poller task.
#[derive(Clone)]
struct Shared {
    global_dir: PathBuf,
    project_dir: PathBuf,
    loaded: Arc<RwLock<Loaded>>,
    host: Arc<dyn Host>,
}

/// Scopes and fingerprint read from disk in one blocking pass.
struct DiskSnapshot {
    global: Option<MemoryScope>,
    project: Option<MemoryScope>,
    fingerprint: String,
}

fn combined_fingerprint(global_dir: &Path, project_dir: &Path) -> String {
    format!(
        "{}||{}",
        mtime_fingerprint(global_dir),
        mtime_fingerprint(project_dir)
    )
}

impl Shared {
    /// Runs `read` against both directories on the blocking pool.
    async fn on_disk<T, F>(&self, read: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path, &Path) -> T + Send + 'static,
    {
        let global_dir = self.global_dir.clone();
        let project_dir = self.project_dir.clone();
        match tokio::task::spawn_blocking(move || read(&global_dir, &project_dir)).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Memory file read task failed");
                None
            }
        }
    }

    /// Reads both scopes, then swaps them in under a short write lock.
    async fn reload(&self) {
        let snapshot = self
            .on_disk(|global_dir, project_dir| DiskSnapshot {
                fingerprint: combined_fingerprint(global_dir, project_dir),
                global: load_scope(global_dir),
                project: load_scope(project_dir),
            })
            .await;
        let Some(snapshot) = snapshot else {
            return;
        };

        let mut loaded = self.loaded.write().await;
        loaded.global = snapshot.global;
        loaded.project = snapshot.project;
        loaded.fingerprint = snapshot.fingerprint;
        self.publish(&loaded);
    }

    /// Reloads only when the fingerprint moved. Returns whether it did.
    async fn poll_once(&self) -> bool {
        let Some(fingerprint) = self.on_disk(combined_fingerprint).await else {
            return false;
        };
        if self.loaded.read().await.fingerprint == fingerprint {
            return false;
        }
        debug!("Memory files changed; reloading");
        self.reload().await;
        true
    }

    fn publish(&self, loaded: &Loaded) {
        let scopes = [&loaded.global, &loaded.project];
        let scope_count = scopes.iter().filter(|s| s.is_some()).count();
        let topic_count: usize = scopes
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|s| s.topic_files.len())
            .sum();
        self.host.set_status(
            MEMORY_STATUS_KEY,
            Some(&format_memory_status(loaded.enabled, scope_count, topic_count)),
        );
    }
}

/// Background task that reloads scopes when their files change.
///
/// Aborted on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct MemoryPoller {
    handle: JoinHandle<()>,
}

impl MemoryPoller {
    fn spawn(shared: Shared, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; scopes were just loaded.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                shared.poll_once().await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        // Drop aborts.
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for MemoryPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Session-scoped memory extension.
pub struct MemoryExtension {
    shared: Shared,
    poll_interval: Duration,
    poller: Option<MemoryPoller>,
}

impl MemoryExtension {
    /// Creates the extension for a session rooted at `cwd`.
    pub fn new(config: &MemoryConfig, cwd: &Path, host: Arc<dyn Host>) -> Self {
        Self {
            shared: Shared {
                global_dir: config.global_dir.clone(),
                project_dir: cwd.join(".pi").join("memories"),
                loaded: Arc::new(RwLock::new(Loaded {
                    enabled: true,
                    ..Loaded::default()
                })),
                host,
            },
            poll_interval: config.poll_interval,
            poller: None,
        }
    }

    pub fn global_dir(&self) -> &Path {
        &self.shared.global_dir
    }

    pub fn project_dir(&self) -> &Path {
        &self.shared.project_dir
    }

    pub async fn is_enabled(&self) -> bool {
        self.shared.loaded.read().await.enabled
    }

    /// Loaded scopes as `(global, project)`.
    pub async fn scopes(&self) -> (Option<MemoryScope>, Option<MemoryScope>) {
        let loaded = self.shared.loaded.read().await;
        (loaded.global.clone(), loaded.project.clone())
    }

    /// Loads both scopes, publishes the status and starts polling.
    pub async fn session_start(&mut self) {
        self.shared.reload().await;
        if self.poller.is_none() {
            self.poller = Some(MemoryPoller::spawn(self.shared.clone(), self.poll_interval));
        }
        info!(
            global = %self.shared.global_dir.display(),
            project = %self.shared.project_dir.display(),
            "Memory extension started"
        );
    }

    pub fn session_shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
            debug!("Memory poller stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Reloads if the files changed since the last load.
    pub async fn poll_now(&self) -> bool {
        self.shared.poll_once().await
    }

    /// Text to append to the system prompt, or `None` while disabled.
    pub async fn system_prompt_addition(&self) -> Option<String> {
        let loaded = self.shared.loaded.read().await;
        if !loaded.enabled {
            return None;
        }
        let prompt = build_memory_prompt(loaded.global.as_ref(), loaded.project.as_ref());
        let instructions =
            build_write_instructions(&self.shared.global_dir, &self.shared.project_dir);
        Some(format!("{prompt}\n\n{instructions}"))
    }

    /// Blocks a `write` that would push a memory file past its line limit.
    pub async fn tool_call(&self, tool_name: &str, input: &Value) -> Option<BlockDecision> {
        if !self.is_enabled().await || (tool_name != "write" && tool_name != "edit") {
            return None;
        }
        let path = input.get("path").and_then(Value::as_str)?;
        let kind = is_memory_path(
            Path::new(path),
            &self.shared.global_dir,
            &self.shared.project_dir,
        )?;
        if tool_name != "write" {
            return None;
        }
        let content = input
            .get("content")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())?;

        let check = check_line_limit(content, kind.line_limit());
        if !check.exceeds {
            return None;
        }
        warn!(path, lines = check.lines, limit = check.limit, "Blocked oversized memory write");
        Some(BlockDecision::new(format!(
            "Memory file would be {} lines (limit: {}). Trim the content first.",
            check.lines, check.limit
        )))
    }

    /// Handles `/memory [on|off|edit|edit global]`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the index file cannot be created or written
    /// during `edit`.
    pub async fn run_command(&self, args: &str) -> Result<()> {
        let host = &self.shared.host;
        match args.trim() {
            "on" | "off" => {
                let enabled = args.trim() == "on";
                let mut loaded = self.shared.loaded.write().await;
                loaded.enabled = enabled;
                self.shared.publish(&loaded);
                let text = if enabled {
                    "Memory enabled"
                } else {
                    "Memory disabled for this session"
                };
                host.notify(text, NotifyLevel::Info);
            }
            scope @ ("edit" | "edit global") => {
                let global = scope == "edit global";
                let dir = if global {
                    &self.shared.global_dir
                } else {
                    &self.shared.project_dir
                };
                let path = dir.join(MEMORY_INDEX_FILE);
                fs::create_dir_all(dir)?;
                if !path.exists() {
                    fs::write(&path, "")?;
                }
                let content = fs::read_to_string(&path)?;
                let title = format!(
                    "Edit {} MEMORY.md:",
                    if global { "global" } else { "project" }
                );
                let Some(edited) = host.editor(&title, &content).await else {
                    return Ok(());
                };
                if edited == content {
                    return Ok(());
                }
                fs::write(&path, edited)?;
                self.shared.reload().await;
                host.notify("Memory updated", NotifyLevel::Info);
            }
            _ => {
                self.shared.reload().await;
                let loaded = self.shared.loaded.read().await;
                let display = format_memory_display(
                    (self.shared.global_dir.as_path(), loaded.global.as_ref()),
                    (self.shared.project_dir.as_path(), loaded.project.as_ref()),
                    loaded.enabled,
                );
                host.notify(&display, NotifyLevel::Info);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExtension")
            .field("global_dir", &self.shared.global_dir)
            .field("project_dir", &self.shared.project_dir)
            .field("poll_interval", &self.poll_interval)
            .field("polling", &self.poller.is_some())
            .finish()
    }
}
