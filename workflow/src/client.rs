//! Tracker-client shim.
//!
//! Every subprocess this crate starts goes through a [`CommandRunner`]. The
//! runner never fails: spawn errors and timeouts are folded into an
//! [`ExecResult`] with exit code 1 so that callers only ever branch on data.
//!
//! [`TrackerClient`] layers the two external CLIs (`br` and `git`) and their
//! default timeouts on top of a shared runner.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Exit code used for synthetic failures (spawn error, timeout).
pub const SYNTHETIC_FAILURE_CODE: i32 = 1;

/// Uniform outcome of a subprocess call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// The call was cut off by its timeout.
    pub timed_out: bool,
}

impl ExecResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// A synthetic failure carrying `message` on stderr.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: SYNTHETIC_FAILURE_CODE,
            timed_out: false,
        }
    }

    /// A synthetic failure for a call that exceeded its timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(message)
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external programs.
///
/// Implementations must be total: any failure is reported through the
/// returned [`ExecResult`], never by panicking.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> ExecResult;
}

/// [`CommandRunner`] backed by real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    workdir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Creates a runner whose children start in `workdir`, or in our own
    /// working directory when `None`.
    pub fn new(workdir: Option<PathBuf>) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> ExecResult {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        // Dropping the output future on timeout kills the child.
        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => ExecResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(SYNTHETIC_FAILURE_CODE),
                timed_out: false,
            },
            Ok(Err(e)) => {
                warn!(program, error = %e, "Failed to spawn subprocess");
                ExecResult::failure(e.to_string())
            }
            Err(_) => {
                let millis = timeout.as_millis();
                warn!(program, timeout_ms = %millis, "Subprocess timed out");
                ExecResult::timeout(format!("{program} timed out after {millis}ms"))
            }
        }
    }
}

/// Handle to the tracker and version-control CLIs.
///
/// Cheap to clone; clones share the same runner.
#[derive(Clone)]
pub struct TrackerClient {
    runner: Arc<dyn CommandRunner>,
    tracker_bin: String,
    git_bin: String,
    tracker_timeout: Duration,
    git_timeout: Duration,
}

impl std::fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerClient")
            .field("tracker_bin", &self.tracker_bin)
            .field("git_bin", &self.git_bin)
            .field("tracker_timeout", &self.tracker_timeout)
            .field("git_timeout", &self.git_timeout)
            .finish_non_exhaustive()
    }
}

impl TrackerClient {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &ClientConfig) -> Self {
        Self {
            runner,
            tracker_bin: config.tracker_bin.clone(),
            git_bin: config.git_bin.clone(),
            tracker_timeout: config.tracker_timeout,
            git_timeout: config.git_timeout,
        }
    }

    /// Runs the tracker CLI with its default timeout.
    pub async fn br(&self, args: &[&str]) -> ExecResult {
        self.br_with_timeout(args, self.tracker_timeout).await
    }

    pub async fn br_with_timeout(&self, args: &[&str], timeout: Duration) -> ExecResult {
        let args = owned(args);
        let result = self.runner.run(&self.tracker_bin, &args, timeout).await;
        if !result.success() {
            debug!(
                command = %self.command_line(&args),
                exit_code = result.exit_code,
                timed_out = result.timed_out,
                "Tracker call failed"
            );
        }
        result
    }

    /// Runs the version-control CLI with its default timeout.
    pub async fn git(&self, args: &[&str]) -> ExecResult {
        self.git_with_timeout(args, self.git_timeout).await
    }

    pub async fn git_with_timeout(&self, args: &[&str], timeout: Duration) -> ExecResult {
        let args = owned(args);
        self.runner.run(&self.git_bin, &args, timeout).await
    }

    /// Starts a tracker call without waiting for it.
    ///
    /// The outcome is logged at debug level and otherwise discarded. The
    /// returned handle may be dropped.
    pub fn spawn_br_best_effort(&self, args: Vec<String>, timeout: Duration) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let program = self.tracker_bin.clone();
        tokio::spawn(async move {
            let result = runner.run(&program, &args, timeout).await;
            debug!(
                program = %program,
                subcommand = args.first().map(String::as_str).unwrap_or(""),
                exit_code = result.exit_code,
                timed_out = result.timed_out,
                "Best-effort tracker call finished"
            );
        })
    }

    /// Renders a tracker invocation the way a user would type it.
    #[must_use]
    pub fn command_line<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut line = self.tracker_bin.clone();
        for arg in args {
            line.push(' ');
            line.push_str(arg.as_ref());
        }
        line
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}
