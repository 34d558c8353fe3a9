//! Configuration for the beads workflow coordinator.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `BEADS_TRACKER_BIN` | No | `br` | Issue-tracker CLI executable |
//! | `BEADS_GIT_BIN` | No | `git` | Version-control CLI executable |
//! | `BEADS_TRACKER_TIMEOUT_MS` | No | 15000 | Default tracker call timeout |
//! | `BEADS_GIT_TIMEOUT_MS` | No | 5000 | Default git call timeout |
//! | `BEADS_WORKDIR` | No | current dir | Working directory for subprocesses |
//! | `BEADS_CHECKPOINT_TURNS` | No | 8 | Turns without a checkpoint before nudging |
//! | `BEADS_CONTEXT_THRESHOLD` | No | 85 | Context-usage percent for the reminder (1-100) |
//! | `BEADS_ENRICH_LIMIT` | No | 5 | Ready issues enriched with dependencies |
//! | `BEADS_OBSERVE` | No | false | Emit lifecycle diagnostics |
//! | `BEADS_MEMORY_DIR` | No | `~/.pi/memories` | Global memory directory |
//! | `BEADS_MEMORY_POLL_SECS` | No | 5 | Memory fingerprint poll interval |
//!
//! # Example
//!
//! ```no_run
//! use beads_workflow::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Tracker: {}", config.client.tracker_bin);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

/// Default tracker CLI.
const DEFAULT_TRACKER_BIN: &str = "br";

/// Default version-control CLI.
const DEFAULT_GIT_BIN: &str = "git";

/// Default timeout for tracker calls.
pub const DEFAULT_TRACKER_TIMEOUT_MS: u64 = 15_000;

/// Default timeout for git calls.
pub const DEFAULT_GIT_TIMEOUT_MS: u64 = 5_000;

/// Default number of turns between checkpoint nudges.
pub const DEFAULT_CHECKPOINT_TURNS: u64 = 8;

/// Default context-usage percent that triggers the one-shot reminder.
pub const DEFAULT_CONTEXT_THRESHOLD: f64 = 85.0;

/// Default number of ready issues enriched with dependency lookups.
pub const DEFAULT_ENRICH_LIMIT: usize = 5;

/// Default global memory directory relative to home.
const DEFAULT_MEMORY_DIR: &str = ".pi/memories";

/// Default memory poll interval.
const DEFAULT_MEMORY_POLL_SECS: u64 = 5;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Settings for the tracker-client shim.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Tracker CLI executable.
    pub tracker_bin: String,

    /// Version-control CLI executable.
    pub git_bin: String,

    /// Default timeout for tracker calls.
    pub tracker_timeout: Duration,

    /// Default timeout for git calls.
    pub git_timeout: Duration,

    /// Working directory for every subprocess. `None` inherits ours.
    pub workdir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tracker_bin: DEFAULT_TRACKER_BIN.to_string(),
            git_bin: DEFAULT_GIT_BIN.to_string(),
            tracker_timeout: Duration::from_millis(DEFAULT_TRACKER_TIMEOUT_MS),
            git_timeout: Duration::from_millis(DEFAULT_GIT_TIMEOUT_MS),
            workdir: None,
        }
    }
}

/// Thresholds used by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Turns without a checkpoint before the nudge fires.
    pub checkpoint_turns: u64,

    /// Context-usage percent at which the one-shot reminder fires.
    pub context_threshold_percent: f64,

    /// How many ready issues get dependency enrichment.
    pub enrich_limit: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            checkpoint_turns: DEFAULT_CHECKPOINT_TURNS,
            context_threshold_percent: DEFAULT_CONTEXT_THRESHOLD,
            enrich_limit: DEFAULT_ENRICH_LIMIT,
        }
    }
}

/// Settings for the memory extension.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Global memory directory.
    pub global_dir: PathBuf,

    /// Interval between fingerprint polls.
    pub poll_interval: Duration,
}

/// Configuration for the bridge binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Subprocess settings.
    pub client: ClientConfig,

    /// Coordinator thresholds.
    pub workflow: WorkflowSettings,

    /// Memory extension settings.
    pub memory: MemoryConfig,

    /// Whether lifecycle diagnostics are emitted.
    pub observe: bool,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a numeric variable cannot be parsed or is
    /// out of range, or if the home directory is needed for the default
    /// memory directory and cannot be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tracker_bin =
            env::var("BEADS_TRACKER_BIN").unwrap_or_else(|_| DEFAULT_TRACKER_BIN.to_string());
        let git_bin = env::var("BEADS_GIT_BIN").unwrap_or_else(|_| DEFAULT_GIT_BIN.to_string());

        let tracker_timeout = Duration::from_millis(parse_positive_u64(
            "BEADS_TRACKER_TIMEOUT_MS",
            DEFAULT_TRACKER_TIMEOUT_MS,
        )?);
        let git_timeout = Duration::from_millis(parse_positive_u64(
            "BEADS_GIT_TIMEOUT_MS",
            DEFAULT_GIT_TIMEOUT_MS,
        )?);

        let workdir = env::var("BEADS_WORKDIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let checkpoint_turns =
            parse_positive_u64("BEADS_CHECKPOINT_TURNS", DEFAULT_CHECKPOINT_TURNS)?;

        let context_threshold_percent = match env::var("BEADS_CONTEXT_THRESHOLD") {
            Ok(val) => {
                let percent = val.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                    key: "BEADS_CONTEXT_THRESHOLD".to_string(),
                    message: format!("expected number 1-100, got '{val}'"),
                })?;
                if !(1.0..=100.0).contains(&percent) {
                    return Err(ConfigError::InvalidValue {
                        key: "BEADS_CONTEXT_THRESHOLD".to_string(),
                        message: format!("threshold must be between 1 and 100, got {percent}"),
                    });
                }
                percent
            }
            Err(_) => DEFAULT_CONTEXT_THRESHOLD,
        };

        let enrich_limit = match env::var("BEADS_ENRICH_LIMIT") {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                key: "BEADS_ENRICH_LIMIT".to_string(),
                message: format!("expected non-negative integer, got '{val}'"),
            })?,
            Err(_) => DEFAULT_ENRICH_LIMIT,
        };

        let observe = env::var("BEADS_OBSERVE")
            .map(|val| parse_flag(&val))
            .unwrap_or(false);

        // Only touch the home directory when the default is needed
        let global_dir = match env::var("BEADS_MEMORY_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_MEMORY_DIR)
            }
        };

        let poll_interval = Duration::from_secs(parse_positive_u64(
            "BEADS_MEMORY_POLL_SECS",
            DEFAULT_MEMORY_POLL_SECS,
        )?);

        Ok(Self {
            client: ClientConfig {
                tracker_bin,
                git_bin,
                tracker_timeout,
                git_timeout,
                workdir,
            },
            workflow: WorkflowSettings {
                checkpoint_turns,
                context_threshold_percent,
                enrich_limit,
            },
            memory: MemoryConfig {
                global_dir,
                poll_interval,
            },
            observe,
        })
    }
}

/// Parses an optional positive integer variable, falling back to `default`.
fn parse_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let parsed = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected positive integer, got '{val}'"),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}

/// Interprets a boolean-ish environment value.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Runs `f` with all BEADS_* vars removed, restoring them afterwards.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("BEADS_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| k.starts_with("BEADS_")) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            env::set_var("BEADS_MEMORY_DIR", "/tmp/memories");

            let config = Config::from_env().expect("should parse default config");

            assert_eq!(config.client.tracker_bin, "br");
            assert_eq!(config.client.git_bin, "git");
            assert_eq!(config.client.tracker_timeout, Duration::from_millis(15_000));
            assert_eq!(config.client.git_timeout, Duration::from_millis(5_000));
            assert!(config.client.workdir.is_none());
            assert_eq!(config.workflow, WorkflowSettings::default());
            assert!(!config.observe);
            assert_eq!(config.memory.global_dir, PathBuf::from("/tmp/memories"));
            assert_eq!(config.memory.poll_interval, Duration::from_secs(5));
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("BEADS_TRACKER_BIN", "/opt/bin/br");
            env::set_var("BEADS_GIT_BIN", "/usr/local/bin/git");
            env::set_var("BEADS_TRACKER_TIMEOUT_MS", "20000");
            env::set_var("BEADS_GIT_TIMEOUT_MS", "3000");
            env::set_var("BEADS_WORKDIR", "/work/repo");
            env::set_var("BEADS_CHECKPOINT_TURNS", "4");
            env::set_var("BEADS_CONTEXT_THRESHOLD", "90");
            env::set_var("BEADS_ENRICH_LIMIT", "0");
            env::set_var("BEADS_OBSERVE", "yes");
            env::set_var("BEADS_MEMORY_DIR", "/custom/memories");
            env::set_var("BEADS_MEMORY_POLL_SECS", "30");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.client.tracker_bin, "/opt/bin/br");
            assert_eq!(config.client.git_bin, "/usr/local/bin/git");
            assert_eq!(config.client.tracker_timeout, Duration::from_millis(20_000));
            assert_eq!(config.client.git_timeout, Duration::from_millis(3_000));
            assert_eq!(config.client.workdir, Some(PathBuf::from("/work/repo")));
            assert_eq!(config.workflow.checkpoint_turns, 4);
            assert_eq!(config.workflow.context_threshold_percent, 90.0);
            assert_eq!(config.workflow.enrich_limit, 0);
            assert!(config.observe);
            assert_eq!(config.memory.global_dir, PathBuf::from("/custom/memories"));
            assert_eq!(config.memory.poll_interval, Duration::from_secs(30));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_rejected() {
        with_clean_env(|| {
            env::set_var("BEADS_MEMORY_DIR", "/tmp/memories");
            env::set_var("BEADS_TRACKER_TIMEOUT_MS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "BEADS_TRACKER_TIMEOUT_MS"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_checkpoint_turns_rejected() {
        with_clean_env(|| {
            env::set_var("BEADS_MEMORY_DIR", "/tmp/memories");
            env::set_var("BEADS_CHECKPOINT_TURNS", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "BEADS_CHECKPOINT_TURNS" && message.contains("greater than 0")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_context_threshold_out_of_range() {
        with_clean_env(|| {
            env::set_var("BEADS_MEMORY_DIR", "/tmp/memories");
            env::set_var("BEADS_CONTEXT_THRESHOLD", "150");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "BEADS_CONTEXT_THRESHOLD" && message.contains("between 1 and 100")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_blank_workdir_ignored() {
        with_clean_env(|| {
            env::set_var("BEADS_MEMORY_DIR", "/tmp/memories");
            env::set_var("BEADS_WORKDIR", "   ");

            let config = Config::from_env().expect("should parse config");
            assert!(config.client.workdir.is_none());
        });
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }
}
