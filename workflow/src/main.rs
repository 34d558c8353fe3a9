//! Beads bridge - runs the workflow coordinator for an external host.
//!
//! # Commands
//!
//! - `beads-bridge serve`: Speak the newline-delimited JSON bridge on stdin/stdout
//! - `beads-bridge status`: Probe the tracker and print the status line
//! - `beads-bridge tool <action>`: Run one `beads` tool action and print its text
//!
//! Logs always go to stderr; stdout belongs to the bridge protocol.
//!
//! # Environment Variables
//!
//! See `beads_workflow::config` for available configuration options.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use beads_workflow::bridge::{Bridge, HostEffect, StdioHost};
use beads_workflow::client::{ProcessRunner, TrackerClient};
use beads_workflow::config::Config;
use beads_workflow::coordinator::Coordinator;
use beads_workflow::host::STATUS_KEY;
use beads_workflow::tool::ToolInput;
use beads_workflow::types::Action;

/// Beads bridge - issue-tracker workflow for coding-agent sessions.
#[derive(Parser, Debug)]
#[command(name = "beads-bridge")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    BEADS_TRACKER_BIN          Tracker CLI (default: br)
    BEADS_GIT_BIN              Git CLI (default: git)
    BEADS_WORKDIR              Working directory for subprocesses
    BEADS_CHECKPOINT_TURNS     Turns before a checkpoint nudge (default: 8)
    BEADS_CONTEXT_THRESHOLD    Context reminder percent (default: 85)
    BEADS_MEMORY_DIR           Global memory directory (default: ~/.pi/memories)
    RUST_LOG                   Log filter (default: info)

EXAMPLES:
    # Serve a host over stdin/stdout
    beads-bridge serve

    # Show the ready queue
    beads-bridge tool ready

    # Claim an issue
    beads-bridge tool claim --id bd-a1b2
")]
struct Cli {
    /// Log output format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the host bridge until stdin closes or a shutdown signal arrives.
    Serve,

    /// Probe the tracker and print the status line.
    Status,

    /// Run one tool action and print its text.
    ///
    /// Exits with status 1 when the action reports an error.
    Tool {
        /// Action to run (ready, show, claim, close, comment, create, status).
        action: Action,

        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long = "type")]
        issue_type: Option<String>,

        /// Priority 0-4.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=4))]
        priority: Option<u8>,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = Config::from_env().context("Failed to load configuration")?;
    let runner = Arc::new(ProcessRunner::new(config.client.workdir.clone()));
    let client = TrackerClient::new(runner, &config.client);

    match cli.command {
        Command::Serve => run_serve(&config, client).await,
        Command::Status => run_status(&config, client).await,
        Command::Tool {
            action,
            id,
            title,
            description,
            issue_type,
            priority,
            comment,
            reason,
        } => {
            let input = ToolInput {
                action,
                id,
                title,
                description,
                issue_type,
                priority,
                comment,
                reason,
            };
            run_tool(&config, client, input).await
        }
    }
}

/// Serves the bridge protocol on stdin/stdout.
async fn run_serve(config: &Config, client: TrackerClient) -> Result<ExitCode> {
    let cwd = project_dir(config)?;
    info!(
        tracker = %config.client.tracker_bin,
        cwd = %cwd.display(),
        "Starting beads bridge"
    );

    let mut bridge = Bridge::new(config, client, &cwd);
    let reader = BufReader::new(tokio::io::stdin());
    let mut writer = tokio::io::stdout();

    tokio::select! {
        result = bridge.serve(reader, &mut writer) => {
            let summary = result.context("Bridge transport failed")?;
            info!(events = summary.events, invalid = summary.invalid, "Bridge finished");
        }
        () = wait_for_shutdown() => {
            info!("Shutdown signal received");
        }
    }

    // Dropping the bridge stops the memory poller.
    drop(bridge);
    info!("Beads bridge stopped");
    Ok(ExitCode::SUCCESS)
}

/// Prints the status line the coordinator publishes at session start.
async fn run_status(config: &Config, client: TrackerClient) -> Result<ExitCode> {
    let (host, mut effects) = StdioHost::new();
    let mut coordinator = Coordinator::new(client, Arc::new(host), config.workflow.clone());
    coordinator.session_start().await;

    let mut status = None;
    while let Ok(effect) = effects.try_recv() {
        if let HostEffect::SetStatus { key, text } = effect {
            if key == STATUS_KEY {
                status = text;
            }
        }
    }

    match status {
        Some(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Tracker status unavailable");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs one tool action against a freshly probed coordinator.
async fn run_tool(config: &Config, client: TrackerClient, input: ToolInput) -> Result<ExitCode> {
    let (host, mut effects) = StdioHost::new();
    let mut coordinator = Coordinator::new(client, Arc::new(host), config.workflow.clone());
    coordinator.session_start().await;

    let output = coordinator.execute_tool(input).await;
    println!("{}", output.text);

    while let Ok(effect) = effects.try_recv() {
        match effect {
            HostEffect::Notify { message, .. } | HostEffect::Print { text: message } => {
                eprintln!("{message}");
            }
            _ => {}
        }
    }

    if output.is_error {
        warn!(action = %output.details.action(), "Tool action failed");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Directory whose `.pi/memories` holds project memory.
fn project_dir(config: &Config) -> Result<PathBuf> {
    match &config.client.workdir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

/// Initializes the tracing subscriber on stderr.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
