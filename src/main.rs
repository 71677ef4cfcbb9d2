//! Armitage CLI entry point.
//!
//! Provides `start` and `check` subcommands for running the watchdog daemon
//! or performing a one-shot configuration and connectivity check.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use armitage::config::{config_dir, load_config, MonitorConfig};
use armitage::cooldown::CooldownTracker;
use armitage::dispatch::{AlertDispatcher, AlertTarget, Notifier};
use armitage::events::EventIngestor;
use armitage::registry::ContainerRegistry;
use armitage::telegram::TelegramNotifier;
use armitage::{docker, events, logging, logs, telegram};

/// Armitage, a Docker container watchdog with Telegram alerts.
#[derive(Parser)]
#[command(name = "armitage", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.armitage/armitage.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the watchdog daemon.
    Start,
    /// Validate config and Docker connectivity, then exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Command::Start => handle_start(&config_path).await,
        Command::Check => handle_check(&config_path).await,
    }
}

/// Resolve the config file path from the CLI flag or the default location.
fn resolve_config_path(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(config_dir()?.join("armitage.toml")),
    }
}

/// Load environment variables from `~/.armitage/.env` and the working
/// directory, both best-effort.
fn load_env() {
    if let Ok(dir) = config_dir() {
        let _ = dotenvy::from_path(dir.join(".env"));
    }
    let _ = dotenvy::dotenv();
}

/// Run the watchdog daemon.
async fn handle_start(config_path: &Path) -> anyhow::Result<()> {
    load_env();

    let config = load_config(config_path)?;
    config.validate()?;

    let logs_dir = config_dir()?.join("logs");
    let _logging_guard = logging::init_daemon(&logs_dir)?;

    let bot_token = std::env::var(&config.telegram.bot_token_env).with_context(|| {
        format!(
            "missing bot token: set the {} environment variable",
            config.telegram.bot_token_env
        )
    })?;

    let docker = docker::connect()?;
    docker
        .ping()
        .await
        .context("Docker daemon did not answer ping")?;

    let registry = Arc::new(ContainerRegistry::new());
    let seeded = docker::seed_registry(&docker, &registry).await?;

    info!(
        config = %config_path.display(),
        containers = seeded,
        watched = config.watch.containers.len(),
        ignored = config.watch.ignore.len(),
        "armitage starting"
    );

    let bot = Bot::new(&bot_token);
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    let target = Arc::new(AlertTarget::new());
    let cooldowns = CooldownTracker::new(config.alerts.cooldown_secs);
    let dispatcher = Arc::new(AlertDispatcher::new(
        notifier,
        Arc::clone(&target),
        cooldowns,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (crash_tx, crash_rx) = mpsc::channel(config.alerts.crash_queue_size);

    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    handles.push(tokio::spawn(events::run_crash_drain(
        crash_rx,
        Arc::clone(&dispatcher),
    )));

    let ingestor = EventIngestor::new(
        docker.clone(),
        Arc::clone(&registry),
        config.watch.ignore.clone(),
        crash_tx,
        Duration::from_secs(config.alerts.reconnect_backoff_secs),
    );
    handles.push(tokio::spawn(ingestor.run(shutdown_rx.clone())));

    handles.extend(logs::spawn_log_watchers(
        &docker,
        &config,
        &dispatcher,
        &shutdown_rx,
    ));

    // Blocks until Ctrl+C stops the teloxide dispatcher.
    telegram::run_telegram(
        bot,
        config.telegram.allowed_users.clone(),
        Arc::clone(&target),
        Arc::clone(&registry),
        Arc::clone(&dispatcher),
    )
    .await;

    info!("shutdown signal received, stopping ingestion tasks");
    let _ = shutdown_tx.send(true);

    // Bounded wait: in-flight deliveries may finish, hung tasks are abandoned.
    let deadline = tokio::time::Instant::now()
        .checked_add(Duration::from_secs(10))
        .unwrap_or_else(tokio::time::Instant::now);
    for handle in handles {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if tokio::time::timeout(remaining, handle).await.is_err() {
            warn!("a task did not stop within the shutdown window, abandoning");
        }
    }

    info!("armitage shut down cleanly");
    Ok(())
}

/// Validate config and Docker connectivity, then exit.
async fn handle_check(config_path: &Path) -> anyhow::Result<()> {
    logging::init_cli();
    load_env();

    let config = load_config(config_path)?;
    config.validate()?;
    info!(config = %config_path.display(), "config OK");

    advise_on_gaps(&config);

    let docker = docker::connect()?;
    docker
        .ping()
        .await
        .context("Docker daemon did not answer ping")?;
    info!("docker daemon reachable");

    let registry = ContainerRegistry::new();
    let seeded = docker::seed_registry(&docker, &registry).await?;
    info!(containers = seeded, "containers discovered");

    let records = registry.snapshot().await;
    let json =
        serde_json::to_string_pretty(&records).context("failed to serialize container snapshot")?;
    info!(snapshot = %json, "current containers");

    for name in &config.watch.containers {
        if records.iter().any(|r| &r.name == name) {
            info!(container = %name, "log watch target found");
        } else {
            warn!(container = %name, "log watch target not currently present");
        }
    }

    Ok(())
}

/// Warn about legal-but-quiet configuration gaps.
fn advise_on_gaps(config: &MonitorConfig) {
    if config.telegram.allowed_users.is_empty() {
        warn!("no allowed_users configured: no chat will ever register for alerts");
    }
    if std::env::var(&config.telegram.bot_token_env).is_err() {
        warn!(
            var = %config.telegram.bot_token_env,
            "bot token environment variable is not set"
        );
    }
    if config.watch.containers.is_empty() {
        warn!("no watched containers: only crash alerts will fire");
    }
    if config.alerts.error_patterns.is_empty() && !config.watch.containers.is_empty() {
        warn!("no error patterns configured: log alerts will never fire");
    }
}
