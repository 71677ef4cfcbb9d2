//! Configuration loading and validation.
//!
//! Loads `armitage.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal config file is valid; the only secrets
//! involved (the bot token) live in the environment, never in the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level watchdog configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Which containers to watch and which to ignore.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Alert matching and rate-limiting knobs.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Telegram channel configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Container selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    /// Containers whose logs are tailed for error patterns.
    #[serde(default)]
    pub containers: Vec<String>,

    /// Containers excluded from all monitoring, including crash alerts.
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Alert matching and rate limiting.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Substrings that mark a log line as an error. Plain words, not regex.
    #[serde(default = "default_error_patterns")]
    pub error_patterns: Vec<String>,

    /// Substrings that exempt a log line even when an error pattern hits.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Minimum seconds between two log-error alerts for the same container.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Capacity of the crash hand-off queue between the event reader and
    /// the dispatcher. Crashes beyond this are dropped, never blocked on.
    #[serde(default = "default_crash_queue_size")]
    pub crash_queue_size: usize,

    /// Seconds to wait before reopening a failed event or log stream.
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            error_patterns: default_error_patterns(),
            ignore_patterns: Vec::new(),
            cooldown_secs: default_cooldown_secs(),
            crash_queue_size: default_crash_queue_size(),
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
        }
    }
}

/// Telegram channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Telegram user IDs allowed to interact with the bot. The first
    /// message from an allowed user registers its chat as the alert target.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: default_bot_token_env(),
            allowed_users: Vec::new(),
        }
    }
}

// Default value functions for serde

fn default_error_patterns() -> Vec<String> {
    ["error", "fatal", "exception"]
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}
fn default_cooldown_secs() -> u64 {
    900
}
fn default_crash_queue_size() -> usize {
    64
}
fn default_reconnect_backoff_secs() -> u64 {
    5
}
fn default_bot_token_env() -> String {
    "ARMITAGE_BOT_TOKEN".to_owned()
}

impl MonitorConfig {
    /// Reject configurations that cannot run at all.
    ///
    /// Advisory gaps (no error patterns, no allowed users) are left to the
    /// `check` subcommand to warn about; they are legal, just quiet.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty bot token variable name, a zero-sized
    /// crash queue, or a container that is both watched and ignored.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.telegram.bot_token_env.trim().is_empty() {
            anyhow::bail!("telegram.bot_token_env must not be empty");
        }

        if self.alerts.crash_queue_size == 0 {
            anyhow::bail!("alerts.crash_queue_size must be at least 1");
        }

        if let Some(both) = self
            .watch
            .containers
            .iter()
            .find(|name| self.watch.ignore.contains(name))
        {
            anyhow::bail!("container '{both}' is both watched and ignored");
        }

        Ok(())
    }
}

/// Load the watchdog config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<MonitorConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: MonitorConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.armitage/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".armitage"))
}
