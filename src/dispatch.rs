//! Alert dispatch: the single sink both ingestion paths feed.
//!
//! Crash alerts fire unconditionally, one per non-zero exit. Log-error
//! alerts are cooldown-gated per container. Delivery failures are caught
//! and logged here; nothing in this module propagates an error back into an
//! ingestion task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::compose;
use crate::cooldown::CooldownTracker;

/// Delivery failure surfaced by a [`Notifier`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport rejected or failed to complete the send.
    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Delivery channel abstraction.
///
/// The watchdog composes message text; the notifier owns the transport.
/// Implementations must be fire-and-forget: no retries, no buffering.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to the given chat. Errors are reported, never retried.
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

/// A crash observed on the event stream.
#[derive(Debug, Clone)]
pub struct CrashEvent {
    /// Container name.
    pub name: String,

    /// Non-zero exit code reported by the runtime.
    pub exit_code: i64,

    /// Image reference, if known.
    pub image: Option<String>,

    /// Seconds the container had been up, if the start time was known.
    pub uptime_secs: Option<u64>,
}

/// An error line observed on a log stream.
#[derive(Debug, Clone)]
pub struct LogErrorEvent {
    /// Container name.
    pub name: String,

    /// The matching log line, untruncated; the composer bounds it.
    pub line: String,
}

/// The Telegram chat registered to receive alerts.
///
/// Discovered late: the first authorized inbound message claims it, and the
/// claim is permanent for the process lifetime. Until then every dispatch
/// is a logged no-op.
#[derive(Default)]
pub struct AlertTarget {
    chat: RwLock<Option<i64>>,
}

impl AlertTarget {
    /// Create an unset target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat if none is set yet. Returns `true` when this call
    /// performed the registration, `false` when a chat was already claimed.
    pub fn register(&self, chat_id: i64) -> bool {
        let mut chat = match self.chat.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if chat.is_some() {
            return false;
        }
        *chat = Some(chat_id);
        true
    }

    /// The registered chat, if any.
    pub fn get(&self) -> Option<i64> {
        match self.chat.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Single synchronization point for crash and log-error alerts.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    target: Arc<AlertTarget>,
    cooldowns: CooldownTracker,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AlertDispatcher {
    /// Create a dispatcher over a notifier, a (possibly unset) alert
    /// target, and a cooldown tracker.
    pub fn new(notifier: Arc<dyn Notifier>, target: Arc<AlertTarget>, cooldowns: CooldownTracker) -> Self {
        Self {
            notifier,
            target,
            cooldowns,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Read-only view of the cooldown tracker, for the command layer.
    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Dispatch a crash alert.
    ///
    /// Crashes are not cooldown-gated: every non-zero exit is individually
    /// actionable. With no target registered the event is dropped with a
    /// warning; delivery errors are logged and swallowed.
    pub async fn dispatch_crash(&self, event: CrashEvent) {
        let lock = self.source_lock(&event.name);
        let _guard = lock.lock().await;

        let Some(chat) = self.target.get() else {
            warn!(
                container = %event.name,
                exit_code = event.exit_code,
                "crash alert dropped: no alert chat registered yet"
            );
            return;
        };

        let text = compose::compose_crash(
            &event.name,
            event.exit_code,
            event.image.as_deref(),
            event.uptime_secs,
        );

        match self.notifier.deliver(chat, &text).await {
            Ok(()) => {
                info!(
                    container = %event.name,
                    exit_code = event.exit_code,
                    "crash alert delivered"
                );
            }
            Err(e) => {
                error!(container = %event.name, error = %e, "failed to deliver crash alert");
            }
        }
    }

    /// Dispatch a log-error alert, subject to the per-source cooldown.
    ///
    /// The check-then-record sequence runs under a per-source mutex so two
    /// near-simultaneous matches for the same container cannot both pass
    /// the cooldown check. Delivery failure still counts as "alerted" so a
    /// flaky channel is not hammered on every matching line.
    pub async fn dispatch_log_error(&self, event: LogErrorEvent) {
        let lock = self.source_lock(&event.name);
        let _guard = lock.lock().await;

        if !self.cooldowns.should_alert(&event.name) {
            self.cooldowns.record_suppressed(&event.name);
            debug!(
                container = %event.name,
                suppressed = self.cooldowns.suppressed_count(&event.name),
                "log error suppressed (cooldown)"
            );
            return;
        }

        let Some(chat) = self.target.get() else {
            warn!(
                container = %event.name,
                "log error alert dropped: no alert chat registered yet"
            );
            return;
        };

        let suppressed = self.cooldowns.suppressed_count(&event.name);
        let text = compose::compose_log_error(
            &event.name,
            &event.line,
            suppressed,
            self.cooldowns.cooldown_secs(),
        );

        if let Err(e) = self.notifier.deliver(chat, &text).await {
            error!(container = %event.name, error = %e, "failed to deliver log error alert");
        } else {
            info!(
                container = %event.name,
                prior_suppressed = suppressed,
                "log error alert delivered"
            );
        }

        self.cooldowns.record_alert(&event.name);
    }

    /// Per-source mutex, created on first use.
    ///
    /// The outer map guard is held only long enough to clone the entry, so
    /// a slow delivery for one container never blocks another.
    fn source_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(name.to_owned()).or_default())
    }
}
