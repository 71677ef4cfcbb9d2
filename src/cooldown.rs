//! Per-source alert rate limiting.
//!
//! Tracks, for every container name, when the last alert was emitted and how
//! many alert-worthy events have been suppressed since. All state is
//! in-memory and resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

/// Rate-limiting state for one source.
#[derive(Debug, Clone, Copy)]
pub struct CooldownState {
    /// When the last alert for this source was emitted.
    pub last_alert: DateTime<Utc>,

    /// Alert-worthy events suppressed since that alert.
    pub suppressed: u64,
}

/// Per-source alert timestamps and suppression counts.
///
/// The inner map guard is held only for the duration of each operation and
/// never across an await. Serializing the check-then-record sequence around
/// an actual delivery is the dispatcher's job, keyed per source, so that
/// unrelated sources never block each other.
pub struct CooldownTracker {
    states: Mutex<HashMap<String, CooldownState>>,
    cooldown: Duration,
    cooldown_secs: u64,
}

impl CooldownTracker {
    /// Create a tracker with a uniform cooldown window in seconds.
    ///
    /// An absurdly large window clamps to the maximum representable
    /// duration, which never elapses in practice.
    pub fn new(cooldown_secs: u64) -> Self {
        let cooldown = i64::try_from(cooldown_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            states: Mutex::new(HashMap::new()),
            cooldown,
            cooldown_secs,
        }
    }

    /// The configured cooldown window in seconds.
    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_secs
    }

    /// Whether an alert for this source may be emitted now.
    ///
    /// `true` if the source has never alerted, or if the cooldown window has
    /// fully elapsed since its last alert. Read-only; callers commit the
    /// outcome with [`record_alert`](Self::record_alert) or
    /// [`record_suppressed`](Self::record_suppressed).
    pub fn should_alert(&self, source: &str) -> bool {
        match self.guard().get(source) {
            None => true,
            Some(state) => Utc::now().signed_duration_since(state.last_alert) >= self.cooldown,
        }
    }

    /// Record that an alert for this source was just delivered (or that
    /// delivery was attempted). Resets the suppressed count to zero.
    pub fn record_alert(&self, source: &str) {
        self.guard().insert(
            source.to_owned(),
            CooldownState {
                last_alert: Utc::now(),
                suppressed: 0,
            },
        );
    }

    /// Record that an alert-worthy event for this source was suppressed.
    ///
    /// Only sources that have alerted at least once carry state, so a
    /// suppression for an unseen source is a no-op. The dispatcher never
    /// produces that call order.
    pub fn record_suppressed(&self, source: &str) {
        if let Some(state) = self.guard().get_mut(source) {
            state.suppressed = state.suppressed.saturating_add(1);
        }
    }

    /// Current suppressed count for a source, 0 if unseen.
    pub fn suppressed_count(&self, source: &str) -> u64 {
        self.guard().get(source).map_or(0, |state| state.suppressed)
    }

    /// Snapshot of all per-source states, sorted by source name.
    ///
    /// Used by the command layer; the pipeline itself never iterates.
    pub fn snapshot(&self) -> Vec<(String, CooldownState)> {
        let mut entries: Vec<(String, CooldownState)> = self
            .guard()
            .iter()
            .map(|(name, state)| (name.clone(), *state))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Lock the state map, recovering it if a previous holder panicked.
    fn guard(&self) -> MutexGuard<'_, HashMap<String, CooldownState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
