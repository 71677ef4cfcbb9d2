//! Per-container log tailing.
//!
//! One independent task per watched container. Each task follows the
//! container's combined stdout/stderr from "now", splits the byte stream
//! into lines, and hands matching lines to the dispatcher. A container
//! that is missing or whose stream drops is retried with a fixed backoff;
//! one container's trouble never touches another's task.

use std::sync::Arc;
use std::time::Duration;

use bollard::container::LogsOptions;
use bollard::Docker;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::dispatch::{AlertDispatcher, LogErrorEvent};
use crate::events::sleep_or_shutdown;
use crate::matcher::line_matches;

/// Tails one container's log stream and dispatches matching lines.
pub struct LogWatcher {
    docker: Docker,
    name: String,
    error_patterns: Arc<Vec<String>>,
    ignore_patterns: Arc<Vec<String>>,
    dispatcher: Arc<AlertDispatcher>,
    backoff: Duration,
}

impl LogWatcher {
    /// Create a watcher for one container.
    pub fn new(
        docker: Docker,
        name: String,
        error_patterns: Arc<Vec<String>>,
        ignore_patterns: Arc<Vec<String>>,
        dispatcher: Arc<AlertDispatcher>,
        backoff: Duration,
    ) -> Self {
        Self {
            docker,
            name,
            error_patterns,
            ignore_patterns,
            dispatcher,
            backoff,
        }
    }

    /// Tail the container's logs until the shutdown signal flips.
    ///
    /// Each (re)connect tails from the current time, so lines emitted while
    /// the stream was down are not replayed; replaying them would re-alert
    /// on stale errors after every reconnect.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                since: Utc::now().timestamp(),
                tail: "0".to_owned(),
                ..Default::default()
            };

            let mut stream = self.docker.logs(&self.name, Some(options));
            let mut pending = String::new();
            debug!(container = %self.name, "log tail opened");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!(container = %self.name, "log watcher stopping");
                            return;
                        }
                    }
                    chunk = stream.next() => match chunk {
                        Some(Ok(output)) => {
                            pending.push_str(&String::from_utf8_lossy(&output.into_bytes()));
                            for line in drain_lines(&mut pending) {
                                self.handle_line(&line).await;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(container = %self.name, error = %e, "log stream error, retrying");
                            break;
                        }
                        None => {
                            debug!(container = %self.name, "log stream ended, retrying");
                            break;
                        }
                    }
                }
            }

            if sleep_or_shutdown(&mut shutdown, self.backoff).await {
                debug!(container = %self.name, "log watcher stopping");
                return;
            }
        }
    }

    /// Match one complete line and dispatch it if it qualifies.
    async fn handle_line(&self, line: &str) {
        if line_matches(line, &self.error_patterns, &self.ignore_patterns) {
            self.dispatcher
                .dispatch_log_error(LogErrorEvent {
                    name: self.name.clone(),
                    line: line.to_owned(),
                })
                .await;
        }
    }
}

/// Split completed lines off the front of `pending`, leaving any partial
/// trailing chunk buffered for the next read.
///
/// Trailing carriage returns are stripped; blank lines are dropped.
pub fn drain_lines(pending: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.find('\n') {
        let line: String = pending.drain(..=pos).collect();
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if !trimmed.is_empty() {
            lines.push(trimmed.to_owned());
        }
    }
    lines
}

/// Spawn one log-watcher task per watched container.
pub fn spawn_log_watchers(
    docker: &Docker,
    config: &MonitorConfig,
    dispatcher: &Arc<AlertDispatcher>,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let error_patterns = Arc::new(config.alerts.error_patterns.clone());
    let ignore_patterns = Arc::new(config.alerts.ignore_patterns.clone());
    let backoff = Duration::from_secs(config.alerts.reconnect_backoff_secs);

    let mut handles = Vec::new();
    for name in &config.watch.containers {
        if config.watch.ignore.contains(name) {
            warn!(container = %name, "watched container is on the ignore list, skipping");
            continue;
        }

        let watcher = LogWatcher::new(
            docker.clone(),
            name.clone(),
            Arc::clone(&error_patterns),
            Arc::clone(&ignore_patterns),
            Arc::clone(dispatcher),
            backoff,
        );
        handles.push(tokio::spawn(watcher.run(shutdown.clone())));
    }
    handles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_lines_and_keeps_partial_tail() {
        let mut pending = String::from("first\nsecond\npart");
        let lines = drain_lines(&mut pending);
        assert_eq!(lines, vec!["first", "second"]);
        assert_eq!(pending, "part");
    }

    #[test]
    fn strips_carriage_returns_and_blank_lines() {
        let mut pending = String::from("one\r\n\r\ntwo\n");
        let lines = drain_lines(&mut pending);
        assert_eq!(lines, vec!["one", "two"]);
        assert!(pending.is_empty());
    }
}
