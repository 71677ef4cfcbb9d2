//! Lifecycle-event ingestion.
//!
//! One dedicated task consumes the Docker event stream. Classification is a
//! pure function; crash-worthy events cross a bounded queue into the
//! dispatcher so a slow delivery can never stall the stream reader.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::system::EventsOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::dispatch::{AlertDispatcher, CrashEvent};
use crate::registry::ContainerRegistry;

/// Classified container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    /// The container terminated. Exit code 0 is a clean stop.
    Died {
        /// Container name.
        name: String,
        /// Exit code; unparseable values degrade to 0.
        exit_code: i64,
        /// Image reference from the event attributes, if present.
        image: Option<String>,
    },
    /// Any other lifecycle observation worth caching (start, stop, health).
    Observed {
        /// Container name.
        name: String,
        /// Raw action tag from the event.
        action: String,
        /// Image reference from the event attributes, if present.
        image: Option<String>,
    },
}

/// Classify one raw Docker event.
///
/// Returns `None` for non-container events, events without a container
/// name, and containers on the ignore list. An unparseable exit code is
/// treated as 0 so malformed runtime data never produces an alert.
pub fn classify(event: &EventMessage, ignore: &[String]) -> Option<ContainerEvent> {
    if event.typ != Some(EventMessageTypeEnum::CONTAINER) {
        return None;
    }

    let action = event.action.as_deref()?;
    let attributes = event.actor.as_ref().and_then(|actor| actor.attributes.as_ref());
    let name = attributes.and_then(|attrs| attrs.get("name"))?.clone();

    if ignore.iter().any(|ignored| ignored == &name) {
        return None;
    }

    let image = attributes.and_then(|attrs| attrs.get("image")).cloned();

    if action == "die" {
        let exit_code = match attributes.and_then(|attrs| attrs.get("exitCode")) {
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                debug!(container = %name, raw = %raw, "unparseable exit code, treating as clean stop");
                0
            }),
            None => 0,
        };
        return Some(ContainerEvent::Died {
            name,
            exit_code,
            image,
        });
    }

    Some(ContainerEvent::Observed {
        name,
        action: action.to_owned(),
        image,
    })
}

/// Dedicated reader for the Docker lifecycle-event stream.
pub struct EventIngestor {
    docker: Docker,
    registry: Arc<ContainerRegistry>,
    ignore: Vec<String>,
    crash_tx: mpsc::Sender<CrashEvent>,
    backoff: Duration,
}

impl EventIngestor {
    /// Create an ingestor that feeds crashes into `crash_tx`.
    pub fn new(
        docker: Docker,
        registry: Arc<ContainerRegistry>,
        ignore: Vec<String>,
        crash_tx: mpsc::Sender<CrashEvent>,
        backoff: Duration,
    ) -> Self {
        Self {
            docker,
            registry,
            ignore,
            crash_tx,
            backoff,
        }
    }

    /// Consume the event stream until the shutdown signal flips.
    ///
    /// A stream error or end-of-stream is retried after the configured
    /// backoff; this loop never terminates on its own account.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let mut stream = self.docker.events(Some(container_events_options()));
            debug!("lifecycle event stream opened");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("event ingestor stopping");
                            return;
                        }
                    }
                    item = stream.next() => match item {
                        Some(Ok(event)) => self.handle_event(&event).await,
                        Some(Err(e)) => {
                            warn!(error = %e, "event stream error, reconnecting");
                            break;
                        }
                        None => {
                            warn!("event stream ended, reconnecting");
                            break;
                        }
                    }
                }
            }

            if sleep_or_shutdown(&mut shutdown, self.backoff).await {
                info!("event ingestor stopping");
                return;
            }
        }
    }

    /// Classify one raw event and apply it.
    async fn handle_event(&self, event: &EventMessage) {
        let Some(classified) = classify(event, &self.ignore) else {
            return;
        };
        ingest(classified, &self.registry, &self.crash_tx).await;
    }
}

/// Apply one classified event: update the registry, and queue a crash for
/// dispatch when the exit code is non-zero.
///
/// The hand-off never blocks; a full queue drops the crash with a warning.
pub async fn ingest(
    classified: ContainerEvent,
    registry: &ContainerRegistry,
    crash_tx: &mpsc::Sender<CrashEvent>,
) {
    match classified {
        ContainerEvent::Died {
            name,
            exit_code,
            image,
        } => {
            if exit_code != 0 {
                // Metadata must be read before the registry sees the
                // `die`, which clears the start time.
                let record = registry.get(&name).await;
                let crash = CrashEvent {
                    name: name.clone(),
                    exit_code,
                    image: record
                        .as_ref()
                        .and_then(|r| r.image.clone())
                        .or_else(|| image.clone()),
                    uptime_secs: record
                        .as_ref()
                        .and_then(|r| r.started_at)
                        .and_then(uptime_from),
                };

                match crash_tx.try_send(crash) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(dropped)) => {
                        warn!(
                            container = %dropped.name,
                            exit_code = dropped.exit_code,
                            "crash queue full, dropping crash event"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("crash queue closed, dropping crash event");
                    }
                }
            } else {
                debug!(container = %name, "clean stop");
            }

            registry.observe(&name, "die", image.as_deref()).await;
        }
        ContainerEvent::Observed {
            name,
            action,
            image,
        } => {
            registry.observe(&name, &action, image.as_deref()).await;
        }
    }
}

/// Drain the crash hand-off queue into the dispatcher.
///
/// Runs until every sender is gone. A slow delivery here backs up only the
/// queue, never the event-stream reader; overflow is dropped at the sender.
pub async fn run_crash_drain(
    mut crash_rx: mpsc::Receiver<CrashEvent>,
    dispatcher: Arc<AlertDispatcher>,
) {
    while let Some(event) = crash_rx.recv().await {
        dispatcher.dispatch_crash(event).await;
    }
    debug!("crash queue closed, drain task exiting");
}

/// Seconds a container has been up, if the clock agrees it started in the
/// past.
pub fn uptime_from(started_at: DateTime<Utc>) -> Option<u64> {
    let elapsed = Utc::now().signed_duration_since(started_at).num_seconds();
    u64::try_from(elapsed).ok()
}

/// Sleep for `delay`, returning `true` early if shutdown fires first.
pub(crate) async fn sleep_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    delay: Duration,
) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

/// Event filter: container-scoped events only.
fn container_events_options() -> EventsOptions<String> {
    EventsOptions::<String> {
        filters: HashMap::from([("type".to_owned(), vec!["container".to_owned()])]),
        ..Default::default()
    }
}
