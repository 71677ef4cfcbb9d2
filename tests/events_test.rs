//! Tests for lifecycle-event classification and ingestion.

use std::collections::HashMap;

use armitage::events::{classify, ingest, uptime_from, ContainerEvent};
use armitage::registry::ContainerRegistry;
use bollard::models::{EventActor, EventMessage, EventMessageTypeEnum};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn container_event(action: &str, name: &str, extra: &[(&str, &str)]) -> EventMessage {
    let mut attributes = HashMap::from([("name".to_owned(), name.to_owned())]);
    for (key, value) in extra {
        attributes.insert((*key).to_owned(), (*value).to_owned());
    }

    EventMessage {
        typ: Some(EventMessageTypeEnum::CONTAINER),
        action: Some(action.to_owned()),
        actor: Some(EventActor {
            id: Some("abc123".to_owned()),
            attributes: Some(attributes),
        }),
        ..Default::default()
    }
}

fn no_ignores() -> Vec<String> {
    Vec::new()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn die_with_nonzero_code_classifies_as_crash() {
    let event = container_event("die", "radarr", &[("exitCode", "137"), ("image", "x:latest")]);
    let classified = classify(&event, &no_ignores());
    assert_eq!(
        classified,
        Some(ContainerEvent::Died {
            name: "radarr".to_owned(),
            exit_code: 137,
            image: Some("x:latest".to_owned()),
        })
    );
}

#[test]
fn die_with_zero_code_is_a_clean_stop() {
    let event = container_event("die", "radarr", &[("exitCode", "0")]);
    match classify(&event, &no_ignores()) {
        Some(ContainerEvent::Died { exit_code, .. }) => assert_eq!(exit_code, 0),
        other => panic!("expected Died, got {other:?}"),
    }
}

#[test]
fn malformed_exit_code_degrades_to_clean_stop() {
    let event = container_event("die", "radarr", &[("exitCode", "not-a-number")]);
    match classify(&event, &no_ignores()) {
        Some(ContainerEvent::Died { exit_code, .. }) => assert_eq!(exit_code, 0),
        other => panic!("expected Died, got {other:?}"),
    }
}

#[test]
fn missing_exit_code_degrades_to_clean_stop() {
    let event = container_event("die", "radarr", &[]);
    match classify(&event, &no_ignores()) {
        Some(ContainerEvent::Died { exit_code, .. }) => assert_eq!(exit_code, 0),
        other => panic!("expected Died, got {other:?}"),
    }
}

#[test]
fn ignored_containers_are_dropped_before_anything_else() {
    let ignore = vec!["Kometa".to_owned()];

    let die = container_event("die", "Kometa", &[("exitCode", "137")]);
    assert_eq!(classify(&die, &ignore), None);

    let start = container_event("start", "Kometa", &[]);
    assert_eq!(classify(&start, &ignore), None);
}

#[test]
fn start_and_health_events_classify_as_observations() {
    let start = container_event("start", "radarr", &[]);
    assert_eq!(
        classify(&start, &no_ignores()),
        Some(ContainerEvent::Observed {
            name: "radarr".to_owned(),
            action: "start".to_owned(),
            image: None,
        })
    );

    let health = container_event("health_status: unhealthy", "radarr", &[]);
    match classify(&health, &no_ignores()) {
        Some(ContainerEvent::Observed { action, .. }) => {
            assert_eq!(action, "health_status: unhealthy");
        }
        other => panic!("expected Observed, got {other:?}"),
    }
}

#[test]
fn non_container_events_are_dropped() {
    let event = EventMessage {
        typ: Some(EventMessageTypeEnum::NETWORK),
        action: Some("connect".to_owned()),
        ..Default::default()
    };
    assert_eq!(classify(&event, &no_ignores()), None);
}

#[test]
fn events_without_a_name_are_dropped() {
    let event = EventMessage {
        typ: Some(EventMessageTypeEnum::CONTAINER),
        action: Some("die".to_owned()),
        actor: Some(EventActor {
            id: Some("abc123".to_owned()),
            attributes: Some(HashMap::new()),
        }),
        ..Default::default()
    };
    assert_eq!(classify(&event, &no_ignores()), None);
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

fn died(name: &str, exit_code: i64) -> ContainerEvent {
    ContainerEvent::Died {
        name: name.to_owned(),
        exit_code,
        image: None,
    }
}

#[tokio::test]
async fn clean_stop_never_queues_a_crash() {
    let registry = ContainerRegistry::new();
    let (crash_tx, mut crash_rx) = mpsc::channel(4);

    ingest(died("radarr", 0), &registry, &crash_tx).await;

    assert!(crash_rx.try_recv().is_err());
    // The registry still learned about the stop.
    let record = registry.get("radarr").await.expect("record should exist");
    assert_eq!(record.status, "exited");
}

#[tokio::test]
async fn crash_queues_with_registry_metadata() {
    let registry = ContainerRegistry::new();
    registry.observe("radarr", "start", Some("x:latest")).await;

    let (crash_tx, mut crash_rx) = mpsc::channel(4);
    ingest(died("radarr", 137), &registry, &crash_tx).await;

    let crash = crash_rx.try_recv().expect("crash should be queued");
    assert_eq!(crash.name, "radarr");
    assert_eq!(crash.exit_code, 137);
    assert_eq!(crash.image.as_deref(), Some("x:latest"));
    assert!(crash.uptime_secs.is_some());

    // The die observation cleared the start time after the crash was built.
    let record = registry.get("radarr").await.expect("record should exist");
    assert_eq!(record.status, "exited");
    assert!(record.started_at.is_none());
}

#[tokio::test]
async fn crash_without_prior_metadata_has_unknown_uptime() {
    let registry = ContainerRegistry::new();
    let (crash_tx, mut crash_rx) = mpsc::channel(4);

    ingest(died("radarr", 1), &registry, &crash_tx).await;

    let crash = crash_rx.try_recv().expect("crash should be queued");
    assert_eq!(crash.uptime_secs, None);
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let registry = ContainerRegistry::new();
    let (crash_tx, mut crash_rx) = mpsc::channel(1);

    ingest(died("radarr", 137), &registry, &crash_tx).await;
    ingest(died("sonarr", 139), &registry, &crash_tx).await;

    let first = crash_rx.try_recv().expect("first crash should be queued");
    assert_eq!(first.name, "radarr");
    assert!(crash_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Uptime
// ---------------------------------------------------------------------------

#[test]
fn uptime_from_past_start_is_positive() {
    let started = chrono::Utc::now()
        .checked_sub_signed(chrono::Duration::seconds(9240))
        .expect("valid timestamp");
    let uptime = uptime_from(started).expect("uptime should be known");
    assert!((9239..=9241).contains(&uptime));
}

#[test]
fn uptime_from_future_start_is_unknown() {
    let started = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(120))
        .expect("valid timestamp");
    assert_eq!(uptime_from(started), None);
}
