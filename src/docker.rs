//! Docker runtime glue: connection, bulk load, metadata lookups.
//!
//! Everything here talks to the daemon through the bollard API. The
//! pipeline itself never constructs bollard calls; it consumes the records
//! this module writes into the registry.

use anyhow::Context;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::Docker;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::registry::{ContainerRecord, ContainerRegistry};

/// Connect to the local Docker daemon.
///
/// # Errors
///
/// Returns an error if no local daemon endpoint can be negotiated.
pub fn connect() -> anyhow::Result<Docker> {
    Docker::connect_with_local_defaults().context("failed to connect to the Docker daemon")
}

/// Seed the registry with every container currently known to the daemon.
///
/// Inspects each container for status, health, image, and start time so
/// that a crash alert fired before any lifecycle event still carries
/// metadata. An inspect failure degrades to the list summary fields.
///
/// # Errors
///
/// Returns an error if the container list itself cannot be fetched.
pub async fn seed_registry(docker: &Docker, registry: &ContainerRegistry) -> anyhow::Result<usize> {
    let options = Some(ListContainersOptions::<String> {
        all: true,
        ..Default::default()
    });

    let containers = docker
        .list_containers(options)
        .await
        .context("failed to list containers")?;

    let mut count: usize = 0;
    for summary in &containers {
        let Some(name) = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_owned())
        else {
            continue;
        };

        let record = match inspect_record(docker, &name).await {
            Ok(record) => record,
            Err(e) => {
                debug!(container = %name, error = %e, "inspect failed, using list summary");
                ContainerRecord {
                    name: name.clone(),
                    status: summary.state.clone().unwrap_or_else(|| "unknown".to_owned()),
                    health: None,
                    image: summary.image.clone(),
                    started_at: None,
                }
            }
        };

        registry.upsert(record).await;
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Inspect one container and map the response into a [`ContainerRecord`].
///
/// # Errors
///
/// Returns an error if the inspect call fails (e.g. container removed).
pub async fn inspect_record(docker: &Docker, name: &str) -> anyhow::Result<ContainerRecord> {
    let inspect = docker
        .inspect_container(name, None::<InspectContainerOptions>)
        .await
        .with_context(|| format!("failed to inspect container '{name}'"))?;

    let state = inspect.state.as_ref();

    let status = state
        .and_then(|s| s.status.as_ref())
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_owned());

    let health = state
        .and_then(|s| s.health.as_ref())
        .and_then(|h| h.status.as_ref())
        .map(ToString::to_string);

    let image = inspect.config.as_ref().and_then(|c| c.image.clone());

    let started_at = state
        .and_then(|s| s.started_at.as_deref())
        .and_then(parse_started_at);

    Ok(ContainerRecord {
        name: name.to_owned(),
        status,
        health,
        image,
        started_at,
    })
}

/// Parse Docker's `State.StartedAt` timestamp.
///
/// Containers that never started report the zero value `0001-01-01T...`;
/// that is "no start time", not year one.
fn parse_started_at(raw: &str) -> Option<DateTime<Utc>> {
    if raw.starts_with("0001-") {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
