//! Shared container metadata registry.
//!
//! The registry is the only holder of per-container runtime metadata
//! (status, health, image, start time). Lifecycle observations mutate it;
//! the crash path and the slash-command layer only read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Point-in-time metadata for one monitored container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerRecord {
    /// Container name, unique on the host.
    pub name: String,

    /// Last observed status ("running", "exited", ...).
    pub status: String,

    /// Health-check verdict, if the container defines one.
    pub health: Option<String>,

    /// Image reference the container was created from.
    pub image: Option<String>,

    /// When the container last started, if known.
    pub started_at: Option<DateTime<Utc>>,
}

/// Concurrent, name-keyed store of container metadata.
#[derive(Default)]
pub struct ContainerRegistry {
    records: RwLock<HashMap<String, ContainerRecord>>,
}

impl ContainerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a full record, e.g. from the startup bulk load.
    pub async fn upsert(&self, record: ContainerRecord) {
        self.records.write().await.insert(record.name.clone(), record);
    }

    /// Apply a lifecycle observation from the event stream.
    ///
    /// `start` marks the container running and stamps the start time; `die`
    /// marks it exited and clears the start time; `health_status: ...`
    /// actions update the health verdict; any other action is cached as the
    /// current status verbatim.
    pub async fn observe(&self, name: &str, action: &str, image: Option<&str>) {
        let mut records = self.records.write().await;
        let record = records
            .entry(name.to_owned())
            .or_insert_with(|| ContainerRecord {
                name: name.to_owned(),
                status: action.to_owned(),
                health: None,
                image: None,
                started_at: None,
            });

        if let Some(img) = image {
            record.image = Some(img.to_owned());
        }

        if let Some(health) = action.strip_prefix("health_status: ") {
            record.health = Some(health.to_owned());
            return;
        }

        match action {
            "start" => {
                record.status = "running".to_owned();
                record.started_at = Some(Utc::now());
            }
            "die" => {
                record.status = "exited".to_owned();
                record.started_at = None;
            }
            other => {
                record.status = other.to_owned();
            }
        }
    }

    /// Current record for a container, if one has been observed.
    pub async fn get(&self, name: &str) -> Option<ContainerRecord> {
        self.records.read().await.get(name).cloned()
    }

    /// All records, sorted by container name.
    pub async fn snapshot(&self) -> Vec<ContainerRecord> {
        let mut records: Vec<ContainerRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Number of known containers.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the registry holds no records yet.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
