//! State records and the store trait.
//!
//! A [`StateRecord`] is the last-known physical state of one resource.
//! The executor is the only writer: it persists a `pending` record
//! before each provider call, an `applied` record after success, and a
//! `failed` record after a terminal failure. A successfully deleted
//! resource is represented by the absence of a record.
//!
//! The [`StateStore`] trait keeps the engine independent of how records
//! are persisted; the file-backed implementation lives in the
//! `statefile` crate. [`MemoryStore`] is the in-memory null-object used
//! by tests and dry runs.

use crate::resource::{PropertyMap, Resource};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// Lifecycle status of a state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// A provider call is (or was) in flight for this resource
    Pending,
    /// The last provider call for this resource succeeded
    Applied,
    /// The last provider call for this resource failed
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Applied => "applied",
            RecordStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Last-known physical state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Logical id within the deployment unit
    pub logical_id: String,
    /// Resource type at the time of the last apply
    pub resource_type: String,
    /// Provider-assigned physical id, absent until a create succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<String>,
    /// Lifecycle status
    pub status: RecordStatus,
    /// Property snapshot of the last attempted apply
    #[serde(default)]
    pub properties: PropertyMap,
    /// Dependency snapshot, needed to order deletes after the resource
    /// leaves the graph
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Message of the last failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When this record was first written
    pub created_at: DateTime<Utc>,
    /// When this record was last written
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    /// Create a pending record snapshotting a resource's declaration.
    pub fn pending(resource: &Resource) -> Self {
        let now = Utc::now();
        Self {
            logical_id: resource.logical_id.clone(),
            resource_type: resource.resource_type.clone(),
            physical_id: None,
            status: RecordStatus::Pending,
            properties: resource.properties.clone(),
            dependencies: resource.depends_on.clone(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a pending record from raw parts (used by the executor,
    /// which works from planned actions rather than live resources).
    pub fn pending_parts(
        logical_id: impl Into<String>,
        resource_type: impl Into<String>,
        physical_id: Option<String>,
        properties: PropertyMap,
        dependencies: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            physical_id,
            status: RecordStatus::Pending,
            properties,
            dependencies,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the record applied with its physical id.
    pub fn mark_applied(&mut self, physical_id: impl Into<String>) {
        self.physical_id = Some(physical_id.into());
        self.status = RecordStatus::Applied;
        self.last_error = None;
        self.updated_at = Utc::now();
    }

    /// Mark the record failed with the error message.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = RecordStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Whether the record reflects a successful apply.
    pub fn is_applied(&self) -> bool {
        self.status == RecordStatus::Applied
    }
}

/// Persistent store of state records for one deployment unit.
///
/// Implementations must be safe to call from multiple worker threads;
/// the executor guarantees at most one concurrent action per logical
/// id, but actions for different ids run in parallel.
pub trait StateStore: Send + Sync {
    /// Load all records, empty if none exist yet.
    fn load(&self) -> Result<Vec<StateRecord>>;

    /// Look up a single record by logical id.
    fn get(&self, logical_id: &str) -> Result<Option<StateRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|record| record.logical_id == logical_id))
    }

    /// Persist a single record atomically.
    fn save(&self, record: &StateRecord) -> Result<()>;

    /// Remove a record. Removing an absent record is not an error.
    fn remove(&self, logical_id: &str) -> Result<()>;
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, StateRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = StateRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.logical_id.clone(), record))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Vec<StateRecord>> {
        let records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(records.values().cloned().collect())
    }

    fn save(&self, record: &StateRecord) -> Result<()> {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.insert(record.logical_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, logical_id: &str) -> Result<()> {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.remove(logical_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_snapshot() {
        let resource = Resource::new("c1", "cluster")
            .with_property("version", "1.21")
            .with_dependency("v1");
        let record = StateRecord::pending(&resource);

        assert_eq!(record.logical_id, "c1");
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.physical_id, None);
        assert_eq!(record.dependencies, vec!["v1"]);
    }

    #[test]
    fn test_mark_applied_clears_error() {
        let resource = Resource::new("c1", "cluster");
        let mut record = StateRecord::pending(&resource);
        record.mark_failed("throttled");
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(record.last_error.is_some());

        record.mark_applied("phys-1");
        assert!(record.is_applied());
        assert_eq!(record.physical_id.as_deref(), Some("phys-1"));
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());

        let mut record = StateRecord::pending(&Resource::new("v1", "network"));
        record.mark_applied("phys-v1");
        store.save(&record).unwrap();

        let loaded = store.get("v1").unwrap().unwrap();
        assert_eq!(loaded.physical_id.as_deref(), Some("phys-v1"));

        store.remove("v1").unwrap();
        assert!(store.get("v1").unwrap().is_none());

        // Removing again is fine.
        store.remove("v1").unwrap();
    }
}
