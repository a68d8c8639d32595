//! Snapshot stores: where resources and their snapshots actually live.
//!
//! The retention engine never talks to a store directly; the run orchestrator
//! lists resources and snapshots through [`SnapshotStore`], hands them to the
//! engine, and executes the resulting decisions back against the store.
//!
//! Supports multiple backends:
//! - In-memory (for testing and local dry runs)
//! - AWS RDS - requires `store-rds` feature

#[cfg(feature = "store-rds")]
mod rds;
mod types;

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
#[cfg(feature = "store-rds")]
pub use rds::{RdsSnapshotStore, RdsStoreConfig};
use thiserror::Error;
pub use types::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Region is required for {0}")]
    MissingRegion(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

fn require_region(region: &str, operation: &'static str) -> StoreResult<()> {
    if region.trim().is_empty() {
        return Err(StoreError::MissingRegion(operation));
    }
    Ok(())
}

/// External store that owns resources and their snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Resources in `region` currently in the "available" state. Resources
    /// that are mid-backup or otherwise busy are not listed.
    async fn available_resources(&self, region: &str) -> StoreResult<Vec<ResourceRef>>;

    /// Every snapshot in `region`, grouped by owning resource.
    async fn snapshot_catalog(&self, region: &str) -> StoreResult<SnapshotCatalog>;

    /// Tags currently attached to `resource`.
    async fn resource_tags(&self, region: &str, resource: &ResourceRef) -> StoreResult<Vec<Tag>>;

    /// Start taking a new snapshot.
    async fn create_snapshot(&self, region: &str, request: &CreationRequest) -> StoreResult<()>;

    /// Delete an existing snapshot of `resource`.
    async fn delete_snapshot(
        &self,
        region: &str,
        resource: &str,
        snapshot_id: &str,
    ) -> StoreResult<()>;
}

#[derive(Debug, Clone)]
struct MemoryResource {
    arn: String,
    status: String,
    tags: Vec<Tag>,
}

/// In-memory snapshot store (for testing and dry runs).
///
/// Created snapshots are recorded as `creating` at the clock time set with
/// [`MemorySnapshotStore::with_clock`] or [`MemorySnapshotStore::set_clock`],
/// or `Utc::now()` otherwise.
pub struct MemorySnapshotStore {
    resources: DashMap<(String, String), MemoryResource>,
    snapshots: DashMap<(String, String), ResourceSnapshots>,
    failing: DashSet<String>,
    clock: parking_lot::Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            snapshots: DashMap::new(),
            failing: DashSet::new(),
            clock: parking_lot::Mutex::new(None),
        }
    }

    /// Fix the creation time of snapshots taken through this store.
    pub fn with_clock(self, now: chrono::DateTime<chrono::Utc>) -> Self {
        self.set_clock(now);
        self
    }

    /// Move the clock, e.g. between simulated daily runs.
    pub fn set_clock(&self, now: chrono::DateTime<chrono::Utc>) {
        *self.clock.lock() = Some(now);
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        (*self.clock.lock()).unwrap_or_else(chrono::Utc::now)
    }

    /// Register an available resource.
    pub fn add_resource(&self, region: &str, name: &str, tags: Vec<Tag>) {
        self.add_resource_with_status(region, name, "available", tags);
    }

    /// Register a resource in an arbitrary state.
    pub fn add_resource_with_status(&self, region: &str, name: &str, status: &str, tags: Vec<Tag>) {
        self.resources.insert(
            (region.to_string(), name.to_string()),
            MemoryResource {
                arn: format!("arn:aws:rds:{region}:000000000000:db:{name}"),
                status: status.to_string(),
                tags,
            },
        );
    }

    /// Add an existing snapshot for `resource`.
    pub fn add_snapshot(&self, region: &str, resource: &str, record: SnapshotRecord) {
        self.snapshots
            .entry((region.to_string(), resource.to_string()))
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Make every store call naming `key` fail. `key` may be a snapshot id,
    /// a resource name, or a region.
    pub fn fail_on(&self, key: &str) {
        self.failing.insert(key.to_string());
    }

    /// Snapshot ids currently held for `resource`.
    pub fn snapshot_ids(&self, region: &str, resource: &str) -> HashSet<String> {
        self.snapshots
            .get(&(region.to_string(), resource.to_string()))
            .map(|snaps| snaps.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The stored record of a snapshot, if present.
    pub fn snapshot(&self, region: &str, resource: &str, snapshot_id: &str) -> Option<SnapshotRecord> {
        self.snapshots
            .get(&(region.to_string(), resource.to_string()))
            .and_then(|snaps| snaps.get(snapshot_id).cloned())
    }

    fn check(&self, operation: &'static str, keys: &[&str]) -> StoreResult<()> {
        if let Some(key) = keys.iter().find(|k| self.failing.contains(**k)) {
            return Err(StoreError::Api {
                operation,
                message: format!("injected failure for '{key}'"),
            });
        }
        Ok(())
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn available_resources(&self, region: &str) -> StoreResult<Vec<ResourceRef>> {
        require_region(region, "available_resources")?;
        self.check("DescribeDBInstances", &[region])?;

        let mut resources: Vec<ResourceRef> = self
            .resources
            .iter()
            .filter(|entry| entry.key().0 == region && entry.value().status == "available")
            .map(|entry| ResourceRef::new(entry.key().1.clone(), entry.value().arn.clone()))
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn snapshot_catalog(&self, region: &str) -> StoreResult<SnapshotCatalog> {
        require_region(region, "snapshot_catalog")?;
        self.check("DescribeDBSnapshots", &[region])?;

        let records: Vec<(String, SnapshotRecord)> = self
            .snapshots
            .iter()
            .filter(|entry| entry.key().0 == region)
            .flat_map(|entry| {
                let resource = entry.key().1.clone();
                entry
                    .value()
                    .values()
                    .map(|record| (resource.clone(), record.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(SnapshotCatalog::from_records(records))
    }

    async fn resource_tags(&self, region: &str, resource: &ResourceRef) -> StoreResult<Vec<Tag>> {
        require_region(region, "resource_tags")?;
        self.check("ListTagsForResource", &[resource.arn.as_str()])?;

        self.resources
            .get(&(region.to_string(), resource.name.clone()))
            .map(|r| r.tags.clone())
            .ok_or_else(|| StoreError::NotFound(resource.arn.clone()))
    }

    async fn create_snapshot(&self, region: &str, request: &CreationRequest) -> StoreResult<()> {
        require_region(region, "create_snapshot")?;
        self.check(
            "CreateDBSnapshot",
            &[request.resource_name.as_str(), request.snapshot_id.as_str()],
        )?;

        if !self
            .resources
            .contains_key(&(region.to_string(), request.resource_name.clone()))
        {
            return Err(StoreError::NotFound(request.resource_name.clone()));
        }

        let record = SnapshotRecord {
            id: request.snapshot_id.clone(),
            created_at: Some(self.now()),
            status: SnapshotStatus::Creating,
            snapshot_type: Some("manual".to_string()),
            arn: None,
        };
        self.add_snapshot(region, &request.resource_name, record);
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        region: &str,
        resource: &str,
        snapshot_id: &str,
    ) -> StoreResult<()> {
        require_region(region, "delete_snapshot")?;
        self.check("DeleteDBSnapshot", &[resource, snapshot_id])?;

        let removed = self
            .snapshots
            .get_mut(&(region.to_string(), resource.to_string()))
            .and_then(|mut snaps| snaps.remove(snapshot_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(snapshot_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn store() -> MemorySnapshotStore {
        let store = MemorySnapshotStore::new()
            .with_clock(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
        store.add_resource("eu-west-1", "db1", vec![Tag::new("team", "data")]);
        store.add_resource_with_status("eu-west-1", "db2", "backing-up", vec![]);
        store.add_resource("ap-southeast-2", "db3", vec![]);
        store
    }

    #[tokio::test]
    async fn test_available_resources_filters_status_and_region() {
        let store = store();
        let resources = store.available_resources("eu-west-1").await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "db1");
        assert!(resources[0].arn.ends_with(":db:db1"));
    }

    #[tokio::test]
    async fn test_empty_region_is_rejected() {
        let store = store();
        let err = store.available_resources("").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRegion(_)));
        let err = store.snapshot_catalog("  ").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRegion(_)));
    }

    #[tokio::test]
    async fn test_create_then_catalog() {
        let store = store();
        let request = CreationRequest {
            resource_name: "db1".into(),
            snapshot_id: "db1-2024-1-15-10-0".into(),
            tags: vec![],
        };
        store.create_snapshot("eu-west-1", &request).await.unwrap();

        let catalog = store.snapshot_catalog("eu-west-1").await.unwrap();
        let record = &catalog.resource("db1")["db1-2024-1-15-10-0"];
        assert_eq!(record.status, SnapshotStatus::Creating);
        assert_eq!(
            record.created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
        );
        assert!(store.snapshot_catalog("ap-southeast-2").await.unwrap().is_empty());
    }

    #[test]
    fn test_store_error_messages() {
        let cases = [
            (StoreError::MissingRegion("list"), "Region is required for list"),
            (StoreError::NotFound("db9".into()), "Resource not found: db9"),
            (
                StoreError::Api {
                    operation: "DeleteDBSnapshot",
                    message: "throttled".into(),
                },
                "DeleteDBSnapshot failed: throttled",
            ),
        ];
        for (err, expected) in cases {
            match &err {
                StoreError::MissingRegion(_) | StoreError::NotFound(_) | StoreError::Api { .. } => {}
            }
            assert_eq!(err.to_string(), expected);
        }
    }

    #[tokio::test]
    async fn test_clock_survives_panicking_holder() {
        let store = store();
        std::thread::scope(|s| {
            let holder = s.spawn(|| {
                let _guard = store.clock.lock();
                panic!("clock holder panicked");
            });
            assert!(holder.join().is_err());
        });

        let later = Utc.with_ymd_and_hms(2024, 1, 16, 3, 0, 0).unwrap();
        store.set_clock(later);
        let request = CreationRequest {
            resource_name: "db1".into(),
            snapshot_id: "db1-2024-1-16-3-0".into(),
            tags: vec![],
        };
        store.create_snapshot("eu-west-1", &request).await.unwrap();

        let catalog = store.snapshot_catalog("eu-west-1").await.unwrap();
        assert_eq!(
            catalog.resource("db1")["db1-2024-1-16-3-0"].created_at,
            Some(later)
        );
    }

    #[tokio::test]
    async fn test_create_for_unknown_resource_fails() {
        let store = store();
        let request = CreationRequest {
            resource_name: "nope".into(),
            snapshot_id: "nope-1".into(),
            tags: vec![],
        };
        let err = store.create_snapshot("eu-west-1", &request).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_snapshot_fails() {
        let store = store();
        let err = store
            .delete_snapshot("eu-west-1", "db1", "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = store();
        store.add_snapshot(
            "eu-west-1",
            "db1",
            SnapshotRecord::available("keep-me", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        );
        store.fail_on("keep-me");

        let err = store
            .delete_snapshot("eu-west-1", "db1", "keep-me")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DeleteDBSnapshot"));
        assert!(store.snapshot_ids("eu-west-1", "db1").contains("keep-me"));
    }

    #[tokio::test]
    async fn test_resource_tags() {
        let store = store();
        let resource = store.available_resources("eu-west-1").await.unwrap().remove(0);
        let tags = store.resource_tags("eu-west-1", &resource).await.unwrap();
        assert_eq!(tags, vec![Tag::new("team", "data")]);
    }
}
