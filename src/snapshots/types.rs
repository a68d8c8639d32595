use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a snapshot as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// The snapshot is still being taken.
    Creating,
    /// The snapshot is complete and restorable.
    Available,
    /// Any other store status (deleting, failed, copying, ...).
    Other(String),
}

impl SnapshotStatus {
    /// Whether the snapshot counts as a real backup for the creation gate.
    pub fn is_live(&self) -> bool {
        matches!(self, SnapshotStatus::Creating | SnapshotStatus::Available)
    }
}

impl From<&str> for SnapshotStatus {
    fn from(value: &str) -> Self {
        match value {
            "creating" => SnapshotStatus::Creating,
            "available" => SnapshotStatus::Available,
            other => SnapshotStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStatus::Creating => f.write_str("creating"),
            SnapshotStatus::Available => f.write_str("available"),
            SnapshotStatus::Other(s) => f.write_str(s),
        }
    }
}

/// One existing backup of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Snapshot identifier, unique within the resource.
    pub id: String,
    /// When the store recorded the snapshot. Absent while some stores are
    /// still creating it.
    pub created_at: Option<DateTime<Utc>>,
    pub status: SnapshotStatus,
    /// Store-specific kind, e.g. "manual" or "automated".
    #[serde(default)]
    pub snapshot_type: Option<String>,
    #[serde(default)]
    pub arn: Option<String>,
}

impl SnapshotRecord {
    /// Create an available snapshot record created at `created_at`.
    pub fn available(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: Some(created_at),
            status: SnapshotStatus::Available,
            snapshot_type: None,
            arn: None,
        }
    }

    /// Override the status.
    pub fn with_status(mut self, status: SnapshotStatus) -> Self {
        self.status = status;
        self
    }
}

/// Snapshots of a single resource, keyed by snapshot id.
pub type ResourceSnapshots = BTreeMap<String, SnapshotRecord>;

static NO_SNAPSHOTS: ResourceSnapshots = BTreeMap::new();

/// Read-only view of every snapshot in a region, grouped by resource name.
///
/// Built once per run from the store and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    by_resource: HashMap<String, ResourceSnapshots>,
}

impl SnapshotCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from `(resource name, record)` pairs.
    ///
    /// A later record with the same resource and id replaces an earlier one.
    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, SnapshotRecord)>,
        S: Into<String>,
    {
        let mut by_resource: HashMap<String, ResourceSnapshots> = HashMap::new();
        for (resource, record) in records {
            by_resource
                .entry(resource.into())
                .or_default()
                .insert(record.id.clone(), record);
        }
        Self { by_resource }
    }

    /// Snapshots of `resource`. Resources without snapshots yield an empty map.
    pub fn resource(&self, resource: &str) -> &ResourceSnapshots {
        self.by_resource.get(resource).unwrap_or(&NO_SNAPSHOTS)
    }

    /// Names of all resources that own at least one snapshot.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.by_resource.keys().map(String::as_str)
    }

    /// Total number of snapshots across all resources.
    pub fn len(&self) -> usize {
        self.by_resource.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resource eligible for backup, as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource identifier (RDS instance identifier).
    pub name: String,
    /// Fully qualified reference used for tag lookups (RDS instance ARN).
    pub arn: String,
}

impl ResourceRef {
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
        }
    }
}

/// Key/value tag attached to a resource or snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A snapshot the store is asked to take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationRequest {
    pub resource_name: String,
    pub snapshot_id: String,
    pub tags: Vec<Tag>,
}

/// Merge a resource's existing tags with policy tags.
///
/// Existing tags are preserved in order unless a policy tag uses the same
/// key, in which case the policy tag wins. Policy tags follow the existing
/// ones.
pub fn merge_tags(existing: &[Tag], policy: &[Tag]) -> Vec<Tag> {
    let mut merged: Vec<Tag> = existing
        .iter()
        .filter(|tag| !policy.iter().any(|p| p.key == tag.key))
        .cloned()
        .collect();
    merged.extend(policy.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_status_from_store_strings() {
        assert_eq!(SnapshotStatus::from("creating"), SnapshotStatus::Creating);
        assert_eq!(SnapshotStatus::from("available"), SnapshotStatus::Available);
        assert_eq!(
            SnapshotStatus::from("deleting"),
            SnapshotStatus::Other("deleting".into())
        );
    }

    #[test]
    fn test_status_liveness() {
        assert!(SnapshotStatus::Creating.is_live());
        assert!(SnapshotStatus::Available.is_live());
        assert!(!SnapshotStatus::Other("failed".into()).is_live());
    }

    #[test]
    fn test_catalog_groups_by_resource() {
        let catalog = SnapshotCatalog::from_records([
            ("db1", SnapshotRecord::available("db1-a", ts(1))),
            ("db1", SnapshotRecord::available("db1-b", ts(2))),
            ("db2", SnapshotRecord::available("db2-a", ts(3))),
        ]);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.resource("db1").len(), 2);
        assert_eq!(catalog.resource("db2").len(), 1);
        let mut names: Vec<_> = catalog.resources().collect();
        names.sort();
        assert_eq!(names, vec!["db1", "db2"]);
    }

    #[test]
    fn test_catalog_unknown_resource_is_empty() {
        let catalog = SnapshotCatalog::new();
        assert!(catalog.resource("missing").is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_catalog_duplicate_id_keeps_last() {
        let catalog = SnapshotCatalog::from_records([
            ("db1", SnapshotRecord::available("snap", ts(1))),
            (
                "db1",
                SnapshotRecord::available("snap", ts(2)).with_status(SnapshotStatus::Creating),
            ),
        ]);
        let record = &catalog.resource("db1")["snap"];
        assert_eq!(record.created_at, Some(ts(2)));
        assert_eq!(record.status, SnapshotStatus::Creating);
    }

    #[test]
    fn test_merge_tags_policy_wins_on_collision() {
        let existing = vec![Tag::new("team", "data"), Tag::new("created_by", "human")];
        let policy = vec![Tag::new("created_by", "snapwarden")];

        let merged = merge_tags(&existing, &policy);
        assert_eq!(
            merged,
            vec![Tag::new("team", "data"), Tag::new("created_by", "snapwarden")]
        );
    }

    #[test]
    fn test_merge_tags_without_policy_tags() {
        let existing = vec![Tag::new("env", "prod")];
        assert_eq!(merge_tags(&existing, &[]), existing);
    }
}
