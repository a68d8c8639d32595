use serde::Serialize;

use super::window::SkippedRecord;

/// Store operation that failed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListResources,
    ListSnapshots,
    ListTags,
    Plan,
    Create,
    Delete,
}

/// A failed action. The run carries on past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionFailure {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub error: String,
}

/// A malformed record seen during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSnapshot {
    pub region: String,
    pub resource: String,
    #[serde(flatten)]
    pub record: SkippedRecord,
}

/// Aggregate outcome of a run across every region.
///
/// In a dry run `to_create` and `to_delete` list what would have been done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub to_create: Vec<String>,
    pub to_delete: Vec<String>,
    pub failures: Vec<ActionFailure>,
    pub skipped_records: Vec<SkippedSnapshot>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.to_create.extend(other.to_create);
        self.to_delete.extend(other.to_delete);
        self.failures.extend(other.failures);
        self.skipped_records.extend(other.skipped_records);
        self.dry_run |= other.dry_run;
    }

    /// Sort every list so reports compare equal regardless of the order
    /// regions and resources were processed in.
    pub fn normalize(&mut self) {
        self.to_create.sort();
        self.to_delete.sort();
        self.failures.sort_by(|a, b| {
            (&a.region, &a.resource, &a.snapshot_id).cmp(&(&b.region, &b.resource, &b.snapshot_id))
        });
        self.skipped_records.sort_by(|a, b| {
            (&a.region, &a.resource, &a.record.snapshot_id).cmp(&(
                &b.region,
                &b.resource,
                &b.record.snapshot_id,
            ))
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub(crate) fn fail(
        &mut self,
        region: &str,
        resource: Option<&str>,
        action: Action,
        snapshot_id: Option<&str>,
        error: impl std::fmt::Display,
    ) {
        self.failures.push(ActionFailure {
            region: region.to_string(),
            resource: resource.map(str::to_string),
            action,
            snapshot_id: snapshot_id.map(str::to_string),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::window::SkipReason;

    #[test]
    fn test_merge_and_normalize() {
        let mut a = RunReport::new(false);
        a.to_create.push("db2-1".into());
        a.to_delete.push("old-b".into());
        a.fail("eu-west-1", Some("db2"), Action::Delete, Some("old-c"), "boom");

        let mut b = RunReport::new(false);
        b.to_create.push("db1-1".into());
        b.to_delete.push("old-a".into());

        a.merge(b);
        a.normalize();
        assert_eq!(a.to_create, vec!["db1-1", "db2-1"]);
        assert_eq!(a.to_delete, vec!["old-a", "old-b"]);
        assert!(a.has_failures());
        assert!(!a.dry_run);
    }

    #[test]
    fn test_serialized_shape() {
        let mut report = RunReport::new(true);
        report.to_create.push("db1-2024-1-15-10-0".into());
        report.fail("eu-west-1", None, Action::ListSnapshots, None, "throttled");
        report.skipped_records.push(SkippedSnapshot {
            region: "eu-west-1".into(),
            resource: "db1".into(),
            record: SkippedRecord {
                snapshot_id: "db1-x".into(),
                reason: SkipReason::MissingCreationTime,
            },
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "to_create": ["db1-2024-1-15-10-0"],
                "to_delete": [],
                "failures": [{
                    "region": "eu-west-1",
                    "action": "list_snapshots",
                    "error": "throttled"
                }],
                "skipped_records": [{
                    "region": "eu-west-1",
                    "resource": "db1",
                    "snapshot_id": "db1-x",
                    "reason": "missing_creation_time"
                }],
                "dry_run": true
            })
        );
    }
}
