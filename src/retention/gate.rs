//! Daily creation gate.

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::{EngineError, window::midnight};
use crate::snapshots::{CreationRequest, ResourceSnapshots, Tag, merge_tags};

/// Outcome of the creation gate for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationDecision {
    /// A live snapshot was already taken today.
    AlreadyDone { snapshot_id: String },
    /// No snapshot yet today; take one with this id.
    Create { snapshot_id: String },
}

impl CreationDecision {
    pub fn must_create(&self) -> bool {
        matches!(self, CreationDecision::Create { .. })
    }

    /// Build the store request for a `Create` decision, attaching the
    /// resource's existing tags merged with the policy tags.
    pub fn into_request(
        self,
        resource_name: &str,
        existing_tags: &[Tag],
        policy_tags: &[Tag],
    ) -> Option<CreationRequest> {
        match self {
            CreationDecision::AlreadyDone { .. } => None,
            CreationDecision::Create { snapshot_id } => Some(CreationRequest {
                resource_name: resource_name.to_string(),
                snapshot_id,
                tags: merge_tags(existing_tags, policy_tags),
            }),
        }
    }
}

/// `year-month-day-hour-minute` with unpadded fields, e.g. `2024-1-15-10-0`.
pub fn date_suffix(t: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute()
    )
}

/// Candidate id for a snapshot of `resource_name` taken at `now`.
pub fn snapshot_id(resource_name: &str, now: DateTime<Utc>) -> String {
    format!("{resource_name}-{}", date_suffix(now))
}

/// Decides whether a resource still needs today's snapshot.
///
/// Any creating or available snapshot created in `[midnight(now), now)`
/// satisfies the gate, whatever its id, so re-running later the same day is a
/// no-op.
#[derive(Debug, Clone, Copy)]
pub struct CreationGate {
    now: DateTime<Utc>,
    today: DateTime<Utc>,
}

impl CreationGate {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            today: midnight(now),
        }
    }

    fn done_today(&self, created_at: DateTime<Utc>) -> bool {
        self.today <= created_at && created_at < self.now
    }

    /// First live snapshot taken today, if any.
    pub fn find_today<'a>(&self, snapshots: &'a ResourceSnapshots) -> Option<&'a str> {
        snapshots
            .values()
            .find(|record| {
                record.status.is_live() && record.created_at.is_some_and(|t| self.done_today(t))
            })
            .map(|record| record.id.as_str())
    }

    pub fn evaluate(
        &self,
        resource_name: &str,
        snapshots: &ResourceSnapshots,
    ) -> Result<CreationDecision, EngineError> {
        if resource_name.trim().is_empty() {
            return Err(EngineError::MissingResource);
        }

        match self.find_today(snapshots) {
            Some(existing) => {
                tracing::debug!(
                    resource = resource_name,
                    snapshot_id = existing,
                    "Snapshot already taken today"
                );
                Ok(CreationDecision::AlreadyDone {
                    snapshot_id: existing.to_string(),
                })
            }
            None => Ok(CreationDecision::Create {
                snapshot_id: snapshot_id(resource_name, self.now),
            }),
        }
    }
}
