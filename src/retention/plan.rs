use chrono::{DateTime, Utc};

use super::{
    EngineError,
    filter::{DeletionSet, RetentionFilter},
    gate::{CreationDecision, CreationGate},
    policy::RetentionPolicy,
    window::{SkippedRecord, WeekBucketer},
};
use crate::snapshots::ResourceSnapshots;

/// Everything the engine decided for one resource in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePlan {
    pub resource: String,
    pub creation: CreationDecision,
    pub deletions: DeletionSet,
    /// Records left out of every decision because of malformed data.
    pub skipped: Vec<SkippedRecord>,
}

/// Run the bucketer, filter and creation gate over one resource's snapshots.
///
/// Pure: the same inputs always produce the same plan, whatever order
/// resources are evaluated in.
pub fn plan_resource(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    resource: &str,
    snapshots: &ResourceSnapshots,
) -> Result<ResourcePlan, EngineError> {
    if resource.trim().is_empty() {
        return Err(EngineError::MissingResource);
    }

    let creation = CreationGate::new(now).evaluate(resource, snapshots)?;

    let bucketer = WeekBucketer::new(now, policy.week_starts_on(), policy.horizon_weeks());
    let buckets = bucketer.bucket(snapshots);
    for skipped in buckets.skipped() {
        tracing::warn!(
            resource,
            snapshot_id = %skipped.snapshot_id,
            reason = %skipped.reason,
            "Snapshot excluded from retention"
        );
    }
    let deletions = RetentionFilter::new(policy).deletion_set(&buckets);

    Ok(ResourcePlan {
        resource: resource.to_string(),
        creation,
        deletions,
        skipped: buckets.skipped().to_vec(),
    })
}
