//! Per-window keep/delete selection.

use std::collections::BTreeSet;

use chrono::Datelike;

use super::{
    policy::{RetentionPolicy, WeekRule},
    window::{Bucket, WeekBuckets},
};

/// Snapshot ids selected for deletion for one resource in one run.
pub type DeletionSet = BTreeSet<String>;

/// Applies a [`RetentionPolicy`] to weekly buckets.
#[derive(Debug, Clone, Copy)]
pub struct RetentionFilter<'a> {
    policy: &'a RetentionPolicy,
}

impl<'a> RetentionFilter<'a> {
    pub fn new(policy: &'a RetentionPolicy) -> Self {
        Self { policy }
    }

    /// Ids in `bucket` that the rule for `offset` selects for deletion.
    ///
    /// For the current week (offset 0) nothing is selected until the bucket
    /// holds at least `min_current_week_snapshots` records in total.
    pub fn select(&self, offset: u32, bucket: &Bucket) -> Vec<String> {
        let candidates: Vec<String> = match self.policy.rule(offset) {
            WeekRule::Retain => return Vec::new(),
            WeekRule::DeleteAll => bucket.keys().cloned().collect(),
            WeekRule::KeepWeekdays(keep) => bucket
                .iter()
                .filter(|(_, created_at)| !keep.contains(&created_at.weekday()))
                .map(|(id, _)| id.clone())
                .collect(),
        };

        if offset == 0 && bucket.len() < self.policy.min_current_week_snapshots() {
            if !candidates.is_empty() {
                tracing::debug!(
                    bucket_size = bucket.len(),
                    candidates = candidates.len(),
                    threshold = self.policy.min_current_week_snapshots(),
                    "Current week below population threshold, keeping all"
                );
            }
            return Vec::new();
        }

        candidates
    }

    /// Union of the selections over every governed offset.
    pub fn deletion_set(&self, buckets: &WeekBuckets) -> DeletionSet {
        self.policy
            .governed_offsets()
            .into_iter()
            .filter_map(|offset| buckets.get(offset).map(|bucket| (offset, bucket)))
            .flat_map(|(offset, bucket)| self.select(offset, bucket))
            .collect()
    }
}
