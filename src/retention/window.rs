//! Weekly windows relative to the evaluation instant.
//!
//! Offset 0 runs from the start of the current week up to and including
//! `now`. Offset `c >= 1` is the half-open range
//! `[week_start - 7c days, week_start - 7(c-1) days)`, so consecutive windows
//! share a boundary that belongs to exactly one of them.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::Serialize;

use crate::snapshots::ResourceSnapshots;

/// Snapshot id to creation time for the records of one window.
pub type Bucket = BTreeMap<String, DateTime<Utc>>;

/// Midnight UTC at the start of the day containing `t`.
pub fn midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// A contiguous time range assigned a week offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub offset: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    /// Whether `t` falls inside this window. Window 0 is closed at `end`
    /// (which is `now`); older windows are open at `end`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        if t < self.start {
            return false;
        }
        if self.offset == 0 {
            t <= self.end
        } else {
            t < self.end
        }
    }
}

/// Why a record could not be placed in any window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingCreationTime,
    CreatedInFuture,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingCreationTime => f.write_str("missing creation time"),
            SkipReason::CreatedInFuture => f.write_str("creation time is in the future"),
        }
    }
}

/// A record excluded from bucketing because its data is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub snapshot_id: String,
    pub reason: SkipReason,
}

/// Buckets of one resource's snapshots, indexed by week offset.
///
/// Only offsets holding at least one record are stored.
#[derive(Debug, Clone, Default)]
pub struct WeekBuckets {
    buckets: BTreeMap<u32, Bucket>,
    skipped: Vec<SkippedRecord>,
}

impl WeekBuckets {
    /// The bucket at `offset`, if any record landed there.
    pub fn get(&self, offset: u32) -> Option<&Bucket> {
        self.buckets.get(&offset)
    }

    /// Populated offsets, ascending.
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.keys().copied()
    }

    /// True when no record was bucketed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Records that could not be bucketed.
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    /// Total number of bucketed records.
    pub fn bucketed(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }
}

/// Partitions snapshots into weekly windows `0..=horizon` relative to `now`.
#[derive(Debug, Clone, Copy)]
pub struct WeekBucketer {
    now: DateTime<Utc>,
    week_start: DateTime<Utc>,
    horizon_weeks: u32,
}

impl WeekBucketer {
    pub fn new(now: DateTime<Utc>, week_starts_on: Weekday, horizon_weeks: u32) -> Self {
        let days_into_week = (7 + now.weekday().num_days_from_monday()
            - week_starts_on.num_days_from_monday())
            % 7;
        let week_start = midnight(now) - Duration::days(i64::from(days_into_week));
        Self {
            now,
            week_start,
            horizon_weeks,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Midnight at the start of the current week.
    pub fn week_start(&self) -> DateTime<Utc> {
        self.week_start
    }

    pub fn horizon_weeks(&self) -> u32 {
        self.horizon_weeks
    }

    /// The window for `offset`.
    pub fn window(&self, offset: u32) -> WeekWindow {
        let boundary = |weeks: u32| self.week_start - Duration::weeks(i64::from(weeks));
        if offset == 0 {
            WeekWindow {
                offset,
                start: self.week_start,
                end: self.now,
            }
        } else {
            WeekWindow {
                offset,
                start: boundary(offset),
                end: boundary(offset - 1),
            }
        }
    }

    /// Windows `0..=horizon`, newest first.
    pub fn windows(&self) -> Vec<WeekWindow> {
        (0..=self.horizon_weeks).map(|offset| self.window(offset)).collect()
    }

    /// The offset whose window contains `t`, if any.
    ///
    /// A timestamp exactly on a week boundary belongs to the newer window.
    pub fn offset_of(&self, t: DateTime<Utc>) -> Option<u32> {
        if t > self.now {
            return None;
        }
        if t >= self.week_start {
            return Some(0);
        }

        // Window c covers ages in ((c-1) weeks, c weeks] before week_start.
        let age = self.week_start - t;
        let whole = age.num_weeks();
        let offset = if age == Duration::weeks(whole) {
            whole
        } else {
            whole + 1
        };
        u32::try_from(offset)
            .ok()
            .filter(|offset| *offset <= self.horizon_weeks)
    }

    /// Assign every record of a resource to its weekly bucket.
    ///
    /// Records older than the horizon are silently ignored. Records without
    /// a creation time, or created after `now`, are reported as skipped.
    pub fn bucket(&self, snapshots: &ResourceSnapshots) -> WeekBuckets {
        let mut buckets: BTreeMap<u32, Bucket> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (id, record) in snapshots {
            let Some(created_at) = record.created_at else {
                skipped.push(SkippedRecord {
                    snapshot_id: id.clone(),
                    reason: SkipReason::MissingCreationTime,
                });
                continue;
            };
            if created_at > self.now {
                skipped.push(SkippedRecord {
                    snapshot_id: id.clone(),
                    reason: SkipReason::CreatedInFuture,
                });
                continue;
            }
            if let Some(offset) = self.offset_of(created_at) {
                buckets
                    .entry(offset)
                    .or_default()
                    .insert(id.clone(), created_at);
            }
        }

        WeekBuckets { buckets, skipped }
    }
}
