//! Snapshot retention: daily creation and tiered weekly pruning.
//!
//! For every resource this module decides:
//! 1. Whether today's snapshot still has to be taken (the creation gate)
//! 2. Which existing snapshots the weekly retention policy now allows deleting
//!
//! The decision engine (`window`, `filter`, `gate`, `plan`) is pure and
//! synchronous. The runner drives it over every configured region and
//! executes the decisions against a [`SnapshotStore`](crate::snapshots::SnapshotStore),
//! returning a [`RunReport`] instead of accumulating global state.

mod filter;
mod gate;
mod plan;
mod policy;
mod report;
mod runner;
mod window;

pub use filter::{DeletionSet, RetentionFilter};
pub use gate::{CreationDecision, CreationGate, date_suffix, snapshot_id};
pub use plan::{ResourcePlan, plan_resource};
pub use policy::{RetentionPolicy, WeekRule};
pub use report::{Action, ActionFailure, RunReport, SkippedSnapshot};
pub use runner::{RunOptions, run_retention};
use thiserror::Error;
pub use window::{Bucket, SkipReason, SkippedRecord, WeekBucketer, WeekBuckets, WeekWindow, midnight};

/// Malformed input to the decision engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Resource identifier is required")]
    MissingResource,
}
