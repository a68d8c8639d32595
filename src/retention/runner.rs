//! Run orchestrator: drives the decision engine over every configured region
//! and executes the resulting creations and deletions against a store.
//!
//! Store failures never abort the run. Each one is recorded in the
//! [`RunReport`] and processing moves on to the next snapshot, resource or
//! region.

use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};

use super::{
    Action, CreationDecision, ResourcePlan, RetentionPolicy, RunReport, SkippedSnapshot,
    plan_resource,
};
use crate::{
    config::WardenConfig,
    snapshots::{ResourceRef, ResourceSnapshots, SnapshotStore, Tag},
};

/// Per-invocation settings that are not part of the configuration file.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Evaluation instant shared by every decision in the run.
    pub now: DateTime<Utc>,
    /// Plan only. Combined with `retention.safety.dry_run` from the config.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Settings shared read-only by every region task.
struct RunContext<'a> {
    store: &'a dyn SnapshotStore,
    policy: RetentionPolicy,
    tags: &'a [Tag],
    now: DateTime<Utc>,
    dry_run: bool,
}

/// Run a single retention pass over every configured region.
///
/// Regions are processed concurrently (bounded by
/// `retention.max_concurrent_regions`); resources within a region are
/// processed one after another.
pub async fn run_retention(
    store: &dyn SnapshotStore,
    config: &WardenConfig,
    options: RunOptions,
) -> RunReport {
    let dry_run = options.dry_run || config.retention.safety.dry_run;
    let dry_run_msg = if dry_run { " (DRY RUN)" } else { "" };

    let ctx = RunContext {
        store,
        policy: RetentionPolicy::from(&config.retention),
        tags: &config.creation.additional_tags,
        now: options.now,
        dry_run,
    };

    tracing::info!(
        regions = ?config.regions,
        now = %ctx.now,
        horizon_weeks = ctx.policy.horizon_weeks(),
        min_current_week_snapshots = ctx.policy.min_current_week_snapshots(),
        dry_run,
        "Starting snapshot retention run{}",
        dry_run_msg
    );
    let started = Instant::now();

    let concurrency = config.retention.max_concurrent_regions.max(1);
    let reports: Vec<RunReport> = stream::iter(config.regions.iter())
        .map(|region| run_region(&ctx, region))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = RunReport::new(dry_run);
    for region_report in reports {
        report.merge(region_report);
    }
    report.normalize();

    tracing::info!(
        created = report.to_create.len(),
        deleted = report.to_delete.len(),
        failures = report.failures.len(),
        skipped_records = report.skipped_records.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Snapshot retention run complete{}",
        dry_run_msg
    );

    report
}

async fn run_region(ctx: &RunContext<'_>, region: &str) -> RunReport {
    let mut report = RunReport::new(ctx.dry_run);

    let resources = match ctx.store.available_resources(region).await {
        Ok(resources) => resources,
        Err(e) => {
            tracing::error!(region, error = %e, "Failed to list available resources");
            report.fail(region, None, Action::ListResources, None, e);
            return report;
        }
    };

    let catalog = match ctx.store.snapshot_catalog(region).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(region, error = %e, "Failed to list existing snapshots");
            report.fail(region, None, Action::ListSnapshots, None, e);
            return report;
        }
    };

    tracing::debug!(
        region,
        resources = resources.len(),
        snapshots = catalog.len(),
        "Loaded region catalog"
    );

    for resource in &resources {
        run_resource(ctx, region, resource, catalog.resource(&resource.name), &mut report).await;
    }

    report
}

async fn run_resource(
    ctx: &RunContext<'_>,
    region: &str,
    resource: &ResourceRef,
    snapshots: &ResourceSnapshots,
    report: &mut RunReport,
) {
    let ResourcePlan {
        resource: name,
        creation,
        deletions,
        skipped,
    } = match plan_resource(&ctx.policy, ctx.now, &resource.name, snapshots) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(region, resource = %resource.name, error = %e, "Failed to plan resource");
            report.fail(
                region,
                Some(resource.name.as_str()),
                Action::Plan,
                None,
                e,
            );
            return;
        }
    };

    tracing::debug!(
        region,
        resource = %name,
        existing = snapshots.len(),
        to_delete = deletions.len(),
        "Planned resource"
    );

    report
        .skipped_records
        .extend(skipped.into_iter().map(|record| SkippedSnapshot {
            region: region.to_string(),
            resource: name.clone(),
            record,
        }));

    create_if_needed(ctx, region, resource, creation, report).await;

    for snapshot_id in deletions {
        if ctx.dry_run {
            tracing::info!(
                region,
                resource = %name,
                snapshot_id = %snapshot_id,
                "DRY RUN: Would delete outdated snapshot"
            );
            report.to_delete.push(snapshot_id);
            continue;
        }

        tracing::info!(region, resource = %name, snapshot_id = %snapshot_id, "Deleting outdated snapshot");
        match ctx.store.delete_snapshot(region, &name, &snapshot_id).await {
            Ok(()) => report.to_delete.push(snapshot_id),
            Err(e) => {
                tracing::error!(
                    region,
                    resource = %name,
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Failed to delete outdated snapshot"
                );
                report.fail(
                    region,
                    Some(name.as_str()),
                    Action::Delete,
                    Some(snapshot_id.as_str()),
                    e,
                );
            }
        }
    }
}

async fn create_if_needed(
    ctx: &RunContext<'_>,
    region: &str,
    resource: &ResourceRef,
    creation: CreationDecision,
    report: &mut RunReport,
) {
    let snapshot_id = match &creation {
        CreationDecision::AlreadyDone { snapshot_id } => {
            tracing::info!(
                region,
                resource = %resource.name,
                existing = %snapshot_id,
                "No need to make a snapshot"
            );
            return;
        }
        CreationDecision::Create { snapshot_id } => snapshot_id.clone(),
    };

    if ctx.dry_run {
        tracing::info!(
            region,
            resource = %resource.name,
            snapshot_id = %snapshot_id,
            "DRY RUN: Would create snapshot"
        );
        report.to_create.push(snapshot_id);
        return;
    }

    let existing_tags = match ctx.store.resource_tags(region, resource).await {
        Ok(tags) => tags,
        Err(e) => {
            tracing::error!(
                region,
                resource = %resource.name,
                error = %e,
                "Failed to read resource tags, skipping snapshot creation"
            );
            report.fail(
                region,
                Some(resource.name.as_str()),
                Action::ListTags,
                Some(snapshot_id.as_str()),
                e,
            );
            return;
        }
    };

    let Some(request) = creation.into_request(&resource.name, &existing_tags, ctx.tags) else {
        return;
    };

    tracing::info!(region, resource = %resource.name, snapshot_id = %snapshot_id, "Creating snapshot");
    match ctx.store.create_snapshot(region, &request).await {
        Ok(()) => report.to_create.push(request.snapshot_id),
        Err(e) => {
            tracing::error!(
                region,
                resource = %resource.name,
                snapshot_id = %snapshot_id,
                error = %e,
                "Failed to create snapshot"
            );
            report.fail(
                region,
                Some(resource.name.as_str()),
                Action::Create,
                Some(snapshot_id.as_str()),
                e,
            );
        }
    }
}
