//! Cleanup planning and sequential deletion.
//!
//! Dry runs and live runs build the same [`CleanupPlan`]; only
//! [`execute_plan`] touches the provider's delete endpoint.

use crate::error::TrawlerError;
use crate::model::{Snapshot, SnapshotList};
use crate::policy::{RetentionPolicy, parse_policy};
use crate::provider::SnapshotProvider;
use crate::retention::{Selection, explain_survivors};
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Keep/delete partition of one resource's snapshots, both oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupPlan {
    pub resource_id: String,
    pub policy: String,
    pub keep: Vec<Snapshot>,
    pub delete: Vec<Snapshot>,
    pub selections: Vec<Selection>,
}

impl CleanupPlan {
    /// Partition `snapshots` by the survivors of `policy` at `now`.
    pub fn build<Tz: TimeZone>(
        resource_id: &str,
        snapshots: SnapshotList,
        policy: &RetentionPolicy,
        now: &DateTime<Tz>,
    ) -> Self {
        let selections = explain_survivors(&snapshots, policy, now);
        let survivors: BTreeSet<&str> = selections
            .iter()
            .map(|selection| selection.snapshot_id.as_str())
            .collect();

        let (keep, delete): (Vec<Snapshot>, Vec<Snapshot>) = snapshots
            .iter()
            .cloned()
            .partition(|snapshot| survivors.contains(snapshot.id.as_str()));

        Self {
            resource_id: resource_id.to_string(),
            policy: policy.to_string(),
            keep,
            delete,
            selections,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.keep.len() + self.delete.len()
    }

    /// Rules that kept `id`, e.g. `["2r", "1m"]`.
    #[must_use]
    pub fn reasons_for(&self, id: &str) -> Vec<&str> {
        self.selections
            .iter()
            .filter(|selection| selection.snapshot_id == id)
            .map(|selection| selection.rule.as_str())
            .collect()
    }
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub resource_id: String,
    pub policy: String,
    pub dry_run: bool,
    pub found: usize,
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
}

impl CleanupReport {
    fn from_plan(plan: &CleanupPlan, dry_run: bool, deleted: Vec<String>) -> Self {
        Self {
            resource_id: plan.resource_id.clone(),
            policy: plan.policy.clone(),
            dry_run,
            found: plan.total(),
            kept: plan.keep.iter().map(|s| s.id.clone()).collect(),
            deleted,
        }
    }

    /// Report for a dry run: `deleted` lists what a live run would delete.
    #[must_use]
    pub fn simulated(plan: &CleanupPlan) -> Self {
        let would_delete = plan.delete.iter().map(|s| s.id.clone()).collect();
        Self::from_plan(plan, true, would_delete)
    }
}

/// Delete every snapshot in `plan.delete`, oldest first, one at a time.
///
/// # Errors
///
/// Stops at the first failed deletion and returns
/// [`TrawlerError::Cleanup`] with the number already deleted. Those
/// deletions are not rolled back.
pub fn execute_plan<P: SnapshotProvider + ?Sized>(
    provider: &P,
    plan: &CleanupPlan,
) -> Result<CleanupReport, TrawlerError> {
    let mut deleted = Vec::with_capacity(plan.delete.len());
    for snapshot in &plan.delete {
        debug!(snapshot = %snapshot.id, created_at = %snapshot.created_at, "deleting snapshot");
        if let Err(source) = provider.delete_snapshot(&snapshot.id) {
            warn!(
                snapshot = %snapshot.id,
                deleted = deleted.len(),
                error = %source,
                "snapshot deletion failed, aborting cleanup"
            );
            return Err(TrawlerError::Cleanup {
                deleted: deleted.len(),
                source,
            });
        }
        deleted.push(snapshot.id.clone());
    }

    info!(
        resource = %plan.resource_id,
        kept = plan.keep.len(),
        deleted = deleted.len(),
        "cleanup finished"
    );
    Ok(CleanupReport::from_plan(plan, false, deleted))
}

/// Fetch, plan and (unless `dry_run`) prune one resource's snapshots.
///
/// The policy is parsed before the provider is contacted.
///
/// # Errors
///
/// Returns [`TrawlerError::InvalidPolicy`] for a malformed policy,
/// [`TrawlerError::Provider`] if listing fails, and [`TrawlerError::Cleanup`]
/// if a deletion fails.
pub fn cleanup_resource<P: SnapshotProvider + ?Sized, Tz: TimeZone>(
    provider: &P,
    resource_id: &str,
    policy: &str,
    now: &DateTime<Tz>,
    dry_run: bool,
) -> Result<(CleanupPlan, CleanupReport), TrawlerError> {
    let policy = parse_policy(policy)?;
    let snapshots = SnapshotList::new(provider.list_snapshots(Some(resource_id))?);
    info!(
        resource = %resource_id,
        policy = %policy,
        found = snapshots.len(),
        dry_run,
        "planning cleanup"
    );

    let plan = CleanupPlan::build(resource_id, snapshots, &policy, now);
    let report = if dry_run {
        CleanupReport::simulated(&plan)
    } else {
        execute_plan(provider, &plan)?
    };
    Ok((plan, report))
}
