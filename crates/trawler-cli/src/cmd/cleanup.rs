//! `trawler cleanup`: apply a retention policy to one resource.
//!
//! The same plan drives both modes; `--dry` prints it and stops before the
//! first delete call.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use chrono::{DateTime, TimeZone};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use trawler_core::model::format_created_at;
use trawler_core::provider::SnapshotProvider;
use trawler_core::{CleanupPlan, CleanupReport, cleanup_resource};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Droplet or volume whose snapshots are pruned.
    pub resource_id: String,

    /// Retention policy, e.g. `3r2w1m1y` (default from config, normally `1r`).
    pub policy: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanEntry {
    action: &'static str,
    id: String,
    name: String,
    created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    kept_by: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CleanupOutput {
    #[serde(flatten)]
    report: CleanupReport,
    snapshots: Vec<PlanEntry>,
}

impl CleanupOutput {
    fn new(plan: &CleanupPlan, report: CleanupReport) -> Self {
        let mut snapshots: Vec<PlanEntry> = plan
            .keep
            .iter()
            .map(|s| (s, "keep"))
            .chain(plan.delete.iter().map(|s| (s, "delete")))
            .map(|(snapshot, action)| PlanEntry {
                action,
                id: snapshot.id.clone(),
                name: snapshot.name.clone(),
                created_at: format_created_at(&snapshot.created_at),
                kept_by: plan
                    .reasons_for(&snapshot.id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Self { report, snapshots }
    }
}

pub fn run_cleanup<P: SnapshotProvider + ?Sized, Tz: TimeZone>(
    args: &CleanupArgs,
    default_policy: &str,
    provider: &P,
    now: &DateTime<Tz>,
    dry_run: bool,
    output: OutputMode,
) -> Result<()> {
    let resource_id = args.resource_id.trim();
    if resource_id.is_empty() {
        anyhow::bail!("resource id must not be empty");
    }
    let policy = args.policy.as_deref().unwrap_or(default_policy);

    let (plan, report) = cleanup_resource(provider, resource_id, policy, now, dry_run)
        .with_context(|| format!("cleanup of '{resource_id}' failed"))?;

    let result = CleanupOutput::new(&plan, report);
    render_mode(output, &result, write_text, write_pretty)
}

fn write_text(result: &CleanupOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in &result.snapshots {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            entry.action,
            entry.id,
            entry.created_at,
            entry.kept_by.join(",")
        )?;
    }
    summary_line(result, w)
}

fn write_pretty(result: &CleanupOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    pretty_section(w, &format!("Cleanup {}", report.resource_id))?;
    pretty_kv(w, "Policy", &report.policy)?;
    pretty_kv(w, "Found", report.found.to_string())?;
    writeln!(w)?;
    for entry in &result.snapshots {
        let verb = match (entry.action, report.dry_run) {
            ("keep", _) => "keep",
            (_, true) => "would delete",
            _ => "delete",
        };
        if entry.kept_by.is_empty() {
            writeln!(w, "  {verb:<12}  {}  {} ({})", entry.created_at, entry.name, entry.id)?;
        } else {
            writeln!(
                w,
                "  {verb:<12}  {}  {} ({})  [{}]",
                entry.created_at,
                entry.name,
                entry.id,
                entry.kept_by.join(", ")
            )?;
        }
    }
    writeln!(w)?;
    summary_line(result, w)
}

fn summary_line(result: &CleanupOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    if report.dry_run {
        writeln!(
            w,
            "dry mode in effect: would delete {} of {} snapshot(s), {} remaining",
            report.deleted.len(),
            report.found,
            report.kept.len()
        )
    } else {
        writeln!(
            w,
            "deleted {} of {} snapshot(s), {} remaining",
            report.deleted.len(),
            report.found,
            report.kept.len()
        )
    }
}
