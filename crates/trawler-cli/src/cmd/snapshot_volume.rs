//! `trawler snapshot-volume`: snapshot a block storage volume.
//!
//! Without an explicit name the snapshot is called
//! `<volume-name>-<unix-seconds>`.

use crate::output::{OutputMode, pretty_kv, render_mode};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use trawler_core::model::{default_snapshot_name, format_created_at};
use trawler_core::provider::SnapshotProvider;

#[derive(Args, Debug)]
pub struct SnapshotVolumeArgs {
    /// Volume id to snapshot.
    pub volume_id: String,

    /// Snapshot name (default: <volume-name>-<unix-seconds>).
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SnapshotVolumeOutput {
    volume_id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    dry_run: bool,
}

pub fn run_snapshot_volume<P: SnapshotProvider + ?Sized>(
    args: &SnapshotVolumeArgs,
    provider: &P,
    now: &DateTime<Utc>,
    dry_run: bool,
    output: OutputMode,
) -> Result<()> {
    let volume_id = args.volume_id.trim();
    if volume_id.is_empty() {
        anyhow::bail!("volume id must not be empty");
    }

    let name = match args.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let volume = provider
                .get_volume(volume_id)
                .map_err(trawler_core::TrawlerError::from)
                .with_context(|| format!("failed to look up volume '{volume_id}'"))?;
            default_snapshot_name(&volume, now)
        }
    };

    let mut result = SnapshotVolumeOutput {
        volume_id: volume_id.to_string(),
        name,
        snapshot_id: None,
        created_at: None,
        dry_run,
    };

    if !dry_run {
        let snapshot = provider
            .create_volume_snapshot(volume_id, &result.name)
            .with_context(|| format!("failed to snapshot volume '{volume_id}'"))?;
        tracing::info!(snapshot = %snapshot.id, volume = %volume_id, "snapshot created");
        result.snapshot_id = Some(snapshot.id);
        result.created_at = Some(format_created_at(&snapshot.created_at));
    }

    render_mode(output, &result, write_text, write_pretty)
}

fn write_text(result: &SnapshotVolumeOutput, w: &mut dyn Write) -> std::io::Result<()> {
    match result.snapshot_id {
        Some(ref id) => writeln!(w, "{id}\t{}\t{}", result.name, result.volume_id),
        None => writeln!(
            w,
            "dry mode in effect: simulate snapshot {} of volume {}",
            result.name, result.volume_id
        ),
    }
}

fn write_pretty(result: &SnapshotVolumeOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if result.snapshot_id.is_none() {
        return write_text(result, w);
    }
    pretty_kv(w, "Snapshot", result.snapshot_id.as_deref().unwrap_or_default())?;
    pretty_kv(w, "Name", &result.name)?;
    pretty_kv(w, "Volume", &result.volume_id)?;
    pretty_kv(w, "Created", result.created_at.as_deref().unwrap_or_default())
}
