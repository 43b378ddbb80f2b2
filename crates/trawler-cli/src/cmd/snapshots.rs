//! `trawler list-snapshots`: every snapshot, or those of one resource.

use crate::output::{OutputMode, Renderable, write_table};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use trawler_core::SnapshotList;
use trawler_core::model::{Snapshot, format_created_at};
use trawler_core::provider::SnapshotProvider;

#[derive(Args, Debug)]
pub struct ListSnapshotsArgs {
    /// Only show snapshots of this droplet or volume.
    pub resource_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotRow {
    id: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    resource_id: String,
    created_at: String,
    size_gigabytes: f64,
    min_disk_size: u64,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            resource_type: snapshot.resource_type.clone(),
            resource_id: snapshot.resource_id.clone(),
            created_at: format_created_at(&snapshot.created_at),
            size_gigabytes: snapshot.size_gigabytes,
            min_disk_size: snapshot.min_disk_size,
        }
    }
}

impl Renderable for SnapshotRow {
    fn headers() -> &'static [&'static str] {
        &["TYPE", "RESOURCEID", "CREATED", "NAME[ID]", "SIZE"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.resource_type.clone(),
            self.resource_id.clone(),
            self.created_at.clone(),
            format!("{}[{}]", self.name, self.id),
            format!("{}GB({})", self.size_gigabytes, self.min_disk_size),
        ]
    }
}

/// Write the snapshot table, oldest first.
pub fn write_snapshots(
    w: &mut dyn Write,
    snapshots: &SnapshotList,
    output: OutputMode,
) -> Result<()> {
    let rows: Vec<SnapshotRow> = snapshots.iter().map(SnapshotRow::from).collect();
    if !output.is_json() {
        writeln!(w, "Snapshots found: {}", rows.len())?;
    }
    write_table(w, &rows, output)
}

pub fn run_list_snapshots<P: SnapshotProvider + ?Sized>(
    args: &ListSnapshotsArgs,
    provider: &P,
    output: OutputMode,
) -> Result<()> {
    let snapshots = provider
        .list_snapshots(args.resource_id.as_deref())
        .context("failed to list snapshots")?;
    let snapshots = SnapshotList::new(snapshots);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_snapshots(&mut out, &snapshots, output)
}
