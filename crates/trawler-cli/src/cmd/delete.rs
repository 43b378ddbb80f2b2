//! `trawler delete-snapshot`: delete a single snapshot by id.
//!
//! With `--dry` the deletion is only reported.

use crate::output::{OutputMode, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use trawler_core::provider::SnapshotProvider;

#[derive(Args, Debug)]
pub struct DeleteSnapshotArgs {
    /// Snapshot id to delete.
    pub snapshot_id: String,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    id: String,
    deleted: bool,
    dry_run: bool,
}

pub fn run_delete_snapshot<P: SnapshotProvider + ?Sized>(
    args: &DeleteSnapshotArgs,
    provider: &P,
    dry_run: bool,
    output: OutputMode,
) -> Result<()> {
    let id = args.snapshot_id.trim();
    if id.is_empty() {
        anyhow::bail!("snapshot id must not be empty");
    }

    if !dry_run {
        provider
            .delete_snapshot(id)
            .map_err(trawler_core::TrawlerError::from)
            .with_context(|| format!("failed to delete snapshot '{id}'"))?;
        tracing::info!(snapshot = %id, "snapshot deleted");
    }

    let result = DeleteOutput {
        id: id.to_string(),
        deleted: !dry_run,
        dry_run,
    };
    render_mode(output, &result, write_text, write_text)
}

fn write_text(result: &DeleteOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if result.dry_run {
        writeln!(w, "dry mode in effect: simulate delete {}", result.id)
    } else {
        writeln!(w, "snapshot {} deleted", result.id)
    }
}
