//! `trawler list-resources`: droplets and volumes reachable with the token.

use crate::output::{OutputMode, Renderable, render_table};
use anyhow::{Context as _, Result};
use serde::Serialize;
use trawler_core::model::Resource;
use trawler_core::provider::SnapshotProvider;

#[derive(Debug, Serialize)]
pub struct ResourceRow {
    #[serde(rename = "type")]
    kind: String,
    resource_id: String,
    name: String,
    region: String,
    region_slug: String,
    disk_size_gb: u64,
}

impl From<Resource> for ResourceRow {
    fn from(resource: Resource) -> Self {
        Self {
            kind: resource.kind.to_string(),
            resource_id: resource.id,
            name: resource.name,
            region: resource.region,
            region_slug: resource.region_slug,
            disk_size_gb: resource.disk_size_gb,
        }
    }
}

impl Renderable for ResourceRow {
    fn headers() -> &'static [&'static str] {
        &["TYPE", "RESOURCEID", "NAME", "REGION", "DISKSIZE(GB)"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.kind.clone(),
            self.resource_id.clone(),
            self.name.clone(),
            format!("{} ({})", self.region, self.region_slug),
            self.disk_size_gb.to_string(),
        ]
    }
}

pub fn run_list_resources<P: SnapshotProvider + ?Sized>(
    provider: &P,
    output: OutputMode,
) -> Result<()> {
    let rows: Vec<ResourceRow> = provider
        .list_resources()
        .map_err(trawler_core::TrawlerError::from)
        .context("failed to list resources")?
        .into_iter()
        .map(ResourceRow::from)
        .collect();
    render_table(&rows, output)
}
