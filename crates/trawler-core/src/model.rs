//! Snapshot and resource records as read from the provider.
//!
//! Records are immutable once retrieved. [`SnapshotList`] owns the
//! oldest-first ordering the retention engine depends on.

use crate::error::TrawlerError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Wire format for snapshot creation times (`2023-01-15T04:05:06Z`).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse a provider creation timestamp.
///
/// # Errors
///
/// Returns [`TrawlerError::TimeParse`] when `raw` is not exactly
/// `YYYY-MM-DDTHH:MM:SSZ`.
pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, TrawlerError> {
    NaiveDateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| TrawlerError::TimeParse {
            value: raw.to_string(),
            source,
        })
}

/// Format a timestamp back into the provider wire format.
#[must_use]
pub fn format_created_at(ts: &DateTime<Utc>) -> String {
    ts.format(CREATED_AT_FORMAT).to_string()
}

/// A point-in-time copy of a droplet or volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub resource_id: String,
    pub resource_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub size_gigabytes: f64,
    #[serde(default)]
    pub min_disk_size: u64,
}

impl Snapshot {
    /// Build a snapshot with only the fields the retention engine reads.
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            resource_id: resource_id.into(),
            resource_type: "volume".to_string(),
            created_at,
            size_gigabytes: 0.0,
            min_disk_size: 0,
        }
    }

    /// Like [`Snapshot::new`] but parsing the wire timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TrawlerError::TimeParse`] for a malformed timestamp.
    pub fn parse(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        created_at: &str,
    ) -> Result<Self, TrawlerError> {
        Ok(Self::new(id, resource_id, parse_created_at(created_at)?))
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }
}

/// Snapshots of one resource, ordered oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotList {
    snapshots: Vec<Snapshot>,
}

impl SnapshotList {
    /// Sort provider output ascending by creation time.
    ///
    /// The sort is stable, so snapshots sharing a timestamp keep the order
    /// the provider returned them in.
    #[must_use]
    pub fn new(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.created_at);
        Self { snapshots }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

impl Deref for SnapshotList {
    type Target = [Snapshot];

    fn deref(&self) -> &Self::Target {
        &self.snapshots
    }
}

impl From<Vec<Snapshot>> for SnapshotList {
    fn from(snapshots: Vec<Snapshot>) -> Self {
        Self::new(snapshots)
    }
}

/// Kind of snapshottable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Droplet,
    Volume,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Droplet => f.write_str("droplet"),
            Self::Volume => f.write_str("volume"),
        }
    }
}

/// A droplet or volume reachable with the configured token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    pub region: String,
    pub region_slug: String,
    pub disk_size_gb: u64,
}

/// Block storage volume, as needed to name a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
}

/// Default snapshot name for a volume: `<volume-name>-<unix-seconds>`.
#[must_use]
pub fn default_snapshot_name(volume: &Volume, now: &DateTime<Utc>) -> String {
    format!("{}-{}", volume.name, now.timestamp())
}
