//! The snapshot provider seam.
//!
//! Cleanup only ever talks to a [`SnapshotProvider`]. The CLI implements it
//! against the DigitalOcean API; [`MemoryProvider`] backs tests and dry
//! experiments.

use crate::error::{ProviderError, TrawlerError};
use crate::model::{Resource, Snapshot, Volume};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};

/// Operations trawler needs from a cloud provider.
///
/// Calls are blocking and issued one at a time.
pub trait SnapshotProvider {
    /// All snapshots, or only those of `resource_id` when given.
    ///
    /// Implementations follow pagination to the end. Ordering is not
    /// guaranteed; callers sort through [`crate::model::SnapshotList`].
    ///
    /// # Errors
    ///
    /// Returns [`TrawlerError::Provider`] when any page fails to load and
    /// [`TrawlerError::TimeParse`] when a snapshot carries a malformed
    /// creation time.
    fn list_snapshots(&self, resource_id: Option<&str>) -> Result<Vec<Snapshot>, TrawlerError>;

    /// Delete one snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] for an unknown id, or another
    /// variant for API and transport failures.
    fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError>;

    /// Snapshot a block storage volume.
    ///
    /// # Errors
    ///
    /// Returns [`TrawlerError::Provider`] when the volume is unknown or the
    /// request fails.
    fn create_volume_snapshot(&self, volume_id: &str, name: &str)
    -> Result<Snapshot, TrawlerError>;

    /// Look up a volume.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] for an unknown volume.
    fn get_volume(&self, volume_id: &str) -> Result<Volume, ProviderError>;

    /// Every droplet and volume visible to the credentials.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when any page fails to load.
    fn list_resources(&self) -> Result<Vec<Resource>, ProviderError>;
}

/// In-memory provider with delete-call recording and failure injection.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    snapshots: RefCell<Vec<Snapshot>>,
    volumes: Vec<Volume>,
    resources: Vec<Resource>,
    deleted: RefCell<Vec<String>>,
    fail_on_delete: Option<String>,
    next_id: Cell<u64>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: RefCell::new(snapshots),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Make deletion of `id` fail with a transport error.
    #[must_use]
    pub fn fail_on_delete(mut self, id: impl Into<String>) -> Self {
        self.fail_on_delete = Some(id.into());
        self
    }

    /// Fix the creation time given to new snapshots.
    #[must_use]
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    /// Ids passed to successful [`SnapshotProvider::delete_snapshot`] calls, in order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    /// Snapshots still present.
    #[must_use]
    pub fn remaining(&self) -> Vec<Snapshot> {
        self.snapshots.borrow().clone()
    }
}

impl SnapshotProvider for MemoryProvider {
    fn list_snapshots(&self, resource_id: Option<&str>) -> Result<Vec<Snapshot>, TrawlerError> {
        Ok(self
            .snapshots
            .borrow()
            .iter()
            .filter(|snapshot| resource_id.is_none_or(|id| snapshot.resource_id == id))
            .cloned()
            .collect())
    }

    fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError> {
        if self.fail_on_delete.as_deref() == Some(id) {
            return Err(ProviderError::Transport(format!(
                "connection reset while deleting {id}"
            )));
        }

        let mut snapshots = self.snapshots.borrow_mut();
        let Some(pos) = snapshots.iter().position(|snapshot| snapshot.id == id) else {
            return Err(ProviderError::snapshot_not_found(id));
        };
        snapshots.remove(pos);
        self.deleted.borrow_mut().push(id.to_string());
        Ok(())
    }

    fn create_volume_snapshot(
        &self,
        volume_id: &str,
        name: &str,
    ) -> Result<Snapshot, TrawlerError> {
        let volume = self.get_volume(volume_id)?;
        let seq = self.next_id.get() + 1;
        self.next_id.set(seq);

        let snapshot = Snapshot::new(
            format!("mem-{seq}"),
            volume.id,
            self.clock.unwrap_or_else(Utc::now),
        )
        .with_name(name);
        self.snapshots.borrow_mut().push(snapshot.clone());
        Ok(snapshot)
    }

    fn get_volume(&self, volume_id: &str) -> Result<Volume, ProviderError> {
        self.volumes
            .iter()
            .find(|volume| volume.id == volume_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                kind: "volume",
                id: volume_id.to_string(),
            })
    }

    fn list_resources(&self) -> Result<Vec<Resource>, ProviderError> {
        Ok(self.resources.clone())
    }
}
