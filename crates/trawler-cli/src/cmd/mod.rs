pub mod cleanup;
pub mod delete;
pub mod resources;
pub mod snapshot_volume;
pub mod snapshots;
