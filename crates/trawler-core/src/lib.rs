//! trawler-core library.
//!
//! Parses retention policies such as `3r2w1m1y`, selects the snapshots they
//! keep, and plans/executes the deletion of everything else against a
//! [`provider::SnapshotProvider`].
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::TrawlerError`] / [`error::ProviderError`] with stable codes.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod cleanup;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod provider;
pub mod retention;

pub use cleanup::{CleanupPlan, CleanupReport, cleanup_resource, execute_plan};
pub use error::{ErrorCode, ProviderError, TrawlerError};
pub use model::{Snapshot, SnapshotList};
pub use policy::{CalendarKind, RetentionPolicy, RetentionRule, parse_policy};
pub use retention::{BucketIndex, compute_survivors};
