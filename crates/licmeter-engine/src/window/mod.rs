//! Billing window module
//!
//! - WindowScheduler: measurement tick or reset tick
//! - SnapshotStore: window start and host tallies between invocations

pub mod scheduler;
pub mod snapshot;

pub use scheduler::{plan_window, TickKind, WindowPlan};
pub use snapshot::{CacheSnapshot, SnapshotStore};
