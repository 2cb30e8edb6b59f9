//! # Licmeter Engine
//!
//! Consumption metering for a monitored fleet: host units, DEM units per
//! application and synthetic test, and DDU per management zone.
//!
//! ## Tick
//!
//! ```text
//! measure: hosts -> host units -> snapshot
//! reset:   snapshot cleared -> DEM -> DDU -> host units -> zone rules
//! ```
//!
//! Every tick reads the window snapshot once. A reset tick publishes the
//! closed window and starts a new one.

pub mod client;
pub mod config;
pub mod directory;
pub mod engine;
pub mod ingest;
pub mod metering;
pub mod pricing;
pub mod telemetry;
pub mod window;
pub mod zones;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{HttpTenantApi, TenantApi};
pub use config::{ConsumptionFamilies, MeterConfig};
pub use directory::EntityDirectory;
pub use engine::{MeteringEngine, TickReport};
pub use telemetry::EngineMetrics;
pub use window::{TickKind, WindowPlan};
pub use zones::ZoneSyncReport;

/// Inventory endpoint, relative to the tenant URL
pub const ENTITY_ENDPOINT: &str = "api/v2/entities";

/// Metric query endpoint
pub const METRIC_ENDPOINT: &str = "api/v2/metrics/query";

/// Metric ingestion endpoint
pub const METRIC_INGEST_ENDPOINT: &str = "api/v2/metrics/ingest";

/// Management zone configuration endpoint
pub const ZONE_ENDPOINT: &str = "api/config/v1/managementZones";

/// Time after tick start during which new entity types are still fetched
pub const ATTRIBUTION_BUDGET_MS: u64 = 40_000;

/// Zone rule updates in flight at once
pub const ZONE_SYNC_CONCURRENCY: usize = 5;

/// Lines per ingest request for host unit streams
pub const HOST_BATCH_LINES: usize = 998;

/// Lines per ingest request for DEM and DDU streams
pub const AGGREGATE_BATCH_LINES: usize = 1000;

/// Serialized tag string length after which no further tags are appended
pub const TAG_BUDGET_CHARS: usize = 1500;
