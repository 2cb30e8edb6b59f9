//! Metering module
//!
//! - Host sightings: host unit tallies for the running window
//! - Aggregator: weighted DEM and DDU totals per attribution key
//! - Signals: billing metric selectors and weights

pub mod aggregator;
pub mod hosts;
pub mod signals;

pub use aggregator::{accumulate, ddu_consumption, dem_consumption, ConsumptionMap, DemConsumption};
pub use hosts::{observe_hosts, record_sightings};
pub use signals::{Signal, DDU_METRIC, DEM_ENTITY_TYPES, RUM_SIGNALS, SYNTHETIC_SIGNALS};
