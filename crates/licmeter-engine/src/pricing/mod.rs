//! Pricing module
//!
//! Provides the host unit calculator used to price host capacity.

pub mod host_units;

pub use host_units::{host_memory_bytes, host_units, MonitoringMode};
