//! Core record types for consumption metering

pub mod attribution;
pub mod host_record;
pub mod tags;
