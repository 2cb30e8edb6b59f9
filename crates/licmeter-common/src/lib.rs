//! # Licmeter Common
//!
//! Shared records, tag rules, and errors for the licmeter consumption engine.
//!
//! ## Core Types
//!
//! - [`HostRecord`]: per-host running tally kept in the window snapshot
//! - [`EntityAttribution`]: zones, tags, and display name of an entity
//! - [`ManagementZone`]: attribution zone reference
//! - [`TagMap`]: sanitized, capped tag set

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ApiError, CacheError, MeterError, Result};
pub use types::{
    attribution::{entity_type_of, EntityAttribution, ManagementZone, UNDEFINED_ZONE},
    host_record::{HostRecord, HOST_UNIT_HOURS_MIN_SIGHTINGS},
    tags::{
        collect_tags, escape_quotes, sanitize_tag_key, sanitize_tag_value, RawTag, TagMap,
        MAX_TAGS, MAX_TAG_KEY_LEN, MAX_TAG_VALUE_LEN,
    },
};

/// Licmeter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key of the bucket that receives every contribution
pub const ALL_BUCKET: &str = "all";

/// One hour in milliseconds
pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// One day in milliseconds
pub const DAY_MS: i64 = 24 * HOUR_MS;
