//! Per-host running tally for the current billing window

use super::attribution::{EntityAttribution, ManagementZone};
use super::tags::TagMap;
use serde::{Deserialize, Serialize};

/// Sightings needed within one window before host unit hours are billed
pub const HOST_UNIT_HOURS_MIN_SIGHTINGS: u32 = 5;

/// Running tally for one host, keyed by host id in the snapshot
///
/// Field names match the snapshot file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Sightings in the current window
    #[serde(default)]
    pub seen: u32,
    /// Host units from the latest sighting
    #[serde(default)]
    pub hu: f64,
    /// Sanitized tags from the latest sighting
    #[serde(default)]
    pub tags: TagMap,
    /// Management zones from the latest sighting
    #[serde(default)]
    pub mz: Vec<ManagementZone>,
    /// Display name from the latest sighting
    #[serde(default)]
    pub name: String,
}

impl HostRecord {
    /// Record one more sighting and refresh everything else
    pub fn observe(&mut self, hu: f64, tags: TagMap, zones: Vec<ManagementZone>, name: String) {
        self.seen += 1;
        self.hu = hu;
        self.tags = tags;
        self.mz = zones;
        self.name = name;
    }

    /// Whether this host has been seen often enough to bill unit hours
    pub fn bills_unit_hours(&self) -> bool {
        self.seen >= HOST_UNIT_HOURS_MIN_SIGHTINGS
    }

    /// Attribution view used when host consumption is attributed elsewhere
    pub fn attribution(&self) -> EntityAttribution {
        EntityAttribution {
            name: self.name.clone(),
            tags: self.tags.clone(),
            zones: self.mz.clone(),
        }
    }
}
