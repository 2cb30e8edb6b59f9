//! Attribution records
//!
//! An attribution tells which management zones, tags, and display name a
//! monitored entity reports under.

use super::tags::{escape_quotes, TagMap};
use serde::{Deserialize, Deserializer, Serialize};

/// Zone name used when a zone reference carries no name
pub const UNDEFINED_ZONE: &str = "Undefined";

/// Reference to a management zone
///
/// The inventory API returns `{id, name}` objects; older snapshots may hold
/// bare names, so both shapes are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagementZone {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ManagementZone {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
        }
    }

    /// Zone name ready to be used as a dimension value
    pub fn dimension_name(&self) -> String {
        escape_quotes(self.name.as_deref().unwrap_or(UNDEFINED_ZONE))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ZoneRepr {
    Name(String),
    Object {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl<'de> Deserialize<'de> for ManagementZone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ZoneRepr::deserialize(deserializer)? {
            ZoneRepr::Name(name) => ManagementZone {
                id: None,
                name: Some(name),
            },
            ZoneRepr::Object { id, name } => ManagementZone { id, name },
        })
    }
}

/// Resolved attribution for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttribution {
    /// Display name
    pub name: String,
    /// Sanitized tags
    pub tags: TagMap,
    /// Zones the entity's consumption is reported under
    pub zones: Vec<ManagementZone>,
}

impl EntityAttribution {
    /// Escaped names of every zone, one per zone reference
    pub fn zone_names(&self) -> Vec<String> {
        self.zones.iter().map(ManagementZone::dimension_name).collect()
    }
}

/// Type prefix of an entity id (`HOST-0123` is a `HOST`)
pub fn entity_type_of(entity_id: &str) -> &str {
    entity_id.split('-').next().unwrap_or(entity_id)
}
