//! Host sightings
//!
//! Each tick lists the hosts reported in a one minute frame and counts one
//! sighting for every host that costs host units.

use crate::client::{fetch_all_entities, EntityQuery, RawEntity, TenantApi};
use crate::pricing::{host_memory_bytes, host_units, MonitoringMode};
use licmeter_common::{collect_tags, HostRecord, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const HOST_FIELDS: &str = "+properties.memoryTotal,+properties.paasMemoryLimit,+properties.monitoringMode,+tags,+managementZones";

/// Hosts reported between six and five minutes ago
pub fn host_query() -> EntityQuery {
    EntityQuery {
        entity_type: "HOST".to_string(),
        from: "now-6m".to_string(),
        to: Some("now-5m".to_string()),
        fields: HOST_FIELDS.to_string(),
        page_size: 1000,
    }
}

/// Host units of one inventory record
pub fn units_of(host: &RawEntity) -> f64 {
    let props = &host.properties;
    let memory = host_memory_bytes(props.memory_total, props.paas_memory_limit);
    host_units(memory, MonitoringMode::from_inventory(props.monitoring_mode.as_deref()))
}

/// Count one sighting per billable host; returns how many were recorded
pub fn record_sightings(hosts: &mut BTreeMap<String, HostRecord>, listed: Vec<RawEntity>) -> usize {
    let mut recorded = 0;
    for host in listed {
        let units = units_of(&host);
        if units <= 0.0 || host.entity_id.is_empty() {
            continue;
        }
        let tags = collect_tags(host.tags.iter());
        hosts
            .entry(host.entity_id)
            .or_default()
            .observe(units, tags, host.management_zones, host.display_name);
        recorded += 1;
    }
    recorded
}

/// List current hosts and add their sightings to `hosts`
#[instrument(skip_all)]
pub async fn observe_hosts(api: &dyn TenantApi, hosts: &mut BTreeMap<String, HostRecord>) -> Result<usize> {
    let listed = fetch_all_entities(api, &host_query()).await?;
    info!(count = listed.len(), "Found hosts");
    let recorded = record_sightings(hosts, listed);
    debug!(recorded, tracked = hosts.len(), "Recorded host sightings");
    Ok(recorded)
}
