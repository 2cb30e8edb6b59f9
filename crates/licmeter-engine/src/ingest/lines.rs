//! Metric line rendering
//!
//! Formats consumption totals as ingestion protocol lines. Rendering never
//! fails: names and tags are already escaped, and absent values fall back to
//! their keys.

use crate::directory::EntityDirectory;
use crate::metering::ConsumptionMap;
use crate::TAG_BUDGET_CHARS;
use licmeter_common::{escape_quotes, HostRecord, TagMap};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::info;

/// Tag dimensions, appended while the rendered string is under budget
pub fn render_tags(tags: &TagMap) -> String {
    let mut rendered = String::new();
    for (key, value) in tags {
        if rendered.len() >= TAG_BUDGET_CHARS {
            break;
        }
        let _ = write!(rendered, ",{}=\"{}\"", key, value);
    }
    rendered
}

/// Host unit lines, plus unit hour lines for hosts seen often enough
pub fn host_unit_lines(hosts: &BTreeMap<String, HostRecord>) -> Vec<String> {
    host_unit_groups(hosts).into_iter().flatten().collect()
}

/// Host unit lines grouped per host, so a host's pair can share a request
pub fn host_unit_groups(hosts: &BTreeMap<String, HostRecord>) -> Vec<Vec<String>> {
    let mut groups = Vec::with_capacity(hosts.len());
    for (host_id, record) in hosts {
        let tags = render_tags(&record.tags);
        let mut group = vec![format!(
            "consumption.hostUnit,dt.entity.host={}{} {}",
            host_id, tags, record.hu
        )];
        if record.bills_unit_hours() {
            group.push(format!(
                "consumption.hostUnitHours,dt.entity.host={}{} {}",
                host_id, tags, record.hu
            ));
        } else {
            info!(host = %host_id, seen = record.seen, "Not reporting host unit hours, seen too few times");
        }
        groups.push(group);
    }
    groups
}

/// DEM lines for one family, e.g. `consumption.DEM.RUM` keyed by `application`
pub fn dem_lines(
    metric: &str,
    dimension: &str,
    consumption: &ConsumptionMap,
    directory: &EntityDirectory,
) -> Vec<String> {
    consumption
        .iter()
        .map(|(key, value)| match directory.get(key) {
            Some(attribution) => format!(
                "{},{}=\"{}\"{} {}",
                metric,
                dimension,
                escape_quotes(&attribution.name),
                render_tags(&attribution.tags),
                value
            ),
            None => format!("{},{}=\"{}\" {}", metric, dimension, key, value),
        })
        .collect()
}

/// DDU lines, one per zone name (keys are already escaped)
pub fn ddu_lines(consumption: &ConsumptionMap) -> Vec<String> {
    consumption
        .iter()
        .map(|(zone, value)| format!("consumption.DDU,management_zone=\"{}\" {}", zone, value))
        .collect()
}
