//! Consumption aggregation
//!
//! Folds weighted billing metrics into per-key totals. Every contribution
//! lands in the `all` bucket; a keyed bucket only receives contributions
//! whose key is a known entity.

use super::signals::{Signal, DDU_METRIC, DEM_ENTITY_TYPES, RUM_SIGNALS, SYNTHETIC_SIGNALS};
use crate::client::{MetricResponse, TenantApi};
use crate::directory::EntityDirectory;
use crate::window::WindowPlan;
use licmeter_common::{entity_type_of, HostRecord, Result, ALL_BUCKET};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Accumulated consumption by key (app id, test id, zone name, or `all`)
pub type ConsumptionMap = BTreeMap<String, f64>;

const BILLED: &str = "Billed";
const UNBILLED: &str = "Unbilled";

/// DEM consumption of one window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemConsumption {
    pub rum: ConsumptionMap,
    pub synthetic: ConsumptionMap,
}

fn add(target: &mut ConsumptionMap, key: &str, value: f64) {
    *target.entry(key.to_string()).or_insert(0.0) += value;
}

/// Add one weighted metric answer to `target`.
///
/// Datapoints tagged `Unbilled` are ignored. The key is the first dimension
/// other than `Billed`.
pub fn accumulate(
    target: &mut ConsumptionMap,
    directory: &EntityDirectory,
    response: &MetricResponse,
    weight: f64,
) {
    for point in response.result.iter().flat_map(|series| series.data.iter()) {
        if point.dimensions.iter().any(|d| d == UNBILLED) {
            continue;
        }
        let consumption = point.total() * weight;
        add(target, ALL_BUCKET, consumption);

        let key = point.dimensions.iter().find(|d| d.as_str() != BILLED);
        if let Some(key) = key.filter(|k| directory.contains(k)) {
            add(target, key, consumption);
        }
    }
}

async fn accumulate_signals(
    api: &dyn TenantApi,
    directory: &EntityDirectory,
    signals: &[Signal],
    (from, to): (i64, i64),
) -> Result<ConsumptionMap> {
    let mut consumption = ConsumptionMap::new();
    for signal in signals {
        let response = api.query_metric(signal.metric, from, to).await?;
        accumulate(&mut consumption, directory, &response, signal.weight);
    }
    Ok(consumption)
}

/// Resolve DEM entities and sum RUM and synthetic units over the DEM window
#[instrument(skip_all, fields(from = plan.dem_window().0, to = plan.dem_window().1))]
pub async fn dem_consumption(
    api: &dyn TenantApi,
    directory: &mut EntityDirectory,
    plan: &WindowPlan,
) -> Result<DemConsumption> {
    for entity_type in DEM_ENTITY_TYPES {
        directory.resolve(api, entity_type).await?;
    }

    let window = plan.dem_window();
    let rum = accumulate_signals(api, directory, RUM_SIGNALS, window).await?;
    let synthetic = accumulate_signals(api, directory, SYNTHETIC_SIGNALS, window).await?;
    debug!(rum = rum.len(), synthetic = synthetic.len(), "Aggregated DEM consumption");

    Ok(DemConsumption { rum, synthetic })
}

/// Sum DDU by management zone over the DDU window.
///
/// Entities not yet in the directory are resolved: hosts from the closed
/// window's tallies, everything else by fetching its type.
#[instrument(skip_all, fields(from = plan.ddu_window().0, to = plan.ddu_window().1))]
pub async fn ddu_consumption(
    api: &dyn TenantApi,
    directory: &mut EntityDirectory,
    hosts: &BTreeMap<String, HostRecord>,
    plan: &WindowPlan,
) -> Result<ConsumptionMap> {
    let (from, to) = plan.ddu_window();
    let response = api.query_metric(DDU_METRIC, from, to).await?;

    let mut consumption = ConsumptionMap::new();
    for point in response.result.iter().flat_map(|series| series.data.iter()) {
        let entity_id = match point.dimensions.first().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => continue,
        };
        let value = point.total();
        add(&mut consumption, ALL_BUCKET, value);

        if !directory.contains(entity_id) {
            let entity_type = entity_type_of(entity_id);
            if entity_type == "HOST" {
                if let Some(record) = hosts.get(entity_id) {
                    directory.adopt_host(entity_id, record);
                }
            } else {
                directory.resolve(api, entity_type).await?;
            }
        }

        if let Some(attribution) = directory.get(entity_id) {
            for zone in attribution.zone_names() {
                add(&mut consumption, &zone, value);
            }
        }
    }

    debug!(zones = consumption.len(), "Aggregated DDU consumption");
    Ok(consumption)
}
