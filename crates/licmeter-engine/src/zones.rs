//! Management zone rule sync
//!
//! Each management zone needs a dimensional rule matching
//! `management_zone=<zone name>` so dashboards can filter the DEM and DDU
//! metrics by zone. Zones missing the rule get it appended. Zones are updated
//! concurrently, bounded by a semaphore. Concurrent edits of the same zone
//! by someone else are not detected.

use crate::client::{TenantApi, ZoneSummary};
use crate::telemetry::EngineMetrics;
use licmeter_common::{ApiError, MeterError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

const RULES_FIELD: &str = "dimensionalRules";

/// Dashboard filter rule for one zone
pub fn dimensional_rule(zone_name: &str) -> Value {
    json!({
        "enabled": true,
        "appliesTo": "METRIC",
        "conditions": [{
            "conditionType": "DIMENSION",
            "ruleMatcher": "EQUALS",
            "key": "management_zone",
            "value": zone_name,
        }]
    })
}

/// Append the zone's rule to `document` unless present; returns whether it
/// was appended
pub fn ensure_rule(zone: &ZoneSummary, document: &mut Value) -> Result<bool> {
    let rule = dimensional_rule(&zone.name);
    let object = document.as_object_mut().ok_or_else(|| {
        MeterError::from(ApiError::Malformed {
            url: format!("managementZones/{}", zone.id),
            reason: "zone document is not an object".to_string(),
        })
    })?;

    let rules = object
        .entry(RULES_FIELD)
        .or_insert_with(|| Value::Array(Vec::new()));
    if rules.is_null() {
        *rules = Value::Array(Vec::new());
    }
    let rules = rules.as_array_mut().ok_or_else(|| {
        MeterError::from(ApiError::Malformed {
            url: format!("managementZones/{}", zone.id),
            reason: format!("{} is not a list", RULES_FIELD),
        })
    })?;

    if rules.contains(&rule) {
        return Ok(false);
    }
    rules.push(rule);
    Ok(true)
}

/// Outcome of one zone sync
#[derive(Debug, Default)]
pub struct ZoneSyncReport {
    /// Zones that received the rule
    pub added: Vec<String>,
    /// Zones that already had it
    pub unchanged: usize,
    /// Zones that could not be checked or updated
    pub failed: Vec<(String, MeterError)>,
}

impl ZoneSyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn sync_zone(api: Arc<dyn TenantApi>, zone: ZoneSummary) -> Result<bool> {
    let mut document = api.get_zone(&zone.id).await?;
    if !ensure_rule(&zone, &mut document)? {
        return Ok(false);
    }
    api.put_zone(&zone.id, &document).await?;
    info!(zone = %zone.name, "Pushed management zone rule");
    Ok(true)
}

/// Make sure every zone carries its rule.
///
/// Listing failures abort the sync; failures on single zones are returned
/// in the report.
#[instrument(skip_all, fields(concurrency = concurrency))]
pub async fn sync_zone_rules(
    api: Arc<dyn TenantApi>,
    metrics: &EngineMetrics,
    concurrency: usize,
) -> Result<ZoneSyncReport> {
    let zones = api.list_zones().await?;
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(zones.len());

    for zone in zones {
        let api = api.clone();
        let semaphore = semaphore.clone();
        let name = zone.name.clone();
        let handle = tokio::spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => sync_zone(api, zone).await,
                Err(e) => Err(MeterError::Internal(e.to_string())),
            }
        });
        tasks.push((name, handle));
    }

    let mut report = ZoneSyncReport::default();
    for (name, handle) in tasks {
        match handle.await {
            Ok(Ok(true)) => {
                metrics.zone_rules_added.inc();
                report.added.push(name);
            }
            Ok(Ok(false)) => report.unchanged += 1,
            Ok(Err(e)) => {
                warn!(zone = %name, error = %e, "Failed to sync management zone rule");
                report.failed.push((name, e));
            }
            Err(e) => {
                warn!(zone = %name, error = %e, "Zone sync task failed");
                report.failed.push((name, MeterError::Internal(e.to_string())));
            }
        }
    }

    report.added.sort();
    info!(
        added = report.added.len(),
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "Management zone rules checked"
    );
    Ok(report)
}
