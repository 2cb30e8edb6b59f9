//! Tenant API client
//!
//! Provides the boundary to the monitoring tenant:
//! - TenantApi: typed inventory, metric, ingestion, and zone config calls
//! - HttpTenantApi: reqwest implementation with rate-limit backoff
//! - RetryPolicy: bounded exponential backoff for 429 answers

pub mod http;
pub mod retry;

pub use http::HttpTenantApi;
pub use retry::{Attempt, RetryPolicy};

use async_trait::async_trait;
use licmeter_common::{ManagementZone, RawTag, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Inventory request for one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    /// Entity type, e.g. `HOST` or `EBS_VOLUME`
    pub entity_type: String,
    /// Start of the time frame (`now-6m` or epoch millis)
    pub from: String,
    /// End of the time frame, open-ended when absent
    pub to: Option<String>,
    /// Comma separated extra fields
    pub fields: String,
    /// Entities per page
    pub page_size: u32,
}

impl EntityQuery {
    /// Selector string for the `entitySelector` parameter
    pub fn selector(&self) -> String {
        format!("type(\"{}\")", self.entity_type)
    }
}

/// One page of inventory results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPage {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_key: Option<String>,
}

/// Entity as returned by the inventory API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub tags: Vec<RawTag>,
    #[serde(default)]
    pub management_zones: Vec<ManagementZone>,
    #[serde(default)]
    pub properties: HostProperties,
    #[serde(default)]
    pub to_relationships: Relationships,
    #[serde(default)]
    pub from_relationships: Relationships,
}

/// Relationship name to related entities
pub type Relationships = BTreeMap<String, Vec<EntityRef>>;

/// Reference to a related entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// Host sizing properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostProperties {
    /// Physical memory in bytes
    #[serde(default)]
    pub memory_total: Option<f64>,
    /// Container memory limit in MiB, overrides `memory_total`
    #[serde(default)]
    pub paas_memory_limit: Option<f64>,
    /// `FULL_STACK`, `INFRA_ONLY` or `INFRASTRUCTURE`
    #[serde(default)]
    pub monitoring_mode: Option<String>,
}

/// Metric query answer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricResponse {
    #[serde(default)]
    pub result: Vec<MetricSeries>,
}

/// Series of one metric selector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSeries {
    #[serde(default)]
    pub data: Vec<MetricDatapoint>,
}

/// Values of one dimension tuple
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricDatapoint {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

impl MetricDatapoint {
    /// Sum of the non-null samples
    pub fn total(&self) -> f64 {
        self.values.iter().flatten().sum()
    }
}

/// Zone listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub id: String,
    pub name: String,
}

/// Typed access to the tenant
#[async_trait]
pub trait TenantApi: Send + Sync {
    /// First inventory page for a query
    async fn fetch_entities(&self, query: &EntityQuery) -> Result<EntityPage>;

    /// Follow-up inventory page
    async fn fetch_entity_page(&self, next_page_key: &str) -> Result<EntityPage>;

    /// Query one metric selector over `[from_millis, to_millis]`
    async fn query_metric(&self, selector: &str, from_millis: i64, to_millis: i64)
        -> Result<MetricResponse>;

    /// Send one line-protocol payload
    async fn ingest(&self, payload: String) -> Result<()>;

    /// List every management zone
    async fn list_zones(&self) -> Result<Vec<ZoneSummary>>;

    /// Fetch a zone's full configuration document
    async fn get_zone(&self, id: &str) -> Result<serde_json::Value>;

    /// Replace a zone's configuration document
    async fn put_zone(&self, id: &str, document: &serde_json::Value) -> Result<()>;
}

/// Fetch every page of an inventory query
pub async fn fetch_all_entities(api: &dyn TenantApi, query: &EntityQuery) -> Result<Vec<RawEntity>> {
    let mut page = api.fetch_entities(query).await?;
    let mut entities = std::mem::take(&mut page.entities);

    while let Some(key) = page.next_page_key.take().filter(|k| !k.is_empty()) {
        page = api.fetch_entity_page(&key).await?;
        debug!(
            entity_type = %query.entity_type,
            count = page.entities.len(),
            "Fetched another inventory page"
        );
        entities.append(&mut page.entities);
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTenant;

    #[test]
    fn test_entity_page_shape() {
        let json = r#"{
            "entities": [{
                "entityId": "HOST-1",
                "displayName": "web-1",
                "tags": [{"key": "env", "value": "prod"}, {"key": "bare"}],
                "managementZones": [{"id": "9", "name": "Prod"}],
                "properties": {"memoryTotal": 17179869184, "monitoringMode": "FULL_STACK"}
            }],
            "nextPageKey": "abc"
        }"#;
        let page: EntityPage = serde_json::from_str(json).unwrap();
        let host = &page.entities[0];
        assert_eq!(host.entity_id, "HOST-1");
        assert_eq!(host.tags[1].value, None);
        assert_eq!(host.properties.memory_total, Some(17179869184.0));
        assert_eq!(page.next_page_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_datapoint_total_skips_nulls() {
        let point: MetricDatapoint =
            serde_json::from_str(r#"{"dimensions": ["APPLICATION-1"], "values": [1.5, null, 2.5]}"#)
                .unwrap();
        assert_eq!(point.total(), 4.0);
    }

    #[tokio::test]
    async fn test_fetch_all_follows_continuation() {
        let tenant = MemoryTenant::new();
        tenant.add_entity_pages(
            "APPLICATION",
            vec![
                vec![RawEntity {
                    entity_id: "APPLICATION-1".into(),
                    ..Default::default()
                }],
                vec![RawEntity {
                    entity_id: "APPLICATION-2".into(),
                    ..Default::default()
                }],
                vec![RawEntity {
                    entity_id: "APPLICATION-3".into(),
                    ..Default::default()
                }],
            ],
        );

        let query = EntityQuery {
            entity_type: "APPLICATION".into(),
            from: "0".into(),
            to: None,
            fields: "tags".into(),
            page_size: 4000,
        };
        let entities = fetch_all_entities(&tenant, &query).await.unwrap();
        let ids: Vec<_> = entities.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["APPLICATION-1", "APPLICATION-2", "APPLICATION-3"]);
        assert_eq!(tenant.page_requests(), 3);
    }
}
