//! In-memory tenant for unit tests

use crate::client::{
    EntityPage, EntityQuery, MetricDatapoint, MetricResponse, MetricSeries, RawEntity, TenantApi,
    ZoneSummary,
};
use async_trait::async_trait;
use licmeter_common::{ApiError, Result};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    pages: HashMap<String, Vec<Vec<RawEntity>>>,
    metrics: HashMap<String, MetricResponse>,
    zones: Vec<ZoneSummary>,
    zone_docs: HashMap<String, serde_json::Value>,
    entity_queries: Vec<EntityQuery>,
    metric_queries: Vec<(String, i64, i64)>,
    ingested: Vec<String>,
    page_requests: usize,
    puts: usize,
    ingest_status: Option<u16>,
    failing_zones: Vec<String>,
    panicking_zones: Vec<String>,
}

/// Tenant fake recording every call
#[derive(Default)]
pub struct MemoryTenant {
    state: Mutex<State>,
}

impl MemoryTenant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entities(&self, entity_type: &str, entities: Vec<RawEntity>) {
        self.add_entity_pages(entity_type, vec![entities]);
    }

    pub fn add_entity_pages(&self, entity_type: &str, pages: Vec<Vec<RawEntity>>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(entity_type.to_string(), pages);
    }

    pub fn set_metric(&self, selector: &str, points: Vec<(Vec<&str>, Vec<Option<f64>>)>) {
        let data = points
            .into_iter()
            .map(|(dimensions, values)| MetricDatapoint {
                dimensions: dimensions.into_iter().map(String::from).collect(),
                values,
            })
            .collect();
        self.state.lock().unwrap().metrics.insert(
            selector.to_string(),
            MetricResponse {
                result: vec![MetricSeries { data }],
            },
        );
    }

    pub fn add_zone(&self, id: &str, name: &str, document: serde_json::Value) {
        let mut state = self.state.lock().unwrap();
        state.zones.push(ZoneSummary {
            id: id.to_string(),
            name: name.to_string(),
        });
        state.zone_docs.insert(id.to_string(), document);
    }

    pub fn fail_zone(&self, id: &str) {
        self.state.lock().unwrap().failing_zones.push(id.to_string());
    }

    /// Make reads of zone `id` panic, as a crashed task would
    pub fn panic_on_zone(&self, id: &str) {
        self.state.lock().unwrap().panicking_zones.push(id.to_string());
    }

    pub fn fail_ingest(&self, status: u16) {
        self.state.lock().unwrap().ingest_status = Some(status);
    }

    pub fn zone_document(&self, id: &str) -> Option<serde_json::Value> {
        self.state.lock().unwrap().zone_docs.get(id).cloned()
    }

    pub fn ingested(&self) -> Vec<String> {
        self.state.lock().unwrap().ingested.clone()
    }

    /// Every ingested line, in send order
    pub fn ingested_lines(&self) -> Vec<String> {
        self.ingested()
            .iter()
            .flat_map(|payload| payload.lines().map(String::from).collect::<Vec<_>>())
            .collect()
    }

    pub fn entity_queries(&self) -> Vec<EntityQuery> {
        self.state.lock().unwrap().entity_queries.clone()
    }

    pub fn fetched_types(&self) -> Vec<String> {
        self.entity_queries()
            .into_iter()
            .map(|q| q.entity_type)
            .collect()
    }

    pub fn metric_queries(&self) -> Vec<(String, i64, i64)> {
        self.state.lock().unwrap().metric_queries.clone()
    }

    pub fn page_requests(&self) -> usize {
        self.state.lock().unwrap().page_requests
    }

    pub fn put_count(&self) -> usize {
        self.state.lock().unwrap().puts
    }

    fn page(state: &State, entity_type: &str, index: usize) -> EntityPage {
        let pages = match state.pages.get(entity_type) {
            Some(pages) => pages,
            None => return EntityPage::default(),
        };
        EntityPage {
            entities: pages.get(index).cloned().unwrap_or_default(),
            next_page_key: (index + 1 < pages.len()).then(|| format!("{}#{}", entity_type, index + 1)),
        }
    }
}

#[async_trait]
impl TenantApi for MemoryTenant {
    async fn fetch_entities(&self, query: &EntityQuery) -> Result<EntityPage> {
        let mut state = self.state.lock().unwrap();
        state.entity_queries.push(query.clone());
        state.page_requests += 1;
        Ok(Self::page(&state, &query.entity_type, 0))
    }

    async fn fetch_entity_page(&self, next_page_key: &str) -> Result<EntityPage> {
        let mut state = self.state.lock().unwrap();
        state.page_requests += 1;
        let (entity_type, index) = next_page_key.split_once('#').unwrap();
        Ok(Self::page(&state, entity_type, index.parse().unwrap()))
    }

    async fn query_metric(
        &self,
        selector: &str,
        from_millis: i64,
        to_millis: i64,
    ) -> Result<MetricResponse> {
        let mut state = self.state.lock().unwrap();
        state
            .metric_queries
            .push((selector.to_string(), from_millis, to_millis));
        Ok(state.metrics.get(selector).cloned().unwrap_or_default())
    }

    async fn ingest(&self, payload: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.ingest_status {
            return Err(ApiError::Status {
                status,
                url: "memory://ingest".into(),
                body: "rejected".into(),
            }
            .into());
        }
        state.ingested.push(payload);
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<ZoneSummary>> {
        Ok(self.state.lock().unwrap().zones.clone())
    }

    async fn get_zone(&self, id: &str) -> Result<serde_json::Value> {
        let panics = self.state.lock().unwrap().panicking_zones.iter().any(|z| z == id);
        if panics {
            panic!("zone {} unreadable", id);
        }
        let state = self.state.lock().unwrap();
        if state.failing_zones.iter().any(|z| z == id) {
            return Err(ApiError::Status {
                status: 404,
                url: format!("memory://zones/{}", id),
                body: "gone".into(),
            }
            .into());
        }
        Ok(state.zone_docs.get(id).cloned().unwrap_or_default())
    }

    async fn put_zone(&self, id: &str, document: &serde_json::Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.puts += 1;
        state.zone_docs.insert(id.to_string(), document.clone());
        Ok(())
    }
}

/// Inventory record with the fields most tests need
pub fn entity(id: &str, name: &str, zones: &[(&str, &str)], tags: &[(&str, &str)]) -> RawEntity {
    RawEntity {
        entity_id: id.to_string(),
        display_name: name.to_string(),
        tags: tags
            .iter()
            .map(|(k, v)| licmeter_common::RawTag::new(*k, *v))
            .collect(),
        management_zones: zones
            .iter()
            .map(|(id, name)| licmeter_common::ManagementZone::named(*id, *name))
            .collect(),
        ..Default::default()
    }
}
