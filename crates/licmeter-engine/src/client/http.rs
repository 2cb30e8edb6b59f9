//! reqwest implementation of the tenant API

use super::retry::{Attempt, RetryPolicy};
use super::{EntityPage, EntityQuery, MetricResponse, TenantApi, ZoneSummary};
use crate::config::MeterConfig;
use crate::telemetry::EngineMetrics;
use crate::{ENTITY_ENDPOINT, METRIC_ENDPOINT, METRIC_INGEST_ENDPOINT, ZONE_ENDPOINT};

use async_trait::async_trait;
use licmeter_common::{ApiError, MeterError, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Tenant API over HTTPS
#[derive(Clone)]
pub struct HttpTenantApi {
    inner: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    metrics: Arc<EngineMetrics>,
}

#[derive(Deserialize)]
struct ZoneListing {
    #[serde(default)]
    values: Vec<ZoneSummary>,
}

impl HttpTenantApi {
    pub fn new(config: &MeterConfig, metrics: Arc<EngineMetrics>) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{} {}-{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH,
            ))
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MeterError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner,
            base_url: config.tenant_url.clone(),
            token: config.api_token.clone(),
            retry: config.retry.clone(),
            metrics,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, backing off on 429 and failing on any other non-2xx
    async fn execute<F>(&self, url: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        let token = format!("Api-Token {}", self.token);
        let token = token.as_str();
        let metrics = self.metrics.as_ref();

        self.retry
            .run(url, move || async move {
                let response = build()
                    .header(AUTHORIZATION, token)
                    .send()
                    .await
                    .map_err(|e| MeterError::Network(e.to_string()))?;

                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    metrics.rate_limited_responses.inc();
                    let retry_after = response.headers().get(RETRY_AFTER).and_then(parse_retry_after);
                    return Ok(Attempt::RateLimited { retry_after });
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                        body,
                    }
                    .into());
                }
                Ok::<_, MeterError>(Attempt::Done(response))
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.execute(url, || self.inner.get(url).query(query)).await?;
        response.json::<T>().await.map_err(|e| {
            MeterError::from(ApiError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
    }
}

fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    value
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl TenantApi for HttpTenantApi {
    #[instrument(skip(self), fields(entity_type = %query.entity_type))]
    async fn fetch_entities(&self, query: &EntityQuery) -> Result<EntityPage> {
        let url = self.url(ENTITY_ENDPOINT);
        let mut params = vec![
            ("entitySelector", query.selector()),
            ("from", query.from.clone()),
            ("fields", query.fields.clone()),
            ("pageSize", query.page_size.to_string()),
        ];
        if let Some(to) = &query.to {
            params.push(("to", to.clone()));
        }
        self.get_json(&url, &params).await
    }

    async fn fetch_entity_page(&self, next_page_key: &str) -> Result<EntityPage> {
        let url = self.url(ENTITY_ENDPOINT);
        self.get_json(&url, &[("nextPageKey", next_page_key.to_string())])
            .await
    }

    #[instrument(skip(self))]
    async fn query_metric(
        &self,
        selector: &str,
        from_millis: i64,
        to_millis: i64,
    ) -> Result<MetricResponse> {
        let url = self.url(METRIC_ENDPOINT);
        let params = [
            ("metricSelector", selector.to_string()),
            ("from", from_millis.to_string()),
            ("to", to_millis.to_string()),
        ];
        self.get_json(&url, &params).await
    }

    async fn ingest(&self, payload: String) -> Result<()> {
        let url = self.url(METRIC_INGEST_ENDPOINT);
        let response = self
            .execute(&url, || {
                self.inner
                    .post(&url)
                    .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(payload.clone())
            })
            .await?;
        let body = response.text().await.unwrap_or_default();
        info!(response = %body, "Metric ingest accepted");
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<ZoneSummary>> {
        let url = self.url(ZONE_ENDPOINT);
        let listing: ZoneListing = self.get_json(&url, &[]).await?;
        debug!(count = listing.values.len(), "Listed management zones");
        Ok(listing.values)
    }

    async fn get_zone(&self, id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.url(ZONE_ENDPOINT), id);
        self.get_json(&url, &[]).await
    }

    async fn put_zone(&self, id: &str, document: &serde_json::Value) -> Result<()> {
        let url = format!("{}/{}", self.url(ZONE_ENDPOINT), id);
        self.execute(&url, || self.inner.put(&url).json(document))
            .await?;
        Ok(())
    }
}

// Ensure that client is Send + Sync. Compiler will fail if it's not.
const _: () = {
    const fn assert_send<T: Send + Sync>() {}
    assert_send::<HttpTenantApi>();
};
