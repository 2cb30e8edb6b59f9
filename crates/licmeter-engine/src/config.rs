//! Licmeter configuration

use licmeter_common::{MeterError, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::RetryPolicy;

/// Metering engine configuration
#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// API token with entity read, metric read/ingest and zone config scopes
    pub api_token: String,
    /// Tenant base URL, without trailing slash
    pub tenant_url: String,
    /// Name of the monitored endpoint, used to derive the snapshot file name
    pub endpoint_name: String,
    /// Directory holding the snapshot file
    pub cache_dir: PathBuf,
    /// Which consumption families run
    pub families: ConsumptionFamilies,
    /// Verify the tenant's TLS certificate
    pub verify_tls: bool,
    /// Time after tick start during which new entity types may be fetched
    pub attribution_budget: Duration,
    /// Rate-limit retry policy
    pub retry: RetryPolicy,
    /// Zone rule updates allowed in flight at once
    pub zone_sync_concurrency: usize,
}

/// Feature toggles for the three consumption families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionFamilies {
    /// Host units and host unit hours
    pub host_units: bool,
    /// DDU per management zone (plus zone rule sync)
    pub zone_usage: bool,
    /// DEM per application and synthetic test
    pub application_usage: bool,
}

impl Default for ConsumptionFamilies {
    fn default() -> Self {
        Self {
            host_units: true,
            zone_usage: true,
            application_usage: true,
        }
    }
}

impl MeterConfig {
    /// Build a config with defaults for everything but credentials and target
    pub fn new(api_token: impl Into<String>, tenant_url: &str, endpoint_name: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(MeterError::Config("Please enter a valid API token".into()));
        }
        let tenant_url = tenant_url.trim().trim_end_matches('/').to_string();
        if tenant_url.is_empty() {
            return Err(MeterError::Config("tenant URL is required".into()));
        }

        Ok(Self {
            api_token,
            tenant_url,
            endpoint_name: endpoint_name.into(),
            cache_dir: std::env::temp_dir(),
            families: ConsumptionFamilies::default(),
            verify_tls: true,
            attribution_budget: Duration::from_millis(crate::ATTRIBUTION_BUDGET_MS),
            retry: RetryPolicy::default(),
            zone_sync_concurrency: crate::ZONE_SYNC_CONCURRENCY,
        })
    }

    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let token = std::env::var("LICMETER_API_TOKEN").unwrap_or_default();
        let tenant = std::env::var("LICMETER_TENANT_URL")
            .map_err(|_| MeterError::Config("LICMETER_TENANT_URL is not set".into()))?;
        let endpoint =
            std::env::var("LICMETER_ENDPOINT_NAME").unwrap_or_else(|_| "licmeter".to_string());

        let mut cfg = Self::new(token, &tenant, endpoint)?;

        if let Ok(dir) = std::env::var("LICMETER_CACHE_DIR") {
            cfg.cache_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_flag("LICMETER_GET_HU") {
            cfg.families.host_units = v;
        }
        if let Some(v) = env_flag("LICMETER_GET_DDU") {
            cfg.families.zone_usage = v;
        }
        if let Some(v) = env_flag("LICMETER_GET_DEM") {
            cfg.families.application_usage = v;
        }
        if let Some(v) = env_flag("LICMETER_VERIFY_TLS") {
            cfg.verify_tls = v;
        }
        if let Ok(val) = std::env::var("LICMETER_RETRY_MAX") {
            if let Ok(v) = val.parse() {
                cfg.retry.max_retries = v;
            }
        }

        Ok(cfg)
    }

    /// Snapshot file for this endpoint: word characters of the name plus `.dt`
    pub fn cache_path(&self) -> PathBuf {
        let stem: String = self
            .endpoint_name
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        self.cache_dir.join(format!("{stem}.dt"))
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    parse_flag(&raw)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
