//! Prometheus counters for the metering engine

use licmeter_common::{MeterError, Result};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Counters describing what one engine has sent and how often it was throttled
pub struct EngineMetrics {
    pub lines_ingested: IntCounterVec,
    pub batches_sent: IntCounterVec,
    pub rate_limited_responses: IntCounter,
    pub zone_rules_added: IntCounter,
    pub ticks_total: IntCounterVec,
    registry: Registry,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Self {
            lines_ingested: IntCounterVec::new(
                Opts::new("licmeter_lines_ingested_total", "Metric lines sent, by stream"),
                &["stream"],
            )
            .map_err(metric_error)?,
            batches_sent: IntCounterVec::new(
                Opts::new("licmeter_batches_sent_total", "Ingest requests sent, by stream"),
                &["stream"],
            )
            .map_err(metric_error)?,
            rate_limited_responses: IntCounter::new(
                "licmeter_rate_limited_responses_total",
                "Responses answered with HTTP 429",
            )
            .map_err(metric_error)?,
            zone_rules_added: IntCounter::new(
                "licmeter_zone_rules_added_total",
                "Dimensional rules appended to management zones",
            )
            .map_err(metric_error)?,
            ticks_total: IntCounterVec::new(
                Opts::new("licmeter_ticks_total", "Completed ticks, by kind"),
                &["kind"],
            )
            .map_err(metric_error)?,
            registry: Registry::new(),
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> Result<()> {
        self.registry
            .register(Box::new(self.lines_ingested.clone()))
            .map_err(metric_error)?;
        self.registry
            .register(Box::new(self.batches_sent.clone()))
            .map_err(metric_error)?;
        self.registry
            .register(Box::new(self.rate_limited_responses.clone()))
            .map_err(metric_error)?;
        self.registry
            .register(Box::new(self.zone_rules_added.clone()))
            .map_err(metric_error)?;
        self.registry
            .register(Box::new(self.ticks_total.clone()))
            .map_err(metric_error)?;
        Ok(())
    }

    /// Registry holding every counter of this engine
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn metric_error(err: prometheus::Error) -> MeterError {
    MeterError::Internal(format!("metric registration failed: {}", err))
}
