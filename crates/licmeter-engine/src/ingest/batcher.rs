//! Metric line batching
//!
//! Splits a stream's lines into ingest requests of bounded length and sends
//! them in order. Grouped lines stay in one request whenever the group fits.
//! A failed request aborts the stream.

use crate::client::TenantApi;
use crate::telemetry::EngineMetrics;
use crate::{AGGREGATE_BATCH_LINES, HOST_BATCH_LINES};
use licmeter_common::Result;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Consumption stream a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    HostUnits,
    DemRum,
    DemSynthetic,
    Ddu,
}

impl Stream {
    /// Metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::HostUnits => "host_units",
            Stream::DemRum => "dem_rum",
            Stream::DemSynthetic => "dem_synthetic",
            Stream::Ddu => "ddu",
        }
    }

    /// Lines per ingest request
    pub fn max_lines(&self) -> usize {
        match self {
            Stream::HostUnits => HOST_BATCH_LINES,
            _ => AGGREGATE_BATCH_LINES,
        }
    }
}

/// One ingest request worth of lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestBatch {
    pub batch_id: Uuid,
    pub lines: Vec<String>,
}

impl IngestBatch {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            lines,
        }
    }

    /// Newline separated request body
    pub fn payload(&self) -> String {
        self.lines.join("\n")
    }
}

/// Split `lines` into batches of at most `max_lines`, preserving order
pub fn split_batches(lines: Vec<String>, max_lines: usize) -> Vec<IngestBatch> {
    let max_lines = max_lines.max(1);
    let mut batches = Vec::with_capacity(lines.len() / max_lines + 1);
    let mut current = Vec::with_capacity(max_lines.min(lines.len()));

    for line in lines {
        current.push(line);
        if current.len() >= max_lines {
            batches.push(IngestBatch::new(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        batches.push(IngestBatch::new(current));
    }
    batches
}

/// Pack line groups into batches of at most `max_lines` without splitting a
/// group, unless the group alone is over the limit
pub fn pack_groups(groups: Vec<Vec<String>>, max_lines: usize) -> Vec<IngestBatch> {
    let max_lines = max_lines.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<String> = Vec::with_capacity(max_lines);

    for group in groups {
        if group.is_empty() {
            continue;
        }
        if current.len() + group.len() > max_lines && !current.is_empty() {
            batches.push(IngestBatch::new(std::mem::take(&mut current)));
        }
        if group.len() > max_lines {
            batches.extend(split_batches(group, max_lines));
            continue;
        }
        current.extend(group);
    }
    if !current.is_empty() {
        batches.push(IngestBatch::new(current));
    }
    batches
}

/// What one stream sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub lines: usize,
    pub batches: usize,
}

/// Sends rendered lines to the ingestion endpoint
pub struct LineEmitter<'a> {
    api: &'a dyn TenantApi,
    metrics: &'a EngineMetrics,
}

impl<'a> LineEmitter<'a> {
    pub fn new(api: &'a dyn TenantApi, metrics: &'a EngineMetrics) -> Self {
        Self { api, metrics }
    }

    /// Send every line of `stream`, one request per batch
    pub async fn emit(&self, stream: Stream, lines: Vec<String>) -> Result<EmitSummary> {
        self.send(stream, split_batches(lines, stream.max_lines())).await
    }

    /// Send grouped lines, keeping each group within one request
    pub async fn emit_grouped(&self, stream: Stream, groups: Vec<Vec<String>>) -> Result<EmitSummary> {
        self.send(stream, pack_groups(groups, stream.max_lines())).await
    }

    #[instrument(skip(self, batches), fields(stream = stream.as_str(), count = batches.len()))]
    async fn send(&self, stream: Stream, batches: Vec<IngestBatch>) -> Result<EmitSummary> {
        if batches.is_empty() {
            info!(stream = stream.as_str(), "Nothing to push");
            return Ok(EmitSummary::default());
        }

        let mut summary = EmitSummary::default();
        for batch in batches {
            let count = batch.lines.len();
            debug!(batch_id = %batch.batch_id, count, "Sending ingest batch");
            self.api.ingest(batch.payload()).await?;

            self.metrics
                .lines_ingested
                .with_label_values(&[stream.as_str()])
                .inc_by(count as u64);
            self.metrics
                .batches_sent
                .with_label_values(&[stream.as_str()])
                .inc();
            summary.lines += count;
            summary.batches += 1;
        }

        info!(stream = stream.as_str(), lines = summary.lines, batches = summary.batches, "Pushed consumption");
        Ok(summary)
    }
}
