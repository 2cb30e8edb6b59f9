//! Metric ingestion module
//!
//! Renders consumption as protocol lines and sends them in bounded batches.

pub mod batcher;
pub mod lines;

pub use batcher::{pack_groups, split_batches, EmitSummary, IngestBatch, LineEmitter, Stream};
pub use lines::{ddu_lines, dem_lines, host_unit_groups, host_unit_lines, render_tags};
