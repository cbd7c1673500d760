//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op for metrics that have not been initialized, so
//! library code can record unconditionally.

use super::prometheus::{
    ACTIVE_WORKERS, MALFORMED_RECORDS_TOTAL, PIPELINE_RUNS_TOTAL, RECORDS_DROPPED_TOTAL,
    STAGE_BATCHES_TOTAL, STAGE_DURATION, STAGE_RECORDS_TOTAL,
};

/// Counts for one stage over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageCounts {
    pub batches_in: u64,
    pub records_in: u64,
    pub records_out: u64,
    pub duration_secs: f64,
}

/// Metrics collector for recording curation metrics.
///
/// # Example
///
/// ```ignore
/// use curate_forge::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics()?;
/// let collector = MetricsCollector::new();
/// collector.record_pipeline_run("quality_filtering", true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    pub fn new() -> Self {
        Self
    }

    /// Record one stage's totals for a run.
    ///
    /// Dropped records are only counted for transform stages; sinks consume
    /// everything by definition and sources have no input.
    pub fn record_stage(&self, stage: &str, counts: StageCounts, is_transform: bool) {
        if let Some(records) = STAGE_RECORDS_TOTAL.get() {
            records
                .with_label_values(&[stage, "in"])
                .inc_by(counts.records_in);
            records
                .with_label_values(&[stage, "out"])
                .inc_by(counts.records_out);
        }

        if let Some(batches) = STAGE_BATCHES_TOTAL.get() {
            batches.with_label_values(&[stage]).inc_by(counts.batches_in);
        }

        if let Some(duration) = STAGE_DURATION.get() {
            duration
                .with_label_values(&[stage])
                .observe(counts.duration_secs);
        }

        if is_transform {
            if let Some(dropped) = RECORDS_DROPPED_TOTAL.get() {
                dropped
                    .with_label_values(&[stage])
                    .inc_by(counts.records_in.saturating_sub(counts.records_out));
            }
        }

        tracing::trace!(
            stage = stage,
            records_in = counts.records_in,
            records_out = counts.records_out,
            duration_secs = counts.duration_secs,
            "Recorded stage metric"
        );
    }

    /// Record a malformed input line that was skipped.
    pub fn record_malformed(&self) {
        if let Some(malformed) = MALFORMED_RECORDS_TOTAL.get() {
            malformed.inc();
        }
    }

    /// Record the outcome of a pipeline run.
    pub fn record_pipeline_run(&self, pipeline: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        if let Some(runs) = PIPELINE_RUNS_TOTAL.get() {
            runs.with_label_values(&[pipeline, status]).inc();
        }

        tracing::trace!(pipeline = pipeline, status = status, "Recorded pipeline run");
    }

    /// A runtime task acquired a worker slot.
    pub fn worker_started(&self) {
        if let Some(active) = ACTIVE_WORKERS.get() {
            active.inc();
        }
    }

    /// A runtime task released its worker slot.
    pub fn worker_finished(&self) {
        if let Some(active) = ACTIVE_WORKERS.get() {
            active.dec();
        }
    }
}
