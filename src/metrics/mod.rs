//! Metrics module for Prometheus-based monitoring.
//!
//! Records per-stage record and batch counts, stage durations, dropped and
//! malformed records, pipeline run outcomes and runtime worker occupancy.
//!
//! # Example
//!
//! ```ignore
//! use curate_forge::metrics::{init_metrics, export_metrics};
//!
//! init_metrics()?;
//! // ... run pipelines ...
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{MetricsCollector, StageCounts};
pub use self::prometheus::{export_metrics, init_metrics};

pub use self::prometheus::{
    ACTIVE_WORKERS, MALFORMED_RECORDS_TOTAL, PIPELINE_RUNS_TOTAL, RECORDS_DROPPED_TOTAL, REGISTRY,
    STAGE_BATCHES_TOTAL, STAGE_DURATION, STAGE_RECORDS_TOTAL,
};
