//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by curate-forge and
//! provides functions for initializing, registering, and exporting them.

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all curate-forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Serializes `init_metrics` so every static comes from the same registry.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Records seen by each stage, labeled by stage and direction (in/out).
pub static STAGE_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Batches processed by each stage.
pub static STAGE_BATCHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Wall-clock time spent per stage, in seconds.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Records dropped by each transform stage.
pub static RECORDS_DROPPED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Input lines skipped as malformed.
pub static MALFORMED_RECORDS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Pipeline runs, labeled by pipeline name and status.
pub static PIPELINE_RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of runtime tasks currently holding a worker slot.
pub static ACTIVE_WORKERS: OnceLock<Gauge> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once is a no-op.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    // Stage metrics
    let stage_records_total = IntCounterVec::new(
        Opts::new(
            "curate_forge_stage_records_total",
            "Records entering and leaving each stage",
        ),
        &["stage", "direction"],
    )?;

    let stage_batches_total = IntCounterVec::new(
        Opts::new(
            "curate_forge_stage_batches_total",
            "Batches processed by each stage",
        ),
        &["stage"],
    )?;

    let stage_duration = HistogramVec::new(
        HistogramOpts::new(
            "curate_forge_stage_duration_seconds",
            "Wall-clock time spent per stage in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["stage"],
    )?;

    let records_dropped_total = IntCounterVec::new(
        Opts::new(
            "curate_forge_records_dropped_total",
            "Records dropped by each transform stage",
        ),
        &["stage"],
    )?;

    // Input metrics
    let malformed_records_total = IntCounter::new(
        "curate_forge_malformed_records_total",
        "Input lines skipped as malformed",
    )?;

    // Pipeline metrics
    let pipeline_runs_total = CounterVec::new(
        Opts::new("curate_forge_pipeline_runs_total", "Total pipeline runs"),
        &["pipeline", "status"],
    )?;

    // Runtime metrics
    let active_workers = Gauge::new(
        "curate_forge_active_workers",
        "Number of runtime tasks holding a worker slot",
    )?;

    registry.register(Box::new(stage_records_total.clone()))?;
    registry.register(Box::new(stage_batches_total.clone()))?;
    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(records_dropped_total.clone()))?;
    registry.register(Box::new(malformed_records_total.clone()))?;
    registry.register(Box::new(pipeline_runs_total.clone()))?;
    registry.register(Box::new(active_workers.clone()))?;

    // Statics are set under INIT_LOCK, after every registration succeeded
    let _ = REGISTRY.set(registry);
    let _ = STAGE_RECORDS_TOTAL.set(stage_records_total);
    let _ = STAGE_BATCHES_TOTAL.set(stage_batches_total);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = RECORDS_DROPPED_TOTAL.set(records_dropped_total);
    let _ = MALFORMED_RECORDS_TOTAL.set(malformed_records_total);
    let _ = PIPELINE_RUNS_TOTAL.set(pipeline_runs_total);
    let _ = ACTIVE_WORKERS.set(active_workers);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns an explanatory comment line if the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
