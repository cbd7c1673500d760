//! Pipeline orchestrator.
//!
//! A [`Pipeline`] is an ordered list of stages. Running it feeds a single
//! seed batch to the first stage, then hands each stage's output to the next
//! one. Stages run one after another; the batches within a stage run
//! concurrently on the runtime.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::runner::{PipelineError, StageReport, StageRunner};
use crate::io::paths_overlap;
use crate::metrics::{MetricsCollector, StageCounts};
use crate::record::RecordBatch;
use crate::runtime::RuntimeHandle;
use crate::stages::{Stage, StageKind};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique id for this run.
    pub run_id: Uuid,
    /// Name of the pipeline that ran.
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One report per stage, in pipeline order.
    pub stages: Vec<StageReport>,
    /// Batches produced by the last stage. Empty when it is a sink.
    #[serde(skip)]
    pub output: Vec<RecordBatch>,
}

impl PipelineResult {
    /// Report for the stage with the given name, if any.
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Records produced by source stages.
    pub fn records_read(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.kind == StageKind::Source)
            .map(|s| s.records_out)
            .sum()
    }

    /// Records handed to sink stages.
    pub fn records_written(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.kind == StageKind::Sink)
            .map(|s| s.records_in)
            .sum()
    }

    /// Records dropped across all transform stages.
    pub fn records_dropped(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.kind == StageKind::Transform)
            .map(StageReport::records_dropped)
            .sum()
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// An ordered sequence of stages.
///
/// # Example
///
/// ```ignore
/// use curate_forge::prelude::*;
///
/// let mut pipeline = Pipeline::new("quality_filtering");
/// pipeline
///     .add_stage(JsonlReader::new("input_data/"))
///     .add_stage(ScoreFilter::new(word_count).with_score_field("word_count"))
///     .add_stage(JsonlWriter::new("filtered_data/"));
///
/// let mut client = RuntimeClient::new(RuntimeConfig::default());
/// let result = client
///     .scope(|runtime| async move { pipeline.run(&runtime).await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    metrics: MetricsCollector,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            metrics: MetricsCollector::new(),
        }
    }

    /// Appends a stage.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends a stage that is shared with other pipelines.
    pub fn add_shared_stage(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Builder-style variant of [`Pipeline::add_stage`].
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.add_stage(stage);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Human-readable listing of the stages.
    pub fn describe(&self) -> String {
        let mut out = format!("Pipeline: {}\n", self.name);
        if self.stages.is_empty() {
            out.push_str("  (no stages)\n");
        }
        for (index, stage) in self.stages.iter().enumerate() {
            out.push_str(&format!("  {}. {} [{}]\n", index, stage.name(), stage.kind()));
        }
        out
    }

    /// Runs every stage in order on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::NoStages` for an empty pipeline,
    /// `PipelineError::PathConflict` if a sink's output overlaps a source's
    /// input, and `PipelineError::StageFailed` naming the first stage that
    /// fails. Later stages do not run after a failure.
    pub async fn run(&self, runtime: &RuntimeHandle) -> Result<PipelineResult, PipelineError> {
        let first = self.stages.first().ok_or(PipelineError::NoStages)?;
        self.check_paths()?;
        if first.kind() != StageKind::Source {
            warn!(
                pipeline = %self.name,
                stage = %first.name(),
                kind = %first.kind(),
                "First stage is not a source"
            );
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            pipeline = %self.name,
            run_id = %run_id,
            stages = self.stages.len(),
            workers = runtime.num_workers(),
            "Starting pipeline run"
        );

        let mut batches = vec![RecordBatch::seed()];
        let mut reports = Vec::with_capacity(self.stages.len());

        for (index, stage) in self.stages.iter().enumerate() {
            let runner = StageRunner::new(index, Arc::clone(stage));
            match runner.run(runtime, batches).await {
                Ok((output, report)) => {
                    self.record_stage(&report);
                    reports.push(report);
                    batches = output;
                }
                Err(e) => {
                    error!(
                        pipeline = %self.name,
                        run_id = %run_id,
                        error = %e,
                        "Pipeline run failed"
                    );
                    self.metrics.record_pipeline_run(&self.name, false);
                    return Err(e);
                }
            }
        }

        let result = PipelineResult {
            run_id,
            pipeline: self.name.clone(),
            started_at,
            finished_at: Utc::now(),
            stages: reports,
            output: batches,
        };

        info!(
            pipeline = %self.name,
            run_id = %run_id,
            records_read = result.records_read(),
            records_written = result.records_written(),
            duration_ms = result.duration().num_milliseconds(),
            "Pipeline run completed"
        );
        self.metrics.record_pipeline_run(&self.name, true);

        Ok(result)
    }

    /// Rejects sinks that write into, over, or inside a source's input.
    fn check_paths(&self) -> Result<(), PipelineError> {
        let inputs = self.stages.iter().filter_map(|s| s.input_path());
        for input in inputs {
            let outputs = self.stages.iter().filter_map(|s| s.output_path());
            for output in outputs {
                if paths_overlap(input, output) {
                    return Err(PipelineError::PathConflict {
                        input: input.to_path_buf(),
                        output: output.to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }

    fn record_stage(&self, report: &StageReport) {
        let counts = StageCounts {
            batches_in: report.batches_in as u64,
            records_in: report.records_in as u64,
            records_out: report.records_out as u64,
            duration_secs: report.elapsed.as_secs_f64(),
        };
        self.metrics
            .record_stage(&report.name, counts, report.kind == StageKind::Transform);
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
