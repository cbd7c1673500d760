//! Stage runner for executing one stage over a set of batches.
//!
//! This module provides the `StageRunner`, which hands every batch of a
//! stage to the runtime's worker pool and gathers the outputs back in input
//! order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::StageError;
use crate::record::{assign_parts, RecordBatch};
use crate::runtime::{RuntimeError, RuntimeHandle};
use crate::stages::{Stage, StageKind};

/// Errors that can occur while running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline has no stages to run.
    #[error("Pipeline has no stages")]
    NoStages,

    /// A stage returned an error.
    #[error("Stage '{stage}' (index {index}) failed: {source}")]
    StageFailed {
        stage: String,
        index: usize,
        #[source]
        source: StageError,
    },

    /// A stage task panicked or was cancelled.
    #[error("Stage '{stage}' (index {index}) task aborted: {message}")]
    TaskAborted {
        stage: String,
        index: usize,
        message: String,
    },

    /// A sink would write into, over, or inside a source's input.
    #[error("Output path {output} overlaps input path {input}")]
    PathConflict { input: PathBuf, output: PathBuf },

    /// The runtime refused work.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl PipelineError {
    /// Name of the failing stage, if the error is tied to one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::StageFailed { stage, .. } | PipelineError::TaskAborted { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }

    /// Position of the failing stage, if the error is tied to one.
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            PipelineError::StageFailed { index, .. } | PipelineError::TaskAborted { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Counts and timing for one stage of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// Stage role.
    pub kind: StageKind,
    /// Position in the pipeline.
    pub index: usize,
    pub batches_in: usize,
    pub batches_out: usize,
    pub records_in: usize,
    pub records_out: usize,
    /// Wall-clock time from setup to the last batch finishing.
    pub elapsed: Duration,
}

impl StageReport {
    /// Records that entered the stage but did not leave it.
    ///
    /// Sinks consume everything, so this is only meaningful for transforms.
    pub fn records_dropped(&self) -> usize {
        self.records_in.saturating_sub(self.records_out)
    }
}

/// Runs a single stage on the runtime.
pub struct StageRunner {
    index: usize,
    stage: Arc<dyn Stage>,
}

impl StageRunner {
    /// Creates a runner for the stage at `index`.
    pub fn new(index: usize, stage: Arc<dyn Stage>) -> Self {
        Self { index, stage }
    }

    /// Runs `setup` once, then processes every batch.
    ///
    /// Batches are submitted as worker slots free up, so up to `num_workers`
    /// run at once. Outputs are concatenated in input order and sibling
    /// batches sharing an id are numbered as parts. After the first failure no
    /// further batch starts, and tasks still in flight are aborted.
    pub async fn run(
        &self,
        runtime: &RuntimeHandle,
        batches: Vec<RecordBatch>,
    ) -> Result<(Vec<RecordBatch>, StageReport), PipelineError> {
        let name = self.stage.name().to_string();
        let started = Instant::now();

        self.stage
            .setup()
            .await
            .map_err(|source| self.stage_failed(source))?;

        let batches_in = batches.len();
        let records_in: usize = batches.iter().map(RecordBatch::len).sum();

        info!(
            stage = %name,
            index = self.index,
            kind = %self.stage.kind(),
            batches = batches_in,
            records_in = records_in,
            "Running stage"
        );

        // Set by the first failing batch. Batches that have not started yet
        // see it and return without processing.
        let failed = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(batches_in);
        for batch in batches {
            if failed.load(Ordering::SeqCst) {
                break;
            }

            let stage = Arc::clone(&self.stage);
            let failed = Arc::clone(&failed);
            let handle = runtime
                .submit(async move {
                    if failed.load(Ordering::SeqCst) {
                        return None;
                    }
                    let batch_id = batch.id.clone();
                    let result = stage.process(batch).await;
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    debug!(
                        stage = %stage.name(),
                        batch = %batch_id,
                        ok = result.is_ok(),
                        "Batch processed"
                    );
                    Some(result)
                })
                .await;

            match handle {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    handles.iter().for_each(|h| h.abort());
                    return Err(e.into());
                }
            }
        }

        let mut output = Vec::new();
        let mut pending = handles.into_iter();
        while let Some(handle) = pending.next() {
            let outcome = match handle.await {
                Ok(Some(Ok(batches))) => Ok(batches),
                // Skipped after another batch failed; that failure is reported.
                Ok(None) => Ok(Vec::new()),
                Ok(Some(Err(source))) => Err(self.stage_failed(source)),
                Err(join_error) => Err(PipelineError::TaskAborted {
                    stage: name.clone(),
                    index: self.index,
                    message: join_error.to_string(),
                }),
            };

            match outcome {
                Ok(batches) => output.extend(batches),
                Err(e) => {
                    pending.for_each(|h| h.abort());
                    return Err(e);
                }
            }
        }
        assign_parts(&mut output);

        let report = StageReport {
            name,
            kind: self.stage.kind(),
            index: self.index,
            batches_in,
            batches_out: output.len(),
            records_in,
            records_out: output.iter().map(RecordBatch::len).sum(),
            elapsed: started.elapsed(),
        };

        info!(
            stage = %report.name,
            index = report.index,
            records_in = report.records_in,
            records_out = report.records_out,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Stage finished"
        );

        Ok((output, report))
    }

    fn stage_failed(&self, source: StageError) -> PipelineError {
        PipelineError::StageFailed {
            stage: self.stage.name().to_string(),
            index: self.index,
            source,
        }
    }
}
