//! The stage trait shared by readers, transforms and writers.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StageResult;
use crate::record::RecordBatch;

/// Role a stage plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Ignores its input and produces batches from an external origin.
    Source,
    /// Scores, annotates or drops records.
    Transform,
    /// Persists records and produces no further output.
    Sink,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Source => write!(f, "source"),
            StageKind::Transform => write!(f, "transform"),
            StageKind::Sink => write!(f, "sink"),
        }
    }
}

/// A single processing step over record batches.
///
/// `process` is called once per input batch and may return any number of
/// output batches. Stages are shared across worker tasks, so they must not
/// rely on `&mut self`.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Human-readable name used in logs, metrics and errors.
    fn name(&self) -> &str;

    /// The role of this stage.
    fn kind(&self) -> StageKind;

    /// File or directory this stage reads from, if any.
    fn input_path(&self) -> Option<&Path> {
        None
    }

    /// Directory this stage writes into, if any.
    fn output_path(&self) -> Option<&Path> {
        None
    }

    /// Called once per run, before any batch is processed.
    async fn setup(&self) -> StageResult<()> {
        Ok(())
    }

    /// Processes one batch.
    async fn process(&self, batch: RecordBatch) -> StageResult<Vec<RecordBatch>>;
}
