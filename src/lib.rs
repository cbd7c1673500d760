//! curate-forge: staged record pipelines for text dataset curation.
//!
//! This library provides a pipeline of staged transforms over a stream of
//! JSON records: a JSONL reader, score and filter stages driven by pluggable
//! document filters, and a JSONL writer, executed on a bounded worker runtime.

// Core modules
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod runtime;
pub mod stages;
pub mod telemetry;

// Re-export commonly used error types
pub use error::{StageError, StageResult};
pub use pipeline::{ConfigError, PipelineError};
pub use runtime::RuntimeError;

/// Commonly used types for assembling and running a pipeline.
pub mod prelude {
    pub use crate::error::{StageError, StageResult};
    pub use crate::io::{JsonlReader, JsonlWriter};
    pub use crate::pipeline::{
        CurationConfig, MalformedPolicy, Pipeline, PipelineError, PipelineResult, ReaderConfig,
        RuntimeConfig, StageReport, WriteMode, WriterConfig,
    };
    pub use crate::record::{Record, RecordBatch, Score, DEFAULT_TEXT_FIELD};
    pub use crate::runtime::{RuntimeClient, RuntimeError, RuntimeHandle};
    pub use crate::stages::{
        DocumentFilter, FilterStage, FnFilter, ScoreFilter, ScoreStage, Stage, StageKind,
    };
}
