//! Pipeline orchestration for record curation.
//!
//! This module provides the pipeline that drives record batches through an
//! ordered list of stages, plus the configuration shared by the runtime,
//! reader and writer.
//!
//! # Architecture
//!
//! - **Orchestrator**: owns the stage list and runs it stage by stage
//! - **Runner**: executes one stage over its batches on the runtime
//! - **Config**: configuration for the runtime, reader and writer
//!
//! # Pipeline Flow
//!
//! 1. **Seed**: an empty seed batch is handed to the first stage
//! 2. **Read**: the source stage ignores the seed and emits one batch per input partition
//! 3. **Transform**: each transform scores, annotates or drops records batch by batch
//! 4. **Write**: the sink persists every batch that is still non-empty
//!
//! # Example
//!
//! ```rust,ignore
//! use curate_forge::pipeline::{CurationConfig, Pipeline};
//! use curate_forge::io::{JsonlReader, JsonlWriter};
//! use curate_forge::runtime::RuntimeClient;
//!
//! let config = CurationConfig::from_yaml_file("curation.yaml")?;
//!
//! let mut pipeline = Pipeline::new("quality_filtering");
//! pipeline
//!     .add_stage(JsonlReader::from_config(config.reader.clone()))
//!     .add_stage(JsonlWriter::from_config(config.writer.clone()));
//!
//! let mut client = RuntimeClient::new(config.runtime.clone());
//! let result = client
//!     .scope(|runtime| async move { pipeline.run(&runtime).await })
//!     .await?;
//! println!("wrote {} records", result.records_written());
//! ```

pub mod config;
pub mod orchestrator;
pub mod runner;

pub use config::{
    ConfigError, CurationConfig, MalformedPolicy, ReaderConfig, RuntimeConfig, WriteMode,
    WriterConfig,
};
pub use orchestrator::{Pipeline, PipelineResult};
pub use runner::{PipelineError, StageReport, StageRunner};
