//! Configuration for curation runs.
//!
//! This module provides configuration for the runtime worker pool, the JSONL
//! reader and the JSONL writer. Configurations can be built in code with the
//! `with_*` builder methods or loaded from YAML; every field has a default.
//!
//! ```yaml
//! runtime:
//!   num_workers: 8
//!   shutdown_timeout_secs: 30
//! reader:
//!   input_path: input_data/
//!   files_per_partition: 4
//!   on_malformed: skip
//! writer:
//!   output_path: filtered_data/
//!   mode: overwrite
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::paths_overlap;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// What the reader does with a line that is not a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Stop the run with an error naming the file and line.
    #[default]
    Fail,
    /// Log, count and continue.
    Skip,
}

/// How the writer treats an existing output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Remove the directory's contents before writing.
    #[default]
    Overwrite,
    /// Keep existing files and append to same-named outputs.
    Append,
    /// Refuse to run if the directory is not empty.
    Error,
}

/// Configuration for the runtime worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of batches processed concurrently.
    pub num_workers: usize,
    /// How long `stop` waits for in-flight work, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            shutdown_timeout_secs: 60,
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration with the specified number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Shutdown timeout as a duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Builder method to set the number of workers.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Builder method to set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_secs = timeout.as_secs();
        self
    }

    /// Validates the runtime settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "num_workers must be greater than 0".to_string(),
            ));
        }
        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "shutdown_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the JSONL reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// File or directory to read.
    pub input_path: PathBuf,
    /// Extensions (with or without the leading dot) that count as input.
    pub file_extensions: Vec<String>,
    /// Number of files grouped into one batch.
    pub files_per_partition: usize,
    /// If set, only these fields are kept on each record.
    pub fields: Option<Vec<String>>,
    /// Handling of lines that are not JSON objects.
    pub on_malformed: MalformedPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input_data/"),
            file_extensions: vec!["jsonl".to_string(), "json".to_string()],
            files_per_partition: 1,
            fields: None,
            on_malformed: MalformedPolicy::Fail,
        }
    }
}

impl ReaderConfig {
    /// Builder method to set the input path.
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    /// Builder method to set the accepted extensions.
    pub fn with_file_extensions(mut self, extensions: Vec<String>) -> Self {
        self.file_extensions = extensions;
        self
    }

    /// Builder method to set files per partition.
    pub fn with_files_per_partition(mut self, files: usize) -> Self {
        self.files_per_partition = files;
        self
    }

    /// Builder method to restrict records to the given fields.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Builder method to set the malformed-record policy.
    pub fn with_on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Validates the reader settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "input_path cannot be empty".to_string(),
            ));
        }
        if self.file_extensions.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "file_extensions cannot be empty".to_string(),
            ));
        }
        if self.files_per_partition == 0 {
            return Err(ConfigError::ValidationFailed(
                "files_per_partition must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.fields, Some(fields) if fields.is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "fields cannot be an empty list".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Directory the output files are written to.
    pub output_path: PathBuf,
    /// Handling of an existing output directory.
    pub mode: WriteMode,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("filtered_data/"),
            mode: WriteMode::Overwrite,
        }
    }
}

impl WriterConfig {
    /// Builder method to set the output directory.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Builder method to set the write mode.
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates the writer settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a curation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub runtime: RuntimeConfig,
    pub reader: ReaderConfig,
    pub writer: WriterConfig,
}

impl CurationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates a configuration from a YAML string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runtime.validate()?;
        self.reader.validate()?;
        self.writer.validate()?;

        if paths_overlap(&self.reader.input_path, &self.writer.output_path) {
            return Err(ConfigError::ValidationFailed(
                "input_path and output_path must differ and not contain one another".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to replace the runtime section.
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Builder method to replace the reader section.
    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    /// Builder method to replace the writer section.
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    /// Builder method to set the input path.
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.reader.input_path = path.into();
        self
    }

    /// Builder method to set the output path.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.writer.output_path = path.into();
        self
    }

    /// Builder method to set the number of workers.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.runtime.num_workers = num_workers;
        self
    }
}
