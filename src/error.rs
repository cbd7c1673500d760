//! Error types shared by pipeline stages.
//!
//! Subsystem-specific errors live next to their subsystem:
//! - [`crate::pipeline::PipelineError`] for pipeline assembly and runs
//! - [`crate::pipeline::ConfigError`] for configuration loading
//! - [`crate::runtime::RuntimeError`] for the runtime client lifecycle

use std::path::PathBuf;

use thiserror::Error;

/// Errors a stage can raise while processing a batch.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Input path does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("No input files with extensions {extensions:?} found under {path}")]
    NoInputFiles {
        path: PathBuf,
        extensions: Vec<String>,
    },

    #[error("Malformed record at {path}:{line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Record is missing string field '{field}'")]
    MissingField { field: String },

    #[error("Field '{field}' does not hold a score: {value}")]
    InvalidScore { field: String, value: String },

    #[error("Output directory is not empty: {0}")]
    OutputExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for stage results.
pub type StageResult<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_display() {
        let err = StageError::MalformedRecord {
            path: PathBuf::from("input/a.jsonl"),
            line: 7,
            reason: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("input/a.jsonl:7"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_missing_field_display() {
        let err = StageError::MissingField {
            field: "text".to_string(),
        };
        assert_eq!(err.to_string(), "Record is missing string field 'text'");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StageError = io.into();
        assert!(matches!(err, StageError::Io(_)));
    }
}
