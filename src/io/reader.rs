//! Source stage reading newline-delimited JSON files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{StageError, StageResult};
use crate::metrics::MetricsCollector;
use crate::pipeline::config::{MalformedPolicy, ReaderConfig};
use crate::record::{Record, RecordBatch};
use crate::stages::{Stage, StageKind};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn parse_line(line: &str) -> Result<Record, String> {
    let value = serde_json::from_str::<serde_json::Value>(line).map_err(|e| e.to_string())?;
    Record::from_value(value).ok_or_else(|| "not a JSON object".to_string())
}

/// Reads JSONL documents from a file or directory.
///
/// Files are discovered recursively, filtered by extension and sorted by path,
/// then grouped into partitions of `files_per_partition`. Each partition
/// becomes one [`RecordBatch`].
pub struct JsonlReader {
    config: ReaderConfig,
    metrics: MetricsCollector,
}

impl JsonlReader {
    /// Creates a reader over `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_config(ReaderConfig::default().with_input_path(path))
    }

    /// Creates a reader from a full configuration.
    pub fn from_config(config: ReaderConfig) -> Self {
        Self {
            config,
            metrics: MetricsCollector::new(),
        }
    }

    /// Returns the reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Lists input files in a stable order.
    pub fn discover_files(&self) -> StageResult<Vec<PathBuf>> {
        let root = &self.config.input_path;
        if !root.exists() {
            return Err(StageError::InputNotFound(root.clone()));
        }

        if root.is_file() {
            return Ok(vec![root.clone()]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                StageError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if entry.file_type().is_file() && self.has_allowed_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(StageError::NoInputFiles {
                path: root.clone(),
                extensions: self.config.file_extensions.clone(),
            });
        }

        Ok(files)
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.config
            .file_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Parses one file's raw bytes into records.
    ///
    /// Lines are split on `\n` before decoding, so a line that is not valid
    /// UTF-8 is malformed on its own and does not spoil the rest of the file.
    fn parse_file(&self, path: &Path, contents: &[u8]) -> StageResult<Vec<Record>> {
        let contents = contents.strip_prefix(UTF8_BOM).unwrap_or(contents);
        let mut records = Vec::new();

        for (idx, raw) in contents.split(|b| *b == b'\n').enumerate() {
            let parsed = match std::str::from_utf8(raw) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    parse_line(line)
                }
                Err(e) => Err(format!("invalid UTF-8: {e}")),
            };

            match parsed {
                Ok(mut record) => {
                    if let Some(fields) = &self.config.fields {
                        record.retain_fields(fields);
                    }
                    records.push(record);
                }
                Err(reason) => match self.config.on_malformed {
                    MalformedPolicy::Fail => {
                        return Err(StageError::MalformedRecord {
                            path: path.to_path_buf(),
                            line: idx + 1,
                            reason,
                        });
                    }
                    MalformedPolicy::Skip => {
                        warn!(
                            path = %path.display(),
                            line = idx + 1,
                            reason = %reason,
                            "Skipping malformed record"
                        );
                        self.metrics.record_malformed();
                    }
                },
            }
        }

        Ok(records)
    }

    async fn read_partition(&self, files: &[PathBuf]) -> StageResult<RecordBatch> {
        let mut records = Vec::new();
        for path in files {
            let contents = tokio::fs::read(path).await?;
            let parsed = self.parse_file(path, &contents)?;
            debug!(path = %path.display(), records = parsed.len(), "Read input file");
            records.extend(parsed);
        }
        Ok(RecordBatch::new(files.to_vec(), records))
    }
}

#[async_trait]
impl Stage for JsonlReader {
    fn name(&self) -> &str {
        "jsonl_reader"
    }

    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    fn input_path(&self) -> Option<&Path> {
        Some(&self.config.input_path)
    }

    async fn process(&self, _input: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        let files = self.discover_files()?;
        let per_partition = self.config.files_per_partition.max(1);

        info!(
            path = %self.config.input_path.display(),
            files = files.len(),
            files_per_partition = per_partition,
            "Discovered input files"
        );

        let mut batches = Vec::with_capacity(files.len().div_ceil(per_partition));
        for chunk in files.chunks(per_partition) {
            batches.push(self.read_partition(chunk).await?);
        }
        Ok(batches)
    }
}
