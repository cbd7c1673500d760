//! Sink stage writing newline-delimited JSON files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StageError, StageResult};
use crate::pipeline::config::{WriteMode, WriterConfig};
use crate::record::RecordBatch;
use crate::stages::{Stage, StageKind};

/// Writes each batch to `<batch id>.jsonl` under the output directory.
///
/// Batch ids derive from the input file paths, so rerunning on the same input
/// produces the same file names. Sibling batches split from one partition are
/// written to `<batch id>-<part>.jsonl`.
pub struct JsonlWriter {
    config: WriterConfig,
}

impl JsonlWriter {
    /// Creates a writer into `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_config(WriterConfig::default().with_output_path(path))
    }

    /// Creates a writer from a full configuration.
    pub fn from_config(config: WriterConfig) -> Self {
        Self { config }
    }

    /// Returns the writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Path a batch is written to.
    pub fn output_file(&self, batch: &RecordBatch) -> PathBuf {
        self.config
            .output_path
            .join(format!("{}.jsonl", batch.file_stem()))
    }

    async fn is_non_empty_dir(path: &Path) -> StageResult<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let mut entries = fs::read_dir(path).await?;
        Ok(entries.next_entry().await?.is_some())
    }
}

#[async_trait]
impl Stage for JsonlWriter {
    fn name(&self) -> &str {
        "jsonl_writer"
    }

    fn kind(&self) -> StageKind {
        StageKind::Sink
    }

    fn output_path(&self) -> Option<&Path> {
        Some(&self.config.output_path)
    }

    async fn setup(&self) -> StageResult<()> {
        let dir = &self.config.output_path;
        match self.config.mode {
            WriteMode::Overwrite => {
                if dir.exists() {
                    debug!(path = %dir.display(), "Clearing output directory");
                    fs::remove_dir_all(dir).await?;
                }
            }
            WriteMode::Error => {
                if Self::is_non_empty_dir(dir).await? {
                    return Err(StageError::OutputExists(dir.clone()));
                }
            }
            WriteMode::Append => {}
        }
        fs::create_dir_all(dir).await?;
        Ok(())
    }

    async fn process(&self, batch: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        let path = self.output_file(&batch);

        let mut buffer = Vec::new();
        for record in &batch.records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.config.mode == WriteMode::Append)
            .truncate(self.config.mode != WriteMode::Append)
            .open(&path)
            .await?;
        file.write_all(&buffer).await?;
        file.sync_all().await?;

        info!(
            path = %path.display(),
            records = batch.len(),
            "Wrote output file"
        );

        Ok(Vec::new())
    }
}
