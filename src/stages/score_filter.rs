//! Transform stages that score and filter records.
//!
//! - [`ScoreFilter`] scores each record, optionally records the score and
//!   drops records that fail the keep-predicate.
//! - [`ScoreStage`] scores and records, never drops.
//! - [`FilterStage`] drops by a score an earlier stage already recorded.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StageError, StageResult};
use crate::record::{Record, RecordBatch, Score, DEFAULT_TEXT_FIELD};

use super::filter::DocumentFilter;
use super::stage::{Stage, StageKind};

/// Scores a record's text field, failing if it is missing or not a string.
fn score_record(
    filter: &dyn DocumentFilter,
    record: &Record,
    text_field: &str,
) -> StageResult<Score> {
    let text = record
        .text(text_field)
        .ok_or_else(|| StageError::MissingField {
            field: text_field.to_string(),
        })?;
    Ok(filter.score_document(text))
}

/// Stores `score` under `field`. NaN and infinite scores have no JSON form.
fn record_score(record: &mut Record, field: &str, score: Score) -> StageResult<()> {
    if !score.is_finite() {
        return Err(StageError::InvalidScore {
            field: field.to_string(),
            value: score.as_f64().to_string(),
        });
    }
    record.set(field, score);
    Ok(())
}

/// Forwards the batch unless filtering emptied it.
fn forward(mut batch: RecordBatch, records: Vec<Record>) -> Vec<RecordBatch> {
    if records.is_empty() {
        Vec::new()
    } else {
        batch.records = records;
        vec![batch]
    }
}

/// Scores every record and keeps those passing the filter.
pub struct ScoreFilter {
    name: String,
    filter: Arc<dyn DocumentFilter>,
    text_field: String,
    score_field: Option<String>,
    invert: bool,
}

impl ScoreFilter {
    /// Creates a score-filter over the default `text` field that does not
    /// record its score.
    pub fn new(filter: Arc<dyn DocumentFilter>) -> Self {
        Self {
            name: format!("score_filter:{}", filter.name()),
            filter,
            text_field: DEFAULT_TEXT_FIELD.to_string(),
            score_field: None,
            invert: false,
        }
    }

    /// Reads text from `field` instead of `text`.
    pub fn with_text_field(mut self, field: impl Into<String>) -> Self {
        self.text_field = field.into();
        self
    }

    /// Writes each record's score into `field`.
    pub fn with_score_field(mut self, field: impl Into<String>) -> Self {
        self.score_field = Some(field.into());
        self
    }

    /// Keeps records the filter would drop, and drops the rest.
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Overrides the stage name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Field the score is written to, if any.
    pub fn score_field(&self) -> Option<&str> {
        self.score_field.as_deref()
    }
}

#[async_trait]
impl Stage for ScoreFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn process(&self, mut batch: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        let records = std::mem::take(&mut batch.records);
        let total = records.len();
        let mut kept = Vec::with_capacity(total);

        for mut record in records {
            let score = score_record(self.filter.as_ref(), &record, &self.text_field)?;
            if self.filter.keep_document(&score) == self.invert {
                continue;
            }
            if let Some(field) = &self.score_field {
                record_score(&mut record, field, score)?;
            }
            kept.push(record);
        }

        debug!(
            stage = %self.name,
            batch = %batch.id,
            records_in = total,
            records_out = kept.len(),
            "Score-filtered batch"
        );

        Ok(forward(batch, kept))
    }
}

/// Scores every record into a field without dropping any.
pub struct ScoreStage {
    name: String,
    scorer: Arc<dyn DocumentFilter>,
    text_field: String,
    score_field: String,
}

impl ScoreStage {
    /// Creates a scoring stage writing into `score_field`.
    pub fn new(scorer: Arc<dyn DocumentFilter>, score_field: impl Into<String>) -> Self {
        Self {
            name: format!("score:{}", scorer.name()),
            scorer,
            text_field: DEFAULT_TEXT_FIELD.to_string(),
            score_field: score_field.into(),
        }
    }

    /// Reads text from `field` instead of `text`.
    pub fn with_text_field(mut self, field: impl Into<String>) -> Self {
        self.text_field = field.into();
        self
    }
}

#[async_trait]
impl Stage for ScoreStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn process(&self, mut batch: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        let input = std::mem::take(&mut batch.records);
        let mut records = Vec::with_capacity(input.len());
        for mut record in input {
            let score = score_record(self.scorer.as_ref(), &record, &self.text_field)?;
            record_score(&mut record, &self.score_field, score)?;
            records.push(record);
        }
        Ok(forward(batch, records))
    }
}

/// Drops records by a score already stored in a field.
pub struct FilterStage {
    name: String,
    filter: Arc<dyn DocumentFilter>,
    filter_field: String,
    invert: bool,
}

impl FilterStage {
    /// Creates a filter reading scores from `filter_field`.
    pub fn new(filter: Arc<dyn DocumentFilter>, filter_field: impl Into<String>) -> Self {
        Self {
            name: format!("filter:{}", filter.name()),
            filter,
            filter_field: filter_field.into(),
            invert: false,
        }
    }

    /// Keeps records the filter would drop, and drops the rest.
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }
}

#[async_trait]
impl Stage for FilterStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn process(&self, mut batch: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        let input = std::mem::take(&mut batch.records);
        let mut kept = Vec::with_capacity(input.len());
        for record in input {
            let value = record
                .get(&self.filter_field)
                .ok_or_else(|| StageError::MissingField {
                    field: self.filter_field.clone(),
                })?;
            let score = Score::from_value(value).ok_or_else(|| StageError::InvalidScore {
                field: self.filter_field.clone(),
                value: value.to_string(),
            })?;
            if self.filter.keep_document(&score) != self.invert {
                kept.push(record);
            }
        }
        Ok(forward(batch, kept))
    }
}
