//! Record, score and batch types.
//!
//! A [`Record`] is one JSON document. Stages may read any field and append
//! new ones, but the API offers no way to delete a field, so a score written
//! by an upstream stage survives every downstream stage.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Default name of the field holding document text.
pub const DEFAULT_TEXT_FIELD: &str = "text";

/// One document flowing through the pipeline.
///
/// Serializes as the bare JSON object. Field order is preserved, so appended
/// fields land after the original ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Creates a record holding only a text field.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.set(DEFAULT_TEXT_FIELD, Value::String(text.into()));
        record
    }

    /// Builds a record from an arbitrary JSON value.
    ///
    /// Returns `None` if the value is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Returns the string value of `field`, if present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Returns the raw value of `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Whether the record has `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Sets `field`, appending it if new and replacing the value in place otherwise.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Keeps only the named fields, in their original order.
    pub fn retain_fields(&mut self, keep: &[String]) {
        self.fields.retain(|name, _| keep.iter().any(|k| k == name));
    }

    /// Iterates field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

/// A scalar produced by a scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Score {
    /// Numeric view of the score. Booleans map to 0.0 / 1.0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Score::Int(v) => v as f64,
            Score::Float(v) => v,
            Score::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Reads a score back out of a record field.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Score::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Score::Int)
                .or_else(|| n.as_f64().map(Score::Float)),
            _ => None,
        }
    }

    /// Whether the score has a JSON form. NaN and infinities do not.
    pub fn is_finite(&self) -> bool {
        match *self {
            Score::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<Score> for Value {
    fn from(score: Score) -> Self {
        match score {
            Score::Int(v) => Value::Number(v.into()),
            // Stages reject non-finite scores before recording them
            Score::Float(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            Score::Bool(v) => Value::Bool(v),
        }
    }
}

impl From<i64> for Score {
    fn from(v: i64) -> Self {
        Score::Int(v)
    }
}

impl From<usize> for Score {
    fn from(v: usize) -> Self {
        Score::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Score {
    fn from(v: f64) -> Self {
        Score::Float(v)
    }
}

impl From<bool> for Score {
    fn from(v: bool) -> Self {
        Score::Bool(v)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Int(v) => write!(f, "{}", v),
            Score::Float(v) => write!(f, "{}", v),
            Score::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// The records of one input partition, handed to stages as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    /// Deterministic identifier derived from the source files.
    pub id: String,
    /// Distinguishes sibling batches that share an id after a stage split one.
    pub part: usize,
    /// Input files this batch was read from.
    pub source_files: Vec<PathBuf>,
    /// Records in input order.
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// Creates a batch whose id is derived from `source_files`.
    pub fn new(source_files: Vec<PathBuf>, records: Vec<Record>) -> Self {
        Self {
            id: batch_id(&source_files),
            part: 0,
            source_files,
            records,
        }
    }

    /// The empty batch fed to the first stage of a run.
    pub fn seed() -> Self {
        Self {
            id: "seed".to_string(),
            part: 0,
            source_files: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Returns a batch with the same identity and different records.
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            id: self.id.clone(),
            part: self.part,
            source_files: self.source_files.clone(),
            records,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unique name for this batch among its siblings, used for output files.
    pub fn file_stem(&self) -> String {
        if self.part == 0 {
            self.id.clone()
        } else {
            format!("{}-{}", self.id, self.part)
        }
    }
}

/// Numbers batches sharing an id as parts 0, 1, 2... in slice order.
pub fn assign_parts(batches: &mut [RecordBatch]) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut parts = Vec::with_capacity(batches.len());
    for batch in batches.iter() {
        let next = seen.entry(batch.id.as_str()).or_insert(0);
        parts.push(*next);
        *next += 1;
    }
    for (batch, part) in batches.iter_mut().zip(parts) {
        batch.part = part;
    }
}

/// Hex SHA-256 prefix over the source file paths, in order.
pub fn batch_id(source_files: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for path in source_files {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("text")).is_none());
        assert!(Record::from_value(json!({"text": "hi"})).is_some());
    }

    #[test]
    fn test_appended_fields_follow_original_order() {
        let mut record = Record::from_value(json!({"id": 1, "text": "hello"})).unwrap();
        record.set("word_count", Score::Int(1));
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["id", "text", "word_count"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"id":1,"text":"hello","word_count":1}"#
        );
    }

    #[test]
    fn test_text_requires_string() {
        let record = Record::from_value(json!({"text": 5})).unwrap();
        assert!(record.text("text").is_none());
        assert_eq!(Record::with_text("abc").text("text"), Some("abc"));
    }

    #[test]
    fn test_retain_fields() {
        let mut record = Record::from_value(json!({"a": 1, "text": "x", "b": 2})).unwrap();
        record.retain_fields(&["text".to_string(), "b".to_string()]);
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["text", "b"]);
    }

    #[test]
    fn test_integer_score_serializes_without_fraction() {
        let value: Value = Score::Int(250).into();
        assert_eq!(value.to_string(), "250");
        let value: Value = Score::Float(0.25).into();
        assert_eq!(value.to_string(), "0.25");
    }

    #[test]
    fn test_score_from_value() {
        assert_eq!(Score::from_value(&json!(3)), Some(Score::Int(3)));
        assert_eq!(Score::from_value(&json!(0.5)), Some(Score::Float(0.5)));
        assert_eq!(Score::from_value(&json!(true)), Some(Score::Bool(true)));
        assert_eq!(Score::from_value(&json!("3")), None);
    }

    #[test]
    fn test_score_as_f64() {
        assert_eq!(Score::Int(4).as_f64(), 4.0);
        assert_eq!(Score::Bool(true).as_f64(), 1.0);
        assert_eq!(Score::Bool(false).as_f64(), 0.0);
    }

    #[test]
    fn test_batch_id_is_deterministic() {
        let files = vec![PathBuf::from("in/a.jsonl"), PathBuf::from("in/b.jsonl")];
        let a = RecordBatch::new(files.clone(), vec![]);
        let b = RecordBatch::new(files, vec![Record::with_text("x")]);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);

        let other = RecordBatch::new(vec![PathBuf::from("in/c.jsonl")], vec![]);
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn test_assign_parts_separates_siblings() {
        let first = RecordBatch::new(vec![PathBuf::from("a.jsonl")], vec![Record::with_text("x")]);
        let second = first.with_records(vec![Record::with_text("y")]);
        let other = RecordBatch::new(vec![PathBuf::from("b.jsonl")], vec![]);
        let mut batches = vec![first, other, second];

        assign_parts(&mut batches);

        let parts: Vec<usize> = batches.iter().map(|b| b.part).collect();
        assert_eq!(parts, vec![0, 0, 1]);
        assert_eq!(batches[0].file_stem(), batches[0].id);
        assert_eq!(batches[2].file_stem(), format!("{}-1", batches[2].id));
    }

    #[test]
    fn test_score_is_finite() {
        assert!(Score::Int(1).is_finite());
        assert!(Score::Float(0.5).is_finite());
        assert!(!Score::Float(f64::NAN).is_finite());
        assert!(!Score::Float(f64::INFINITY).is_finite());
    }

    #[test]
    fn test_with_records_keeps_identity() {
        let batch = RecordBatch::new(vec![PathBuf::from("a.jsonl")], vec![Record::with_text("x")]);
        let narrowed = batch.with_records(Vec::new());
        assert_eq!(narrowed.id, batch.id);
        assert_eq!(narrowed.source_files, batch.source_files);
        assert!(narrowed.is_empty());
    }
}
