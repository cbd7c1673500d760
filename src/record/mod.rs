//! Records and the batches that carry them between stages.

pub mod types;

pub use types::{assign_parts, batch_id, Record, RecordBatch, Score, DEFAULT_TEXT_FIELD};
