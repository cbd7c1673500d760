//! Pipeline stages.
//!
//! Every step of a pipeline implements [`Stage`]. The crate ships three
//! families:
//!
//! - **Sources** produce batches from an external origin
//!   ([`crate::io::JsonlReader`]).
//! - **Transforms** score, annotate or drop records ([`ScoreFilter`],
//!   [`ScoreStage`], [`FilterStage`]). The scoring heuristics are supplied by
//!   the caller through [`DocumentFilter`].
//! - **Sinks** persist records ([`crate::io::JsonlWriter`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use curate_forge::record::Score;
//! use curate_forge::stages::{FnFilter, ScoreFilter};
//!
//! let word_count = FnFilter::new(
//!     "word_count",
//!     |text| Score::from(text.split_whitespace().count()),
//!     |score| (50.0..=100_000.0).contains(&score.as_f64()),
//! );
//! let stage = ScoreFilter::new(Arc::new(word_count)).with_score_field("word_count");
//! ```

pub mod filter;
pub mod score_filter;
pub mod stage;

pub use filter::{DocumentFilter, FnFilter};
pub use score_filter::{FilterStage, ScoreFilter, ScoreStage};
pub use stage::{Stage, StageKind};
