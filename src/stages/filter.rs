//! Pluggable document scoring.
//!
//! Concrete heuristics live with the caller. A heuristic implements
//! [`DocumentFilter`] and is handed to a transform stage at pipeline
//! construction time.

use std::fmt;
use std::sync::Arc;

use crate::record::Score;

/// Scores a document's text and decides whether to keep it.
///
/// Boundary handling (inclusive or exclusive thresholds) is entirely up to
/// `keep_document`; stages apply it as given.
pub trait DocumentFilter: Send + Sync {
    /// Short name used in stage names and logs.
    fn name(&self) -> &str;

    /// Computes the score for a document's text.
    fn score_document(&self, text: &str) -> Score;

    /// Whether a document with this score should be kept.
    fn keep_document(&self, score: &Score) -> bool;
}

type ScoreFn = dyn Fn(&str) -> Score + Send + Sync;
type KeepFn = dyn Fn(&Score) -> bool + Send + Sync;

/// A [`DocumentFilter`] assembled from two closures.
#[derive(Clone)]
pub struct FnFilter {
    name: String,
    score: Arc<ScoreFn>,
    keep: Arc<KeepFn>,
}

impl FnFilter {
    /// Creates a filter from a scoring function and a keep-predicate.
    pub fn new<S, K>(name: impl Into<String>, score: S, keep: K) -> Self
    where
        S: Fn(&str) -> Score + Send + Sync + 'static,
        K: Fn(&Score) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            score: Arc::new(score),
            keep: Arc::new(keep),
        }
    }

    /// A filter that only scores and keeps every document.
    pub fn scorer<S>(name: impl Into<String>, score: S) -> Self
    where
        S: Fn(&str) -> Score + Send + Sync + 'static,
    {
        Self::new(name, score, |_| true)
    }
}

impl DocumentFilter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn score_document(&self, text: &str) -> Score {
        (self.score)(text)
    }

    fn keep_document(&self, score: &Score) -> bool {
        (self.keep)(score)
    }
}

impl fmt::Debug for FnFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}
