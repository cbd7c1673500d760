//! Shared helpers for integration tests.
//!
//! The document filters here are small stand-ins for real quality
//! heuristics. They are deliberately simple so expected outcomes can be
//! worked out by hand.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use curate_forge::prelude::*;
use serde_json::Value;

/// Keeps documents with `min_words..=max_words` whitespace-separated words.
pub struct WordCountFilter {
    pub min_words: usize,
    pub max_words: usize,
}

impl DocumentFilter for WordCountFilter {
    fn name(&self) -> &str {
        "word_count"
    }

    fn score_document(&self, text: &str) -> Score {
        Score::from(text.split_whitespace().count())
    }

    fn keep_document(&self, score: &Score) -> bool {
        let words = score.as_f64();
        words >= self.min_words as f64 && words <= self.max_words as f64
    }
}

/// Drops documents whose non-whitespace characters are mostly symbols.
pub struct NonAlphaNumericFilter {
    pub max_ratio: f64,
}

impl DocumentFilter for NonAlphaNumericFilter {
    fn name(&self) -> &str {
        "non_alpha_numeric"
    }

    fn score_document(&self, text: &str) -> Score {
        let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if visible.is_empty() {
            return Score::from(1.0);
        }
        let symbols = visible.iter().filter(|c| !c.is_alphanumeric()).count();
        Score::from(symbols as f64 / visible.len() as f64)
    }

    fn keep_document(&self, score: &Score) -> bool {
        score.as_f64() <= self.max_ratio
    }
}

/// Drops documents where too many lines are repeats of earlier lines.
pub struct RepeatedLinesFilter {
    pub max_fraction: f64,
}

impl DocumentFilter for RepeatedLinesFilter {
    fn name(&self) -> &str {
        "repeated_lines"
    }

    fn score_document(&self, text: &str) -> Score {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Score::from(0.0);
        }
        let mut seen = std::collections::HashSet::new();
        let repeated = lines.iter().filter(|l| !seen.insert(**l)).count();
        Score::from(repeated as f64 / lines.len() as f64)
    }

    fn keep_document(&self, score: &Score) -> bool {
        score.as_f64() <= self.max_fraction
    }
}

/// Drops documents where too many lines lack terminal punctuation.
pub struct PunctuationFilter {
    pub max_ratio: f64,
}

impl DocumentFilter for PunctuationFilter {
    fn name(&self) -> &str {
        "punctuation"
    }

    fn score_document(&self, text: &str) -> Score {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Score::from(1.0);
        }
        let unterminated = lines
            .iter()
            .filter(|l| !l.ends_with(['.', '!', '?', '"']))
            .count();
        Score::from(unterminated as f64 / lines.len() as f64)
    }

    fn keep_document(&self, score: &Score) -> bool {
        score.as_f64() <= self.max_ratio
    }
}

/// Drops documents containing common web boilerplate.
pub struct BoilerPlateStringFilter;

const BOILERPLATE: &[&str] = &[
    "lorem ipsum",
    "privacy policy",
    "terms of use",
    "cookie policy",
    "uses cookies",
    "use of cookies",
];

impl DocumentFilter for BoilerPlateStringFilter {
    fn name(&self) -> &str {
        "boilerplate"
    }

    fn score_document(&self, text: &str) -> Score {
        let lower = text.to_lowercase();
        Score::from(BOILERPLATE.iter().any(|p| lower.contains(p)))
    }

    fn keep_document(&self, score: &Score) -> bool {
        matches!(score, Score::Bool(false))
    }
}

pub fn word_count() -> ScoreFilter {
    ScoreFilter::new(Arc::new(WordCountFilter {
        min_words: 50,
        max_words: 100_000,
    }))
    .with_score_field("word_count")
}

pub fn non_alpha_numeric() -> ScoreFilter {
    ScoreFilter::new(Arc::new(NonAlphaNumericFilter { max_ratio: 0.25 }))
}

pub fn repeated_lines() -> ScoreFilter {
    ScoreFilter::new(Arc::new(RepeatedLinesFilter { max_fraction: 0.7 }))
}

pub fn punctuation() -> ScoreFilter {
    ScoreFilter::new(Arc::new(PunctuationFilter { max_ratio: 0.85 }))
}

pub fn boilerplate() -> ScoreFilter {
    ScoreFilter::new(Arc::new(BoilerPlateStringFilter))
}

/// The reader, five quality filters and the writer, in that order.
pub fn quality_pipeline(input: &Path, output: &Path) -> Pipeline {
    let mut pipeline = Pipeline::new("quality_filtering");
    pipeline
        .add_stage(JsonlReader::new(input))
        .add_stage(word_count())
        .add_stage(non_alpha_numeric())
        .add_stage(repeated_lines())
        .add_stage(punctuation())
        .add_stage(boilerplate())
        .add_stage(JsonlWriter::new(output));
    pipeline
}

const SENTENCES: &[&str] = &[
    "The river wound slowly through the valley beneath tall pines.",
    "Farmers gathered early each morning to sell fresh vegetables there.",
    "Children walked along the dusty road carrying books to school.",
    "An old bridge of grey stone connected both quiet villages.",
    "In winter the water froze and travellers crossed on foot.",
];

/// A single paragraph of ten-word sentences.
pub fn prose(sentences: usize) -> String {
    SENTENCES
        .iter()
        .cycle()
        .take(sentences)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes one JSON value per line.
pub fn write_jsonl(path: &Path, records: &[Value]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut contents = String::new();
    for record in records {
        contents.push_str(&serde_json::to_string(record)?);
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Output files keyed by file name.
pub fn read_output_files(dir: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        files.insert(name, fs::read_to_string(entry.path())?);
    }
    Ok(files)
}

/// Every output record, ordered by file name then line.
pub fn read_output(dir: &Path) -> anyhow::Result<Vec<Value>> {
    let mut records = Vec::new();
    for contents in read_output_files(dir)?.values() {
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
    }
    Ok(records)
}

pub fn runtime_config(workers: usize) -> RuntimeConfig {
    RuntimeConfig::new(workers).with_shutdown_timeout(std::time::Duration::from_secs(10))
}
