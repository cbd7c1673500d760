//! End-to-end tests for the quality filtering pipeline.
//!
//! Each test writes JSONL input into a temporary directory, runs the reader,
//! five quality filters and the writer, and inspects the output directory.

mod common;

use std::path::Path;

use async_trait::async_trait;

use common::{
    prose, quality_pipeline, read_output, read_output_files, runtime_config, write_jsonl,
};
use curate_forge::prelude::*;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

fn mixed_records() -> Vec<Value> {
    let unpunctuated = (0..10)
        .map(|i| format!("line {i} carries a few plain words without a stop"))
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        json!({"id": 1, "text": "short"}),
        json!({"id": 2, "text": prose(25)}),
        json!({"id": 3, "text": "@@ ## ".repeat(30)}),
        json!({"id": 4, "text": "this line repeats over and over.\n".repeat(12)}),
        json!({"id": 5, "text": unpunctuated}),
        json!({"id": 6, "text": format!("{} Read our privacy policy before continuing.", prose(6))}),
    ]
}

async fn run(pipeline: &Pipeline, workers: usize) -> Result<PipelineResult, PipelineError> {
    let mut client = RuntimeClient::new(runtime_config(workers));
    client
        .scope(|runtime| async move { pipeline.run(&runtime).await })
        .await
}

fn without_field(record: &Value, field: &str) -> Value {
    let map: Map<String, Value> = record
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| k.as_str() != field)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(map)
}

fn setup(records: &[Value]) -> anyhow::Result<(TempDir, std::path::PathBuf, std::path::PathBuf)> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    let output = dir.path().join("filtered_data");
    write_jsonl(&input.join("part-0.jsonl"), records)?;
    Ok((dir, input, output))
}

#[tokio::test]
async fn test_only_clean_prose_survives() -> anyhow::Result<()> {
    let (_dir, input, output) = setup(&mixed_records())?;

    let result = run(&quality_pipeline(&input, &output), 4).await?;
    let records = read_output(&output)?;

    assert_eq!(records.len(), 1);
    let kept = &records[0];
    assert_eq!(kept["id"], json!(2));
    assert!(records.iter().all(|r| r["text"] != json!("short")));

    let text = kept["text"].as_str().unwrap_or_default();
    assert_eq!(text.split_whitespace().count(), 250);
    assert_eq!(kept["word_count"], json!(250));

    assert_eq!(result.records_read(), 6);
    assert_eq!(result.records_written(), 1);
    assert_eq!(result.records_dropped(), 5);
    Ok(())
}

#[tokio::test]
async fn test_each_filter_drops_its_record() -> anyhow::Result<()> {
    let (_dir, input, output) = setup(&mixed_records())?;

    let result = run(&quality_pipeline(&input, &output), 2).await?;

    let dropped: Vec<(String, usize)> = result
        .stages
        .iter()
        .filter(|s| s.kind == StageKind::Transform)
        .map(|s| (s.name.clone(), s.records_dropped()))
        .collect();
    assert_eq!(
        dropped,
        vec![
            ("score_filter:word_count".to_string(), 1),
            ("score_filter:non_alpha_numeric".to_string(), 1),
            ("score_filter:repeated_lines".to_string(), 1),
            ("score_filter:punctuation".to_string(), 1),
            ("score_filter:boilerplate".to_string(), 1),
        ]
    );

    let indices: Vec<usize> = result.stages.iter().map(|s| s.index).collect();
    assert_eq!(indices, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn test_output_is_subset_of_input() -> anyhow::Result<()> {
    let mut records = mixed_records();
    records.push(json!({"id": 7, "text": prose(8), "lang": "en"}));
    records.push(json!({"id": 8, "text": prose(40)}));
    let (_dir, input, output) = setup(&records)?;

    run(&quality_pipeline(&input, &output), 3).await?;
    let kept = read_output(&output)?;

    assert_eq!(kept.len(), 3);
    for record in &kept {
        let original = without_field(record, "word_count");
        assert!(records.contains(&original), "fabricated record: {record}");
    }
    Ok(())
}

#[tokio::test]
async fn test_added_field_survives_later_stages() -> anyhow::Result<()> {
    let records = vec![
        json!({"id": "a", "text": prose(5), "source": "web"}),
        json!({"id": "b", "text": prose(12)}),
    ];
    let (_dir, input, output) = setup(&records)?;

    run(&quality_pipeline(&input, &output), 2).await?;
    let kept = read_output(&output)?;

    assert_eq!(kept.len(), 2);
    for record in &kept {
        let text = record["text"].as_str().unwrap_or_default();
        assert_eq!(
            record["word_count"],
            json!(text.split_whitespace().count())
        );
    }

    // Appended fields follow the original ones.
    let keys: Vec<&String> = kept[0].as_object().map(|o| o.keys().collect()).unwrap_or_default();
    assert_eq!(keys, vec!["id", "text", "source", "word_count"]);
    Ok(())
}

#[tokio::test]
async fn test_rerun_produces_identical_output() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    let output = dir.path().join("filtered_data");
    write_jsonl(&input.join("a.jsonl"), &mixed_records())?;
    write_jsonl(&input.join("nested/b.jsonl"), &[json!({"text": prose(9)})])?;

    let pipeline = quality_pipeline(&input, &output);

    run(&pipeline, 2).await?;
    let first = read_output_files(&output)?;
    run(&pipeline, 4).await?;
    let second = read_output_files(&output)?;

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_empty_input_directory_fails_at_reader() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    std::fs::create_dir_all(&input)?;
    let output = dir.path().join("filtered_data");

    let err = run(&quality_pipeline(&input, &output), 1)
        .await
        .expect_err("empty input should fail");

    assert_eq!(err.stage(), Some("jsonl_reader"));
    assert_eq!(err.stage_index(), Some(0));
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            source: StageError::NoInputFiles { .. },
            ..
        }
    ));
    assert!(!output.exists());
    Ok(())
}

fn write_with_malformed_line(input: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(input)?;
    let good = serde_json::to_string(&json!({"text": prose(6)}))?;
    std::fs::write(
        input.join("part-0.jsonl"),
        format!("{good}\nnot json at all\n{good}\n"),
    )?;
    Ok(())
}

#[tokio::test]
async fn test_malformed_line_fails_by_default() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    let output = dir.path().join("filtered_data");
    write_with_malformed_line(&input)?;

    let err = run(&quality_pipeline(&input, &output), 1)
        .await
        .expect_err("malformed line should fail");

    match err {
        PipelineError::StageFailed { stage, index, source } => {
            assert_eq!(stage, "jsonl_reader");
            assert_eq!(index, 0);
            assert!(matches!(source, StageError::MalformedRecord { line: 2, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_malformed_line_skipped_when_configured() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    let output = dir.path().join("filtered_data");
    write_with_malformed_line(&input)?;

    let reader = JsonlReader::from_config(
        ReaderConfig::default()
            .with_input_path(&input)
            .with_on_malformed(MalformedPolicy::Skip),
    );
    let pipeline = Pipeline::new("lenient")
        .with_stage(reader)
        .with_stage(common::word_count())
        .with_stage(JsonlWriter::new(&output));

    let result = run(&pipeline, 1).await?;

    assert_eq!(result.records_read(), 2);
    assert_eq!(read_output(&output)?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_yaml_config_drives_run() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("input_data");
    let output = dir.path().join("filtered_data");
    for name in ["a.jsonl", "b.jsonl", "c.jsonl"] {
        write_jsonl(&input.join(name), &[json!({"text": prose(7)})])?;
    }

    let yaml = format!(
        "runtime:\n  num_workers: 2\n  shutdown_timeout_secs: 10\n\
         reader:\n  input_path: {}\n  files_per_partition: 2\n\
         writer:\n  output_path: {}\n  mode: error\n",
        input.display(),
        output.display()
    );
    let config = CurationConfig::from_yaml_str(&yaml)?;

    let pipeline = Pipeline::new("configured")
        .with_stage(JsonlReader::from_config(config.reader.clone()))
        .with_stage(common::word_count())
        .with_stage(JsonlWriter::from_config(config.writer.clone()));
    let pipeline = &pipeline;

    let mut client = RuntimeClient::new(config.runtime.clone());
    let result = client
        .scope(|runtime| async move { pipeline.run(&runtime).await })
        .await?;

    let reader = result.stage("jsonl_reader").expect("reader report");
    assert_eq!(reader.batches_out, 2);
    assert_eq!(read_output_files(&output)?.len(), 2);
    assert_eq!(read_output(&output)?.len(), 3);

    // `error` mode refuses to write into the now non-empty directory.
    let err = client
        .scope(|runtime| async move { pipeline.run(&runtime).await })
        .await
        .expect_err("existing output should be refused");
    assert_eq!(err.stage(), Some("jsonl_writer"));
    assert_eq!(err.stage_index(), Some(2));
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            source: StageError::OutputExists(_),
            ..
        }
    ));
    Ok(())
}

/// Splits every batch into single-record batches sharing the parent's id.
struct SplitPerRecord;

#[async_trait]
impl Stage for SplitPerRecord {
    fn name(&self) -> &str {
        "split_per_record"
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    async fn process(&self, batch: RecordBatch) -> StageResult<Vec<RecordBatch>> {
        Ok(batch
            .records
            .iter()
            .map(|record| batch.with_records(vec![record.clone()]))
            .collect())
    }
}

#[tokio::test]
async fn test_split_batches_all_reach_disk() -> anyhow::Result<()> {
    let records: Vec<Value> = (0..4).map(|i| json!({"id": i, "text": prose(1)})).collect();
    let (_dir, input, output) = setup(&records)?;

    let pipeline = Pipeline::new("split")
        .with_stage(JsonlReader::new(&input))
        .with_stage(SplitPerRecord)
        .with_stage(JsonlWriter::new(&output));
    let result = run(&pipeline, 2).await?;

    assert_eq!(result.records_written(), 4);
    assert_eq!(read_output_files(&output)?.len(), 4);
    let mut ids: Vec<i64> = read_output(&output)?
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_writer_over_input_is_rejected() -> anyhow::Result<()> {
    let (_dir, input, _output) = setup(&[json!({"text": prose(6)})])?;

    let err = run(&quality_pipeline(&input, &input), 1)
        .await
        .expect_err("writing over the input should fail");

    assert!(matches!(err, PipelineError::PathConflict { .. }));
    assert!(input.join("part-0.jsonl").exists());
    Ok(())
}

#[tokio::test]
async fn test_output_nested_in_input_is_rejected() -> anyhow::Result<()> {
    let (_dir, input, _output) = setup(&[json!({"text": prose(6)})])?;
    let nested = input.join("filtered");

    let err = run(&quality_pipeline(&input, &nested), 1)
        .await
        .expect_err("output inside the input should fail");

    assert!(matches!(err, PipelineError::PathConflict { .. }));
    assert!(!nested.exists());
    assert!(input.join("part-0.jsonl").exists());
    Ok(())
}
