use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chainfold::corpus::Item;
use chainfold::pipeline::testing::{ScriptedInference, ScriptedReply};
use chainfold::pipeline::{build, ExperimentConfig, ExperimentKind, PipelineDriver, StageId};
use chainfold::score::score;
use chainfold::trace::{read_traces, TraceWriter};
use uuid::Uuid;

fn items() -> Vec<Item> {
    vec![
        Item {
            seq_a: "GGCA".to_string(),
            seq_b: "TGCC".to_string(),
            energy: -4.9,
            pairing_mask: "11111111".to_string(),
            structure: "((((+))))".to_string(),
        },
        Item {
            seq_a: "GGTT".to_string(),
            seq_b: "AACC".to_string(),
            energy: -3.0,
            pairing_mask: "11111111".to_string(),
            structure: "((((+))))".to_string(),
        },
        Item {
            seq_a: "GCGC".to_string(),
            seq_b: "GCGC".to_string(),
            energy: -4.0,
            pairing_mask: "11111111".to_string(),
            structure: "((((+))))".to_string(),
        },
    ]
}

fn config(kind: ExperimentKind, max_tries: u32) -> ExperimentConfig {
    ExperimentConfig {
        kind,
        condition: None,
        train_size: 10000,
        max_tries,
        registry_dir: "./model_ids".into(),
        models: Some(vec!["ft:expert".to_string()]),
        design_rounds: 20,
    }
}

fn trace_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("chainfold-{label}-{}.jsonl", Uuid::now_v7()))
}

async fn run_and_write(
    experiment_config: &ExperimentConfig,
    replies: Vec<ScriptedReply>,
    path: &Path,
) {
    let experiment = build(experiment_config).expect("experiment should build");
    let port = Arc::new(ScriptedInference::new(replies));
    let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));

    let mut writer = TraceWriter::create(path).expect("creating the sink should succeed");
    for item in items() {
        let trace = driver
            .run_item(&experiment.stages, &item)
            .await
            .expect("run should succeed");
        writer.append(&trace).expect("append should succeed");
    }
    let written = writer.finish().expect("finish should succeed");
    assert_eq!(written, 3);
}

#[tokio::test]
async fn a_scripted_run_round_trips_through_the_file_into_the_summary() {
    let path = trace_path("summary");
    // One correct answer, one shape-valid wrong answer, one exhausted stage.
    run_and_write(
        &config(ExperimentKind::ReverseComplement, 2),
        vec![
            ScriptedReply::text("GGCA"),
            ScriptedReply::text("TTTT"),
            ScriptedReply::text("GC"),
            ScriptedReply::text("AAAAA"),
        ],
        &path,
    )
    .await;

    let traces = read_traces(&path).expect("reading back should succeed");
    let summary = score(&traces);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.exact_matches, 1);
    assert!((summary.accuracy_pct - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.failed_items, 1);
    assert_eq!(
        summary.first_divergence.get(&StageId::ReverseComplement),
        Some(&2)
    );
    assert!(summary.energy_error.is_none());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn energy_statistics_cover_accepted_predictions_after_the_round_trip() {
    let path = trace_path("energy");
    // Errors of 0.5 and 0.0; the unparseable reply fails its item instead.
    run_and_write(
        &config(ExperimentKind::FreeEnergy, 1),
        vec![
            ScriptedReply::text("-4.4"),
            ScriptedReply::text("-3.0"),
            ScriptedReply::text("around minus four"),
        ],
        &path,
    )
    .await;

    let traces = read_traces(&path).expect("reading back should succeed");
    let summary = score(&traces);

    assert_eq!(summary.failed_items, 1);
    let stats = summary.energy_error.expect("two predictions should be scored");
    assert_eq!(stats.scored, 2);
    assert!((stats.mean_absolute_error - 0.25).abs() < 1e-9);
    assert!((stats.std_deviation - 0.25).abs() < 1e-9);

    let _ = std::fs::remove_file(&path);
}
