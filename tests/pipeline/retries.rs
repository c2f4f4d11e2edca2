use std::sync::Arc;
use std::time::Duration;

use chainfold::corpus::Item;
use chainfold::pipeline::testing::{ScriptedInference, ScriptedReply};
use chainfold::pipeline::{build, ExperimentConfig, ExperimentKind, PipelineDriver, StageResult};

fn item() -> Item {
    Item {
        seq_a: "GGCA".to_string(),
        seq_b: "TGCC".to_string(),
        energy: -4.9,
        pairing_mask: "11111111".to_string(),
        structure: "((((+))))".to_string(),
    }
}

fn config(kind: ExperimentKind, condition: Option<&str>, max_tries: u32) -> ExperimentConfig {
    ExperimentConfig {
        kind,
        condition: condition.map(str::to_string),
        train_size: 10000,
        max_tries,
        registry_dir: "./model_ids".into(),
        models: Some(vec!["ft:expert".to_string()]),
        design_rounds: 20,
    }
}

#[tokio::test]
async fn timeouts_and_transient_failures_never_exhaust_a_stage() {
    // max_tries of 1 would fail the stage on a single rejection, so an
    // accepted outcome here proves neither setback was counted as one.
    let experiment = build(&config(ExperimentKind::ReverseComplement, None, 1))
        .expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::Hang,
        ScriptedReply::Transient,
        ScriptedReply::text("GGCA"),
    ]));
    let driver = PipelineDriver::new(port, Duration::from_millis(25), Duration::from_millis(1));

    let trace = driver
        .run_item(&experiment.stages, &item())
        .await
        .expect("run should succeed");

    let record = &trace.records[0];
    assert_eq!(record.result, StageResult::accepted("GGCA"));
    assert_eq!(record.invocations, 3);
    assert_eq!(record.rejections, 0);
}

#[tokio::test]
async fn malformed_replies_consume_the_try_budget() {
    let experiment = build(&config(ExperimentKind::ReverseComplement, None, 3))
        .expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("GGC"),
        ScriptedReply::text("GGCAA"),
        ScriptedReply::text("GGCA"),
    ]));

    let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));
    let trace = driver
        .run_item(&experiment.stages, &item())
        .await
        .expect("run should succeed");

    let record = &trace.records[0];
    assert_eq!(record.result, StageResult::accepted("GGCA"));
    assert_eq!(record.invocations, 3);
    assert_eq!(record.rejections, 2);
}

#[tokio::test]
async fn no_error_check_runs_are_graded_on_the_first_reply() {
    // The configured budget is ignored for this condition.
    let experiment = build(&config(
        ExperimentKind::SecondaryStructure,
        Some("chain_of_thought_no_error_check"),
        21,
    ))
    .expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("a reply with no answer marker"),
        ScriptedReply::text("never requested"),
    ]));
    let calls = Arc::clone(&port.calls);

    let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));
    let trace = driver
        .run_item(&experiment.stages, &item())
        .await
        .expect("a failed item still yields a trace");

    let record = &trace.records[0];
    assert_eq!(record.result, StageResult::Failed);
    assert_eq!(record.invocations, 1);
    assert_eq!(record.rejections, 1);
    assert_eq!(calls.lock().await.len(), 1);
}
