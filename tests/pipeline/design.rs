use std::sync::Arc;
use std::time::Duration;

use chainfold::corpus::Item;
use chainfold::pipeline::testing::{ScriptedInference, ScriptedReply};
use chainfold::pipeline::{
    build, prompts, ExperimentConfig, ExperimentKind, PipelineDriver, StageId, StageResult,
};

fn item() -> Item {
    Item {
        seq_a: "GGCA".to_string(),
        seq_b: "TGCC".to_string(),
        energy: -4.9,
        pairing_mask: "11111111".to_string(),
        structure: "((((+))))".to_string(),
    }
}

fn design_config(max_tries: u32) -> ExperimentConfig {
    ExperimentConfig {
        kind: ExperimentKind::SequenceDesign,
        condition: Some("rationale".to_string()),
        train_size: 10000,
        max_tries,
        registry_dir: "./model_ids".into(),
        models: Some(vec!["ft:designer".to_string(), "ft:checker".to_string()]),
        design_rounds: 20,
    }
}

#[tokio::test]
async fn the_checker_folds_the_designed_pair_not_the_corpus_strands() {
    let experiment = build(&design_config(21)).expect("experiment should build");
    assert_eq!(experiment.design_rounds, 20);

    // A design that differs from the corpus strands, so prompt reuse of the
    // originals would be visible.
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("working shown here ans:GCCA TGGC"),
        ScriptedReply::text("working shown here ans:((((+))))"),
    ]));
    let calls = Arc::clone(&port.calls);

    let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));
    let trace = driver
        .run_item(&experiment.stages, &item())
        .await
        .expect("run should succeed");

    assert_eq!(trace.records[0].stage, StageId::SequenceDesign);
    assert_eq!(trace.records[0].result, StageResult::accepted("GCCA TGGC"));
    assert_eq!(trace.records[0].expected, "GGCA TGCC");
    assert_eq!(trace.records[1].stage, StageId::StructureCheck);
    assert_eq!(trace.records[1].result, StageResult::accepted("((((+))))"));

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].model, "ft:designer");
    assert_eq!(calls[0].messages[0].content, prompts::SEQUENCE_DESIGN);
    assert_eq!(calls[0].messages[1].content, "((((+))))");
    assert_eq!(calls[1].model, "ft:checker");
    assert_eq!(calls[1].messages[0].content, prompts::SECONDARY_STRUCTURE);
    assert_eq!(calls[1].messages[1].content, "GCCA TGGC");
}

#[tokio::test]
async fn a_failed_design_skips_the_checker() {
    let experiment = build(&design_config(1)).expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([ScriptedReply::text(
        "a reply with no answer marker",
    )]));
    let calls = Arc::clone(&port.calls);

    let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));
    let trace = driver
        .run_item(&experiment.stages, &item())
        .await
        .expect("a failed item still yields a trace");

    assert_eq!(trace.records[0].result, StageResult::Failed);
    assert_eq!(trace.records[1].stage, StageId::StructureCheck);
    assert_eq!(trace.records[1].result, StageResult::Failed);
    assert_eq!(trace.records[1].invocations, 0);
    assert_eq!(calls.lock().await.len(), 1);
}
