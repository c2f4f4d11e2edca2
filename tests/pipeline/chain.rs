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

fn chain_config(max_tries: u32) -> ExperimentConfig {
    ExperimentConfig {
        kind: ExperimentKind::ChainOfExperts,
        condition: None,
        train_size: 10000,
        max_tries,
        registry_dir: "./model_ids".into(),
        models: Some(vec![
            "ft:rev".to_string(),
            "ft:cmp".to_string(),
            "ft:pair".to_string(),
            "ft:conv".to_string(),
        ]),
        design_rounds: 20,
    }
}

fn driver(port: Arc<ScriptedInference>) -> PipelineDriver {
    PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1))
}

#[tokio::test]
async fn accepted_answers_feed_every_downstream_prompt() {
    let experiment = build(&chain_config(21)).expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("GGCA"),
        ScriptedReply::text("(GGCA,GGCA)GG:1 (GCA,GCA)GG:1 (CA,CA)CC:1 (A,A)AA:1 ans:1111"),
        ScriptedReply::text("working shown here ans:1111 1111"),
        ScriptedReply::text("((((+))))"),
    ]));
    let calls = Arc::clone(&port.calls);

    let trace = driver(port)
        .run_item(&experiment.stages, &item())
        .await
        .expect("run should succeed");

    let values: Vec<Option<&str>> = trace.records.iter().map(|r| r.result.value()).collect();
    assert_eq!(
        values,
        vec![Some("GGCA"), Some("1111"), Some("1111 1111"), Some("((((+))))")]
    );
    let expecteds: Vec<&str> = trace.records.iter().map(|r| r.expected.as_str()).collect();
    assert_eq!(expecteds, vec!["GGCA", "1111", "1111 1111", "((((+))))"]);
    assert!(trace.records.iter().all(|r| r.invocations == 1 && r.rejections == 0));

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 4);
    let models: Vec<&str> = calls.iter().map(|c| c.model.as_str()).collect();
    assert_eq!(models, vec!["ft:rev", "ft:cmp", "ft:pair", "ft:conv"]);
    // Each prompt is built from the previous stage's accepted answer, not
    // from ground truth.
    assert_eq!(calls[0].messages[1].content, "TGCC");
    assert_eq!(calls[1].messages[1].content, "GGCA GGCA");
    assert_eq!(calls[2].messages[1].content, "GGCA GGCA 1111");
    assert_eq!(calls[3].messages[1].content, "1111 1111");
}

#[tokio::test]
async fn a_wrong_upstream_answer_reaches_later_prompts_verbatim() {
    let experiment = build(&chain_config(21)).expect("experiment should build");
    // Shape-valid but wrong reverse complement.
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("TTTT"),
        ScriptedReply::text("steps ans:0001"),
        ScriptedReply::text("steps ans:0001 1000"),
        ScriptedReply::text("...(+)..."),
    ]));
    let calls = Arc::clone(&port.calls);

    let trace = driver(port)
        .run_item(&experiment.stages, &item())
        .await
        .expect("run should succeed");

    assert_eq!(trace.records[0].result, StageResult::accepted("TTTT"));
    assert_eq!(trace.records[0].expected, "GGCA");

    let calls = calls.lock().await;
    assert_eq!(calls[1].messages[1].content, "GGCA TTTT");
    assert_eq!(calls[2].messages[1].content, "GGCA TTTT 0001");
    assert_eq!(calls[3].messages[1].content, "0001 1000");
}

#[tokio::test]
async fn an_exhausted_stage_short_circuits_the_rest_of_the_chain() {
    let experiment = build(&chain_config(2)).expect("experiment should build");
    let port = Arc::new(ScriptedInference::new([
        ScriptedReply::text("GGCA"),
        ScriptedReply::text("a reply with no answer marker"),
        ScriptedReply::text("still nothing to extract"),
    ]));
    let calls = Arc::clone(&port.calls);

    let trace = driver(port)
        .run_item(&experiment.stages, &item())
        .await
        .expect("a failed item still yields a trace");

    assert_eq!(trace.records.len(), 4);
    assert_eq!(trace.records[0].result, StageResult::accepted("GGCA"));

    let failed = &trace.records[1];
    assert_eq!(failed.result, StageResult::Failed);
    assert_eq!(failed.invocations, 2);
    assert_eq!(failed.rejections, 2);

    for skipped in &trace.records[2..] {
        assert_eq!(skipped.result, StageResult::Failed);
        assert_eq!(skipped.invocations, 0);
        assert_eq!(skipped.rejections, 0);
    }

    // Stages after the failed one were never invoked.
    assert_eq!(calls.lock().await.len(), 3);
}
