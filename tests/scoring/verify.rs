use std::sync::Arc;
use std::time::Duration;

use chainfold::corpus::Item;
use chainfold::pipeline::testing::{
    complementarity_fold, HookedFold, ScriptedInference, ScriptedReply,
};
use chainfold::pipeline::{build, ExperimentConfig, ExperimentKind, PipelineDriver, StageResult};
use chainfold::score::verify_designs;
use chainfold::trace::{read_traces, TraceWriter};
use uuid::Uuid;

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
async fn designs_are_refolded_and_compared_to_the_target() {
    // Three designs for the same target: one that folds into it, one that
    // does not, and one where the designer never produced a pair.
    let scripts: Vec<Vec<ScriptedReply>> = vec![
        vec![
            ScriptedReply::text("working shown here ans:GGCA TGCC"),
            ScriptedReply::text("working shown here ans:((((+))))"),
        ],
        vec![
            ScriptedReply::text("working shown here ans:GGCA TTTT"),
            ScriptedReply::text("working shown here ans:...(+)..."),
        ],
        vec![ScriptedReply::text("a reply with no answer marker")],
    ];

    let path = std::env::temp_dir().join(format!("chainfold-verify-{}.jsonl", Uuid::now_v7()));
    let experiment = build(&design_config(1)).expect("experiment should build");
    let mut writer = TraceWriter::create(&path).expect("creating the sink should succeed");
    for replies in scripts {
        let port = Arc::new(ScriptedInference::new(replies));
        let driver = PipelineDriver::new(port, Duration::from_secs(5), Duration::from_millis(1));
        let trace = driver
            .run_item(&experiment.stages, &item())
            .await
            .expect("run should succeed");
        writer.append(&trace).expect("append should succeed");
    }
    writer.finish().expect("finish should succeed");

    let traces = read_traces(&path).expect("reading back should succeed");
    let fold = HookedFold::new(Arc::new(complementarity_fold));
    let verifications = verify_designs(&traces, &fold)
        .await
        .expect("verification should succeed");

    assert_eq!(verifications.len(), 3);

    let achieved = &verifications[0];
    assert_eq!(achieved.designed_a.as_deref(), Some("GGCA"));
    assert_eq!(achieved.designed_b.as_deref(), Some("TGCC"));
    assert_eq!(achieved.achieved.as_deref(), Some("((((+))))"));
    assert!(achieved.achieved_target());

    // The checker agreed with the refold here, but the design still misses
    // the target.
    let missed = &verifications[1];
    assert_eq!(missed.achieved.as_deref(), Some("...(+)..."));
    assert_eq!(missed.checker, StageResult::accepted("...(+)..."));
    assert!(!missed.achieved_target());

    let unproduced = &verifications[2];
    assert_eq!(unproduced.designed_a, None);
    assert_eq!(unproduced.achieved, None);
    assert_eq!(unproduced.checker, StageResult::Failed);
    assert!(!unproduced.achieved_target());

    let _ = std::fs::remove_file(&path);
}
