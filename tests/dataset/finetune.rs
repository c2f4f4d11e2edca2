use chainfold::corpus::Item;
use chainfold::dataset::{rows_for, training_file_name, write_training_rows, TrainingRow};
use chainfold::gateway::types::ChatRole;
use chainfold::pipeline::ExperimentKind;
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
    ]
}

#[test]
fn emitted_files_hold_one_chat_exchange_per_line() {
    let rows = rows_for(
        ExperimentKind::SecondaryStructure,
        Some("chain_of_thought"),
        &items(),
    )
    .expect("emission should succeed");
    assert_eq!(rows.len(), 2);

    let path = std::env::temp_dir().join(format!(
        "chainfold-finetune-test-{}/{}",
        Uuid::now_v7(),
        training_file_name(ExperimentKind::SecondaryStructure, "chain_of_thought", 10000),
    ));
    assert!(path.ends_with("secondary_structure_chain_of_thought_train_size_10000.jsonl"));

    let written = write_training_rows(&path, &rows).expect("writing should succeed");
    assert_eq!(written, 2);

    let content = std::fs::read_to_string(&path).expect("reading back should succeed");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: TrainingRow = serde_json::from_str(lines[0]).expect("line should decode");
    assert_eq!(first.messages.len(), 3);
    assert_eq!(first.messages[0].role, ChatRole::System);
    assert_eq!(first.messages[1].role, ChatRole::User);
    assert_eq!(first.messages[1].content, "GGCA TGCC");
    assert_eq!(first.messages[2].role, ChatRole::Assistant);
    assert!(first.messages[2].content.ends_with("ans:((((+))))"));

    let second: TrainingRow = serde_json::from_str(lines[1]).expect("line should decode");
    assert_eq!(second.messages[1].content, "GGTT AACC");

    let parent = path.parent().expect("the file sits in a directory");
    let _ = std::fs::remove_dir_all(parent);
}

#[test]
fn every_standalone_experiment_emits_under_its_default_condition() {
    let items = items();
    for kind in [
        ExperimentKind::ReverseComplement,
        ExperimentKind::BaseComparison,
        ExperimentKind::BasePairing,
        ExperimentKind::StructureConversion,
        ExperimentKind::SecondaryStructure,
        ExperimentKind::FreeEnergy,
        ExperimentKind::SequenceDesign,
    ] {
        let rows = rows_for(kind, None, &items)
            .unwrap_or_else(|err| panic!("emission for {kind} should succeed: {err}"));
        assert_eq!(rows.len(), 2, "emission for {kind}");
        for row in &rows {
            assert_eq!(row.messages.len(), 3, "emission for {kind}");
            assert_eq!(row.messages[0].role, ChatRole::System);
            assert_eq!(row.messages[1].role, ChatRole::User);
            assert_eq!(row.messages[2].role, ChatRole::Assistant);
            assert!(!row.messages[2].content.is_empty(), "emission for {kind}");
        }
    }
}

#[test]
fn the_chain_trains_no_model_of_its_own() {
    let err = rows_for(ExperimentKind::ChainOfExperts, None, &items())
        .expect_err("the chain reuses the standalone experts");
    let message = err.to_string();
    assert!(message.contains("chain_of_experts"), "got: {message}");
}
