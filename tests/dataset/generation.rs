use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chainfold::corpus;
use chainfold::dataset::{generate, write_sets, DatasetConfig, DatasetError};
use chainfold::dna;
use chainfold::pipeline::testing::{complementarity_fold, HookedFold};
use uuid::Uuid;

fn small_config(out_dir: PathBuf) -> DatasetConfig {
    DatasetConfig {
        size: 8,
        validation_size: 2,
        seed: 23,
        min_len: 4,
        max_len: 6,
        mismatch_fraction: 0.3,
        out_dir,
    }
}

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("chainfold-{label}-{}", Uuid::now_v7()))
}

#[tokio::test]
async fn generated_corpora_load_back_through_corpus_validation() {
    let dir = temp_dir("dataset");
    let config = small_config(dir.clone());
    let fold = HookedFold::new(Arc::new(complementarity_fold));

    let sets = generate(&config, &fold).await.expect("generation should succeed");
    assert_eq!(sets.train.len(), 6);
    assert_eq!(sets.validation.len(), 2);

    let (train_path, validation_path) =
        write_sets(&dir, &sets).expect("writing the sets should succeed");
    assert!(train_path.ends_with("sequence_train_set.json"));
    assert!(validation_path.ends_with("sequence_validation_set.json"));

    // load_items re-runs the full row validation, so a corpus that loads is
    // structurally sound.
    let train = corpus::load_items(&train_path).expect("train set should load");
    let validation = corpus::load_items(&validation_path).expect("validation set should load");
    assert_eq!(train.len(), 6);
    assert_eq!(validation.len(), 2);

    let mut pairs: HashSet<(String, String)> = HashSet::new();
    for item in train.iter().chain(validation.iter()) {
        assert!(pairs.insert((item.seq_a.clone(), item.seq_b.clone())));
        // Every pair carries at least one mutation away from a perfect duplex.
        assert_ne!(dna::reverse_complement(&item.seq_a), item.seq_b);
        assert!((4..=6).contains(&item.strand_len()));
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn the_same_seed_reproduces_the_same_sets() {
    let config = small_config(temp_dir("dataset-repeat"));
    let fold = HookedFold::new(Arc::new(complementarity_fold));

    let first = generate(&config, &fold).await.expect("generation should succeed");
    let second = generate(&config, &fold).await.expect("generation should succeed");
    assert_eq!(first, second);
}

#[tokio::test]
async fn unusable_parameters_are_rejected_up_front() {
    let fold = HookedFold::new(Arc::new(complementarity_fold));

    let mut config = small_config(temp_dir("dataset-params"));
    config.min_len = 0;
    let err = generate(&config, &fold)
        .await
        .expect_err("zero-length strands should be rejected");
    assert!(matches!(err, DatasetError::InvalidParams(_)));

    let mut config = small_config(temp_dir("dataset-params"));
    config.validation_size = config.size;
    let err = generate(&config, &fold)
        .await
        .expect_err("validation set consuming everything should be rejected");
    assert!(matches!(err, DatasetError::InvalidParams(_)));
}
