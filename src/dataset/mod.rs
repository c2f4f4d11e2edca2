pub mod finetune;
pub mod generate;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fold::FoldError;

pub use finetune::{rows_for, training_file_name, write_training_rows, TrainingRow};
pub use generate::{generate, write_sets, GeneratedSets};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Unique duplexes to keep, training and validation together.
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_validation_size")]
    pub validation_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// Upper bound on mutated positions as a fraction of strand length.
    #[serde(default = "default_mismatch_fraction")]
    pub mismatch_fraction: f64,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            validation_size: default_validation_size(),
            seed: default_seed(),
            min_len: default_min_len(),
            max_len: default_max_len(),
            mismatch_fraction: default_mismatch_fraction(),
            out_dir: default_out_dir(),
        }
    }
}

fn default_size() -> usize {
    11_000
}

fn default_validation_size() -> usize {
    1_000
}

fn default_seed() -> u64 {
    23
}

fn default_min_len() -> usize {
    10
}

fn default_max_len() -> usize {
    25
}

fn default_mismatch_fraction() -> f64 {
    0.3
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./training_data")
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid dataset parameters: {0}")]
    InvalidParams(String),
    #[error("folding failed during generation: {0}")]
    Fold(#[from] FoldError),
    #[error("failed to write dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode dataset: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no fine-tune emission for this experiment: {0}")]
    Unsupported(String),
    #[error("{0}")]
    BadCondition(String),
}
