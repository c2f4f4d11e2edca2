use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Thermodynamic analysis of a two-strand complex.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    /// Minimum free energy structure over both strands, '+' at the break.
    pub structure: String,
    /// Equilibrium pair probabilities, one row and column per base across
    /// both strands (diagonal holds the unpaired probability).
    pub pair_probabilities: Vec<Vec<f64>>,
    /// Free energy of the complex in kcal/mol.
    pub free_energy: f64,
}

#[derive(Debug, Error)]
pub enum FoldError {
    #[error("folding backend is not available: {0}")]
    Unavailable(String),
    #[error("folding backend rejected the strands: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait FoldPort: Send + Sync {
    async fn fold(&self, seq_a: &str, seq_b: &str) -> Result<FoldOutcome, FoldError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FoldBackend {
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FoldConfig {
    #[serde(default)]
    pub backend: FoldBackend,
}

pub fn build_fold(config: &FoldConfig) -> Arc<dyn FoldPort> {
    match config.backend {
        FoldBackend::None => Arc::new(NoopFold),
    }
}

/// Placeholder until an external folding backend is wired in. Every call
/// reports the backend as missing so callers fail with a clear message.
pub struct NoopFold;

#[async_trait]
impl FoldPort for NoopFold {
    async fn fold(&self, _seq_a: &str, _seq_b: &str) -> Result<FoldOutcome, FoldError> {
        Err(FoldError::Unavailable(
            "no folding backend is configured".to_string(),
        ))
    }
}

/// Collapses a pair probability matrix to a per-base digit string: each
/// column is summed over the other rows after rounding, so '1' marks a base
/// that pairs somewhere and '0' one that does not.
pub fn pairing_mask(pair_probabilities: &[Vec<f64>]) -> String {
    (0..pair_probabilities.len())
        .map(|col| {
            let paired: f64 = pair_probabilities
                .iter()
                .enumerate()
                .filter(|(row, _)| *row != col)
                .map(|(_, row)| row.get(col).copied().unwrap_or(0.0).round())
                .sum();
            char::from_digit((paired as u32).min(9), 10).unwrap_or('9')
        })
        .collect()
}
