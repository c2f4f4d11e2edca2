use std::fs;
use std::path::Path;

use thiserror::Error;

/// Fine-tuned model catalogues live beside the config as
/// `<experiment>_models.json` or `<experiment>_<condition>_models.json`,
/// each an array of `[training_size, model_id]` pairs.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read model registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model registry {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("model registry {path} lists no models")]
    Empty { path: String },
    #[error("model registry {path} has no model trained at size {expected} (available: {available:?})")]
    TrainSizeMismatch {
        path: String,
        expected: u64,
        available: Vec<u64>,
    },
}

pub fn registry_file_name(experiment: &str, condition: Option<&str>) -> String {
    match condition {
        Some(condition) => format!("{experiment}_{condition}_models.json"),
        None => format!("{experiment}_models.json"),
    }
}

pub fn load_entries(path: &Path) -> Result<Vec<(u64, String)>, RegistryError> {
    let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let entries: Vec<(u64, String)> =
        serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    if entries.is_empty() {
        return Err(RegistryError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(entries)
}

/// The model trained at exactly `train_size`. A registry that does not carry
/// that size is a configuration fault, not something to paper over with a
/// nearest match.
pub fn model_for(path: &Path, train_size: u64) -> Result<String, RegistryError> {
    let entries = load_entries(path)?;
    entries
        .iter()
        .find(|(size, _)| *size == train_size)
        .map(|(_, model_id)| model_id.clone())
        .ok_or_else(|| RegistryError::TrainSizeMismatch {
            path: path.display().to_string(),
            expected: train_size,
            available: entries.iter().map(|(size, _)| *size).collect(),
        })
}
