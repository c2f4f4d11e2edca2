use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    dataset::DatasetConfig, fold::FoldConfig, gateway::types::GatewayConfig,
    pipeline::stages::ExperimentConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub fold: FoldConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: PathBuf,
    /// Cap on items taken from the corpus, in file order. Unset runs all.
    pub limit: Option<usize>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./training_data/sequence_validation_set.json"),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub dir: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./test_results"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub filter: String,
    pub rotation: LoggingRotation,
    pub retention_days: usize,
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            filter: "info".to_string(),
            rotation: LoggingRotation::Daily,
            retention_days: 14,
            stderr_warn_enabled: true,
        }
    }
}

impl Config {
    /// Loads a JSON5 config file, checks it against its JSON-Schema, and
    /// anchors every relative path it carries to the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw: Value = json5::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        check_schema(&raw, &schema_file(base, &raw)?)?;

        let mut config: Config =
            serde_json::from_value(raw).context("failed to deserialize config")?;
        config.anchor_paths(base);
        Ok(config)
    }

    fn anchor_paths(&mut self, base: &Path) {
        anchor(&mut self.corpus.path, base);
        anchor(&mut self.trace.dir, base);
        anchor(&mut self.experiment.registry_dir, base);
        anchor(&mut self.dataset.out_dir, base);
    }
}

fn anchor(path: &mut PathBuf, base: &Path) {
    if !path.is_absolute() {
        let anchored = base.join(&*path);
        *path = anchored;
    }
}

fn schema_file(base: &Path, raw: &Value) -> Result<PathBuf> {
    match raw.get("$schema").and_then(Value::as_str) {
        Some(text) => {
            let configured = PathBuf::from(text);
            Ok(if configured.is_absolute() {
                configured
            } else {
                base.join(configured)
            })
        }
        None => {
            let fallback = base.join("chainfold.schema.json");
            if fallback.exists() {
                Ok(fallback)
            } else {
                Err(anyhow!(
                    "no $schema in config and no chainfold.schema.json next to it"
                ))
            }
        }
    }
}

fn check_schema(raw: &Value, schema_path: &Path) -> Result<()> {
    let schema_text = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_text)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("schema {} does not compile: {err}", schema_path.display()))?;

    if let Err(errors) = compiled.validate(raw) {
        let joined = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow!("config validation failed: {joined}"));
    }
    Ok(())
}
