use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dna;
use crate::pipeline::prompts;
use crate::pipeline::shape::OutputShape;
use crate::pipeline::types::{ExpectedFn, PromptFn, ShapeFn, StageId, StageSpec};
use crate::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentKind {
    ReverseComplement,
    BaseComparison,
    BasePairing,
    StructureConversion,
    SecondaryStructure,
    ChainOfExperts,
    FreeEnergy,
    SequenceDesign,
}

impl ExperimentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentKind::ReverseComplement => "reverse_complement",
            ExperimentKind::BaseComparison => "base_comparison",
            ExperimentKind::BasePairing => "base_pairing",
            ExperimentKind::StructureConversion => "structure_conversion",
            ExperimentKind::SecondaryStructure => "secondary_structure",
            ExperimentKind::ChainOfExperts => "chain_of_experts",
            ExperimentKind::FreeEnergy => "free_energy",
            ExperimentKind::SequenceDesign => "sequence_design",
        }
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevCompCondition {
    #[default]
    Naive,
    ChainOfThought,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseComparisonCondition {
    /// Both strands as sampled, second strand unaligned.
    RawPair,
    /// Second strand replaced by its reverse complement before prompting.
    #[default]
    Aligned,
    RawPairRationale,
    AlignedRationale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasePairingCondition {
    /// Prompt carries the ground-truth comparison binary.
    #[default]
    WithComparison,
    SequencesOnly,
    /// Answer is the two structure halves instead of pairing binaries.
    SplitStructure,
    /// Answer is the full joined structure.
    FullStructureRationale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureConversionCondition {
    #[default]
    Complete,
    CompleteRationale,
    /// Per-character conversion of each half, no joining step.
    CharConvert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryStructureCondition {
    #[default]
    Naive,
    ChainOfThought,
    /// Rationale model graded on its first reply only.
    ChainOfThoughtNoErrorCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainCondition {
    #[default]
    ErrorCheck,
    NoErrorCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeEnergyCondition {
    #[default]
    Naive,
    Rationale,
    AlignedRationale,
    /// Prompt carries the ground-truth structure alongside both strands.
    AlignedStructure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceDesignCondition {
    #[default]
    Naive,
    Rationale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub kind: ExperimentKind,
    #[serde(default)]
    pub condition: Option<String>,
    /// Training-set size the experts were fine-tuned at. Model lookup is
    /// exact on this value.
    pub train_size: u64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,
    /// Explicit model ids bypassing the registry, in stage order.
    #[serde(default)]
    pub models: Option<Vec<String>>,
    /// Whole-chain redesign attempts for sequence_design runs.
    #[serde(default = "default_design_rounds")]
    pub design_rounds: u32,
}

fn default_max_tries() -> u32 {
    21
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from("./model_ids")
}

fn default_design_rounds() -> u32 {
    20
}

/// A fully resolved run: concrete model ids, prompt formatters, shapes and
/// expected answers for every stage, in execution order.
#[derive(Debug)]
pub struct Experiment {
    pub kind: ExperimentKind,
    pub condition: String,
    pub stages: Vec<StageSpec>,
    pub design_rounds: u32,
}

pub fn build(config: &ExperimentConfig) -> Result<Experiment> {
    let condition = config.condition.as_deref();
    match config.kind {
        ExperimentKind::ReverseComplement => {
            let condition: RevCompCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            let rationale = matches!(condition, RevCompCondition::ChainOfThought);
            Ok(single_stage_experiment(
                config,
                label,
                reverse_complement_stage(model, config.max_tries, rationale),
            ))
        }
        ExperimentKind::BaseComparison => {
            let condition: BaseComparisonCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            Ok(single_stage_experiment(
                config,
                label,
                base_comparison_stage(model, config.max_tries, condition),
            ))
        }
        ExperimentKind::BasePairing => {
            let condition: BasePairingCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            Ok(single_stage_experiment(
                config,
                label,
                base_pairing_stage(model, config.max_tries, condition),
            ))
        }
        ExperimentKind::StructureConversion => {
            let condition: StructureConversionCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            Ok(single_stage_experiment(
                config,
                label,
                structure_conversion_stage(model, config.max_tries, condition),
            ))
        }
        ExperimentKind::SecondaryStructure => {
            let condition: SecondaryStructureCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            Ok(single_stage_experiment(
                config,
                label,
                secondary_structure_stage(model, config.max_tries, condition),
            ))
        }
        ExperimentKind::ChainOfExperts => {
            let condition: ChainCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let stages = chain_stages(config, condition)?;
            Ok(Experiment {
                kind: config.kind,
                condition: label,
                stages,
                design_rounds: 1,
            })
        }
        ExperimentKind::FreeEnergy => {
            let condition: FreeEnergyCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            Ok(single_stage_experiment(
                config,
                label,
                free_energy_stage(model, config.max_tries, condition),
            ))
        }
        ExperimentKind::SequenceDesign => {
            let condition: SequenceDesignCondition = parse_condition(config.kind, condition)?;
            let label = label_of(&condition);
            let design_model = resolve_model(config, 0, config.kind.as_str(), &label)?;
            let check_model =
                resolve_model(config, 1, "secondary_structure", "chain_of_thought")?;
            Ok(Experiment {
                kind: config.kind,
                condition: label,
                stages: sequence_design_stages(
                    design_model,
                    check_model,
                    config.max_tries,
                    condition,
                ),
                design_rounds: config.design_rounds.max(1),
            })
        }
    }
}

fn single_stage_experiment(
    config: &ExperimentConfig,
    condition: String,
    stage: StageSpec,
) -> Experiment {
    Experiment {
        kind: config.kind,
        condition,
        stages: vec![stage],
        design_rounds: 1,
    }
}

pub fn parse_condition<T>(kind: ExperimentKind, condition: Option<&str>) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match condition {
        None => Ok(T::default()),
        Some(label) => serde_json::from_value(Value::String(label.to_string()))
            .map_err(|_| anyhow!("unknown condition '{label}' for experiment '{kind}'")),
    }
}

fn label_of<T: Serialize>(condition: &T) -> String {
    match serde_json::to_value(condition) {
        Ok(Value::String(label)) => label,
        _ => String::new(),
    }
}

/// Canonical condition label for an experiment, with per-kind defaults
/// applied. Lets trace files be located without resolving any models.
pub fn condition_label(kind: ExperimentKind, condition: Option<&str>) -> Result<String> {
    match kind {
        ExperimentKind::ReverseComplement => parsed_label::<RevCompCondition>(kind, condition),
        ExperimentKind::BaseComparison => parsed_label::<BaseComparisonCondition>(kind, condition),
        ExperimentKind::BasePairing => parsed_label::<BasePairingCondition>(kind, condition),
        ExperimentKind::StructureConversion => {
            parsed_label::<StructureConversionCondition>(kind, condition)
        }
        ExperimentKind::SecondaryStructure => {
            parsed_label::<SecondaryStructureCondition>(kind, condition)
        }
        ExperimentKind::ChainOfExperts => parsed_label::<ChainCondition>(kind, condition),
        ExperimentKind::FreeEnergy => parsed_label::<FreeEnergyCondition>(kind, condition),
        ExperimentKind::SequenceDesign => parsed_label::<SequenceDesignCondition>(kind, condition),
    }
}

fn parsed_label<T>(kind: ExperimentKind, condition: Option<&str>) -> Result<String>
where
    T: serde::de::DeserializeOwned + Default + Serialize,
{
    let parsed: T = parse_condition(kind, condition)?;
    Ok(label_of(&parsed))
}

fn resolve_model(
    config: &ExperimentConfig,
    index: usize,
    experiment: &str,
    condition: &str,
) -> Result<String> {
    if let Some(models) = &config.models {
        return models.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "experiment '{}' needs at least {} model ids, config lists {}",
                config.kind,
                index + 1,
                models.len()
            )
        });
    }
    let path = config
        .registry_dir
        .join(registry::registry_file_name(experiment, Some(condition)));
    registry::model_for(&path, config.train_size)
        .with_context(|| format!("resolving the model for stage {index} of '{}'", config.kind))
}

fn rationale_if(wrapped: bool, inner: OutputShape) -> OutputShape {
    if wrapped {
        OutputShape::rationale(inner)
    } else {
        inner
    }
}

fn reverse_complement_stage(model: String, max_tries: u32, rationale: bool) -> StageSpec {
    StageSpec {
        stage: StageId::ReverseComplement,
        model,
        max_tries,
        prompt: Arc::new(|state| prompts::reverse_complement_messages(&state.item.seq_b)),
        shape: Arc::new(move |item| {
            rationale_if(rationale, OutputShape::nucleotides(item.strand_len()))
        }),
        expected: Arc::new(|item| dna::reverse_complement(&item.seq_b)),
    }
}

fn base_comparison_stage(
    model: String,
    max_tries: u32,
    condition: BaseComparisonCondition,
) -> StageSpec {
    let prompt: PromptFn = Arc::new(move |state| match condition {
        BaseComparisonCondition::RawPair | BaseComparisonCondition::RawPairRationale => {
            prompts::base_comparison_paired_messages(&state.item.seq_a, &state.item.seq_b)
        }
        BaseComparisonCondition::Aligned | BaseComparisonCondition::AlignedRationale => {
            let aligned = dna::reverse_complement(&state.item.seq_b);
            prompts::base_comparison_aligned_messages(&state.item.seq_a, &aligned)
        }
    });
    let rationale = matches!(
        condition,
        BaseComparisonCondition::RawPairRationale | BaseComparisonCondition::AlignedRationale
    );
    StageSpec {
        stage: StageId::BaseComparison,
        model,
        max_tries,
        prompt,
        shape: Arc::new(move |item| rationale_if(rationale, OutputShape::binary(item.strand_len()))),
        expected: comparison_expected(),
    }
}

fn comparison_expected() -> ExpectedFn {
    Arc::new(|item| dna::base_comparison(&item.seq_a, &dna::reverse_complement(&item.seq_b)))
}

fn base_pairing_stage(model: String, max_tries: u32, condition: BasePairingCondition) -> StageSpec {
    let prompt: PromptFn = Arc::new(move |state| {
        let aligned = dna::reverse_complement(&state.item.seq_b);
        match condition {
            BasePairingCondition::SequencesOnly => {
                prompts::base_pairing_sequences_only_messages(&state.item.seq_a, &aligned)
            }
            BasePairingCondition::WithComparison => {
                let comparison = dna::base_comparison(&state.item.seq_a, &aligned);
                prompts::base_pairing_with_comparison_messages(
                    &state.item.seq_a,
                    &aligned,
                    &comparison,
                )
            }
            BasePairingCondition::SplitStructure
            | BasePairingCondition::FullStructureRationale => {
                let comparison = dna::base_comparison(&state.item.seq_a, &aligned);
                prompts::base_pairing_structure_messages(&state.item.seq_a, &aligned, &comparison)
            }
        }
    });
    let shape: ShapeFn = Arc::new(move |item| {
        let len = item.strand_len();
        let inner = match condition {
            BasePairingCondition::WithComparison | BasePairingCondition::SequencesOnly => {
                OutputShape::binary_pair(len)
            }
            BasePairingCondition::SplitStructure => OutputShape::structure_halves(len),
            BasePairingCondition::FullStructureRationale => OutputShape::structure(len * 2 + 1),
        };
        OutputShape::rationale(inner)
    });
    let expected: ExpectedFn = Arc::new(move |item| match condition {
        BasePairingCondition::WithComparison | BasePairingCondition::SequencesOnly => {
            dna::joined_halves(&item.pairing_mask, item.strand_len())
        }
        BasePairingCondition::SplitStructure => {
            dna::joined_halves(&item.structure, item.strand_len())
        }
        BasePairingCondition::FullStructureRationale => item.structure.clone(),
    });
    StageSpec {
        stage: StageId::BasePairing,
        model,
        max_tries,
        prompt,
        shape,
        expected,
    }
}

fn structure_conversion_stage(
    model: String,
    max_tries: u32,
    condition: StructureConversionCondition,
) -> StageSpec {
    let prompt: PromptFn = Arc::new(move |state| {
        let halves = dna::joined_halves(&state.item.pairing_mask, state.item.strand_len());
        match condition {
            StructureConversionCondition::CharConvert => {
                prompts::structure_conversion_chars_messages(&halves)
            }
            _ => prompts::structure_conversion_messages(&halves),
        }
    });
    let shape: ShapeFn = Arc::new(move |item| match condition {
        StructureConversionCondition::Complete => {
            OutputShape::structure(item.strand_len() * 2 + 1)
        }
        StructureConversionCondition::CompleteRationale => {
            OutputShape::rationale(OutputShape::structure(item.strand_len() * 2 + 1))
        }
        StructureConversionCondition::CharConvert => {
            OutputShape::structure_halves(item.strand_len())
        }
    });
    let expected: ExpectedFn = Arc::new(move |item| match condition {
        StructureConversionCondition::CharConvert => {
            dna::joined_halves(&item.structure, item.strand_len())
        }
        _ => item.structure.clone(),
    });
    StageSpec {
        stage: StageId::StructureConversion,
        model,
        max_tries,
        prompt,
        shape,
        expected,
    }
}

fn secondary_structure_stage(
    model: String,
    max_tries: u32,
    condition: SecondaryStructureCondition,
) -> StageSpec {
    let max_tries = match condition {
        SecondaryStructureCondition::ChainOfThoughtNoErrorCheck => 1,
        _ => max_tries,
    };
    let rationale = !matches!(condition, SecondaryStructureCondition::Naive);
    StageSpec {
        stage: StageId::SecondaryStructure,
        model,
        max_tries,
        prompt: Arc::new(|state| {
            prompts::secondary_structure_messages(&state.item.seq_a, &state.item.seq_b)
        }),
        shape: Arc::new(move |item| {
            rationale_if(rationale, OutputShape::structure(item.strand_len() * 2 + 1))
        }),
        expected: Arc::new(|item| item.structure.clone()),
    }
}

fn free_energy_stage(model: String, max_tries: u32, condition: FreeEnergyCondition) -> StageSpec {
    let prompt: PromptFn = Arc::new(move |state| match condition {
        FreeEnergyCondition::Naive | FreeEnergyCondition::Rationale => {
            prompts::free_energy_messages(&state.item.seq_a, &state.item.seq_b)
        }
        FreeEnergyCondition::AlignedRationale => {
            let aligned = dna::reverse_complement(&state.item.seq_b);
            prompts::free_energy_messages(&state.item.seq_a, &aligned)
        }
        FreeEnergyCondition::AlignedStructure => {
            let aligned = dna::reverse_complement(&state.item.seq_b);
            prompts::free_energy_with_structure_messages(
                &state.item.seq_a,
                &aligned,
                &state.item.structure,
            )
        }
    });
    let rationale = matches!(
        condition,
        FreeEnergyCondition::Rationale | FreeEnergyCondition::AlignedRationale
    );
    StageSpec {
        stage: StageId::FreeEnergy,
        model,
        max_tries,
        prompt,
        shape: Arc::new(move |_item| rationale_if(rationale, OutputShape::Scalar)),
        expected: Arc::new(|item| format!("{:.1}", item.energy)),
    }
}

fn sequence_design_stages(
    design_model: String,
    check_model: String,
    max_tries: u32,
    condition: SequenceDesignCondition,
) -> Vec<StageSpec> {
    let rationale = matches!(condition, SequenceDesignCondition::Rationale);
    let design = StageSpec {
        stage: StageId::SequenceDesign,
        model: design_model,
        max_tries,
        prompt: Arc::new(|state| prompts::sequence_design_messages(&state.item.structure)),
        shape: Arc::new(move |item| {
            rationale_if(rationale, OutputShape::strand_pair(item.strand_len()))
        }),
        expected: Arc::new(|item| format!("{} {}", item.seq_a, item.seq_b)),
    };
    let check = StageSpec {
        stage: StageId::StructureCheck,
        model: check_model,
        max_tries,
        prompt: Arc::new(|state| {
            let pair = state.value_of(StageId::SequenceDesign).unwrap_or_default();
            let (seq_a, seq_b) = pair.split_once(' ').unwrap_or((pair, ""));
            prompts::secondary_structure_messages(seq_a, seq_b)
        }),
        shape: Arc::new(|item| {
            OutputShape::rationale(OutputShape::structure(item.strand_len() * 2 + 1))
        }),
        expected: Arc::new(|item| item.structure.clone()),
    };
    vec![design, check]
}

fn chain_stages(config: &ExperimentConfig, condition: ChainCondition) -> Result<Vec<StageSpec>> {
    let max_tries = match condition {
        ChainCondition::ErrorCheck => config.max_tries,
        ChainCondition::NoErrorCheck => 1,
    };
    let rev_model = resolve_model(config, 0, "reverse_complement", "naive")?;
    let cmp_model = resolve_model(config, 1, "base_comparison", "aligned_rationale")?;
    let pair_model = resolve_model(config, 2, "base_pairing", "with_comparison")?;
    let conv_model = resolve_model(config, 3, "structure_conversion", "complete")?;

    let comparison = StageSpec {
        stage: StageId::BaseComparison,
        model: cmp_model,
        max_tries,
        prompt: Arc::new(|state| {
            let aligned = state.value_of(StageId::ReverseComplement).unwrap_or_default();
            prompts::base_comparison_aligned_messages(&state.item.seq_a, aligned)
        }),
        shape: Arc::new(|item| OutputShape::rationale(OutputShape::binary(item.strand_len()))),
        expected: comparison_expected(),
    };
    let pairing = StageSpec {
        stage: StageId::BasePairing,
        model: pair_model,
        max_tries,
        prompt: Arc::new(|state| {
            let aligned = state.value_of(StageId::ReverseComplement).unwrap_or_default();
            let comparison = state.value_of(StageId::BaseComparison).unwrap_or_default();
            prompts::base_pairing_with_comparison_messages(&state.item.seq_a, aligned, comparison)
        }),
        shape: Arc::new(|item| OutputShape::rationale(OutputShape::binary_pair(item.strand_len()))),
        expected: Arc::new(|item| dna::joined_halves(&item.pairing_mask, item.strand_len())),
    };
    let conversion = StageSpec {
        stage: StageId::StructureConversion,
        model: conv_model,
        max_tries,
        prompt: Arc::new(|state| {
            let halves = state.value_of(StageId::BasePairing).unwrap_or_default();
            prompts::structure_conversion_messages(halves)
        }),
        shape: Arc::new(|item| OutputShape::structure(item.strand_len() * 2 + 1)),
        expected: Arc::new(|item| item.structure.clone()),
    };

    Ok(vec![
        reverse_complement_stage(rev_model, max_tries, false),
        comparison,
        pairing,
        conversion,
    ])
}

#[cfg(test)]
mod tests {
    use super::{build, ExperimentConfig, ExperimentKind};
    use crate::pipeline::types::StageId;

    fn config(kind: ExperimentKind, condition: Option<&str>, models: Vec<&str>) -> ExperimentConfig {
        ExperimentConfig {
            kind,
            condition: condition.map(str::to_string),
            train_size: 10000,
            max_tries: 21,
            registry_dir: "./model_ids".into(),
            models: Some(models.into_iter().map(str::to_string).collect()),
            design_rounds: 20,
        }
    }

    #[test]
    fn chain_of_experts_builds_four_stages_in_order() {
        let experiment = build(&config(
            ExperimentKind::ChainOfExperts,
            None,
            vec!["m1", "m2", "m3", "m4"],
        ))
        .expect("build should succeed");

        let stages: Vec<StageId> = experiment.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![
                StageId::ReverseComplement,
                StageId::BaseComparison,
                StageId::BasePairing,
                StageId::StructureConversion,
            ]
        );
        assert_eq!(experiment.condition, "error_check");
        assert_eq!(experiment.design_rounds, 1);
    }

    #[test]
    fn no_error_check_drops_to_a_single_try_per_stage() {
        let experiment = build(&config(
            ExperimentKind::ChainOfExperts,
            Some("no_error_check"),
            vec!["m1", "m2", "m3", "m4"],
        ))
        .expect("build should succeed");
        assert!(experiment.stages.iter().all(|s| s.max_tries == 1));
    }

    #[test]
    fn unknown_conditions_are_rejected_at_build_time() {
        let err = build(&config(
            ExperimentKind::StructureConversion,
            Some("flip_complete"),
            vec!["m1"],
        ))
        .expect_err("bad condition should fail");
        assert!(err.to_string().contains("unknown condition"));
    }

    #[test]
    fn sequence_design_pairs_the_designer_with_a_checker() {
        let experiment = build(&config(
            ExperimentKind::SequenceDesign,
            Some("rationale"),
            vec!["designer", "checker"],
        ))
        .expect("build should succeed");

        assert_eq!(experiment.stages.len(), 2);
        assert_eq!(experiment.stages[0].stage, StageId::SequenceDesign);
        assert_eq!(experiment.stages[0].model, "designer");
        assert_eq!(experiment.stages[1].stage, StageId::StructureCheck);
        assert_eq!(experiment.stages[1].model, "checker");
        assert_eq!(experiment.design_rounds, 20);
    }

    #[test]
    fn missing_model_ids_fail_with_the_stage_count() {
        let err = build(&config(ExperimentKind::ChainOfExperts, None, vec!["m1"]))
            .expect_err("short model list should fail");
        assert!(err.to_string().contains("at least 2 model ids"));
    }
}
